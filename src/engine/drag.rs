//! Interactive drag sessions: snapping, solving and velocity injection.

use super::Engine;
use crate::error::EngineError;
use crate::math::{
    line_normal, project_to_circle, project_to_line, signed_circle_offset, signed_line_offset,
    unit_or_x,
};
use crate::scene::{connected_component, Component, NodeConstraint, NodeId};
use crate::solver::{DragSolver, SolveResult};
use glam::DVec2;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub(crate) struct DragSession {
    node: NodeId,
    component: Component,
    grab_offset: DVec2,
    last_target: DVec2,
    last_time: f64,
}

impl Engine {
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn dragged_node(&self) -> Option<NodeId> {
        self.drag.as_ref().map(|d| d.node)
    }

    /// Grabs `node` at `pointer`. The node keeps its offset from the pointer
    /// for the rest of the drag.
    pub fn begin_drag(&mut self, node: NodeId, pointer: DVec2) -> Result<(), EngineError> {
        Self::ensure_finite(pointer)?;
        if self.drag.is_some() {
            return Err(EngineError::DragInProgress);
        }
        if let Some(draft) = &self.draft {
            return Err(EngineError::DraftInProgress(draft.kind()));
        }
        if self.resize.is_some() {
            return Err(EngineError::DraftInProgress("resize"));
        }
        let position = self
            .scene
            .position(node)
            .ok_or(EngineError::NodeNotFound(node))?;

        let component = connected_component(&self.scene, node);
        log::debug!(
            "drag of {} started ({} nodes, {} sticks)",
            node,
            component.node_ids.len(),
            component.stick_ids.len()
        );
        self.drag = Some(DragSession {
            node,
            component,
            grab_offset: position - pointer,
            last_target: position,
            last_time: self.clock.now(),
        });
        self.notify();
        Ok(())
    }

    /// Moves the dragged node toward `pointer` and re-solves its component.
    pub fn update_drag(&mut self, pointer: DVec2) -> Result<SolveResult, EngineError> {
        Self::ensure_finite(pointer)?;
        let session = self.drag.take().ok_or(EngineError::NoActiveDrag)?;

        let raw = pointer + session.grab_offset;
        let step = raw - session.last_target;
        let target = self.constrain_target(session.node, raw, step);

        let tracking = self.physics.is_enabled();
        let before: BTreeMap<NodeId, DVec2> = if tracking {
            session
                .component
                .node_ids
                .iter()
                .filter_map(|&id| Some((id, self.scene.position(id)?)))
                .collect()
        } else {
            BTreeMap::new()
        };

        let result = DragSolver::solve(
            &mut self.scene,
            &session.component,
            session.node,
            target,
            &self.drag_config,
        );

        let now = self.clock.now();
        if tracking {
            let dt = (now - session.last_time).max(self.drag_config.min_velocity_dt);
            for (id, old) in before {
                let velocity = match self.scene.node(id) {
                    Some(n) if !n.anchored => (n.position - old) / dt,
                    _ => DVec2::ZERO,
                };
                self.physics.set_velocity(id, velocity);
            }
        }

        self.drag = Some(DragSession {
            last_target: raw,
            last_time: now,
            ..session
        });
        self.notify();
        Ok(result)
    }

    /// Releases the dragged node. Cached physics multipliers are discarded
    /// since the pose changed outside the integrator.
    pub fn end_drag(&mut self) -> Result<(), EngineError> {
        let session = self.drag.take().ok_or(EngineError::NoActiveDrag)?;
        self.physics.clear_multipliers();
        log::debug!("drag of {} ended", session.node);
        self.notify();
        Ok(())
    }

    /// Applies line/circle snap and release to a raw drag target and returns
    /// the target the solver should use.
    fn constrain_target(&mut self, node: NodeId, raw: DVec2, step: DVec2) -> DVec2 {
        let Some(entry) = self.scene.node(node) else {
            return raw;
        };
        if entry.anchored || entry.attachment().is_some() {
            return raw;
        }

        if let Some(line) = self.scene.node_line(node).cloned() {
            let normal = line_normal(line.a, line.b);
            let offset = signed_line_offset(raw, line.a, line.b).abs();
            if self.releases(offset, step, normal) {
                self.scene.set_node_constraint(node, None);
                log::debug!("{} released from {}", node, line.id);
                return raw;
            }
            return project_to_line(raw, line.a, line.b);
        }

        if let Some(circle) = self.scene.node_circle(node).cloned() {
            let normal = unit_or_x(raw - circle.center);
            let offset = signed_circle_offset(raw, circle.center, circle.radius).abs();
            if self.releases(offset, step, normal) {
                self.scene.set_node_constraint(node, None);
                log::debug!("{} released from {}", node, circle.id);
                return raw;
            }
            return project_to_circle(raw, circle.center, circle.radius);
        }

        let reach = self.edit.line_snap_distance;
        if let Some(line) = self.scene.nearest_line(raw, reach) {
            if let Some(entry) = self.scene.line(line).cloned() {
                self.scene
                    .set_node_constraint(node, Some(NodeConstraint::Line(line)));
                log::debug!("{} snapped to {}", node, line);
                return project_to_line(raw, entry.a, entry.b);
            }
        }
        if let Some(circle) = self.scene.nearest_circle(raw, reach) {
            if let Some(entry) = self.scene.circle(circle).cloned() {
                self.scene
                    .set_node_constraint(node, Some(NodeConstraint::Circle(circle)));
                log::debug!("{} snapped to {}", node, circle);
                return project_to_circle(raw, entry.center, entry.radius);
            }
        }
        raw
    }

    /// A pull mostly along `normal`, far enough off the constraint, breaks it.
    fn releases(&self, offset: f64, step: DVec2, normal: DVec2) -> bool {
        let normal_step = step.dot(normal).abs();
        let tangential_step = step.perp_dot(normal).abs();
        offset >= self.edit.release_normal_offset
            && normal_step >= self.edit.release_min_normal_step
            && normal_step >= self.edit.release_normal_ratio * tangential_step
    }
}
