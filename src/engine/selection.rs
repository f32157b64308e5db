use super::Engine;
use crate::error::EngineError;
use crate::scene::{CircleId, EntityRef, LineId, NodeId, Scene, StickId};
use std::collections::BTreeSet;

/// Entities picked for deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub nodes: BTreeSet<NodeId>,
    pub sticks: BTreeSet<StickId>,
    pub lines: BTreeSet<LineId>,
    pub circles: BTreeSet<CircleId>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.sticks.is_empty()
            && self.lines.is_empty()
            && self.circles.is_empty()
    }

    pub fn contains(&self, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Node(id) => self.nodes.contains(&id),
            EntityRef::Stick(id) => self.sticks.contains(&id),
            EntityRef::Line(id) => self.lines.contains(&id),
            EntityRef::Circle(id) => self.circles.contains(&id),
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn retain_live(&mut self, scene: &Scene) {
        self.nodes.retain(|id| scene.node(*id).is_some());
        self.sticks.retain(|id| scene.stick(*id).is_some());
        self.lines.retain(|id| scene.line(*id).is_some());
        self.circles.retain(|id| scene.circle(*id).is_some());
    }
}

fn ensure_exists(scene: &Scene, entity: EntityRef) -> Result<(), EngineError> {
    let found = match entity {
        EntityRef::Node(id) => scene.node(id).is_some(),
        EntityRef::Stick(id) => scene.stick(id).is_some(),
        EntityRef::Line(id) => scene.line(id).is_some(),
        EntityRef::Circle(id) => scene.circle(id).is_some(),
    };
    if found {
        return Ok(());
    }
    Err(match entity {
        EntityRef::Node(id) => EngineError::NodeNotFound(id),
        EntityRef::Stick(id) => EngineError::StickNotFound(id),
        EntityRef::Line(id) => EngineError::LineNotFound(id),
        EntityRef::Circle(id) => EngineError::CircleNotFound(id),
    })
}

impl Engine {
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn select(&mut self, entity: EntityRef) -> Result<(), EngineError> {
        ensure_exists(&self.scene, entity)?;
        match entity {
            EntityRef::Node(id) => self.selection.nodes.insert(id),
            EntityRef::Stick(id) => self.selection.sticks.insert(id),
            EntityRef::Line(id) => self.selection.lines.insert(id),
            EntityRef::Circle(id) => self.selection.circles.insert(id),
        };
        self.notify();
        Ok(())
    }

    pub fn deselect(&mut self, entity: EntityRef) -> Result<(), EngineError> {
        let removed = match entity {
            EntityRef::Node(id) => self.selection.nodes.remove(&id),
            EntityRef::Stick(id) => self.selection.sticks.remove(&id),
            EntityRef::Line(id) => self.selection.lines.remove(&id),
            EntityRef::Circle(id) => self.selection.circles.remove(&id),
        };
        if !removed {
            return Err(EngineError::NothingSelected);
        }
        self.notify();
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.notify();
        }
    }

    /// Deletes selected pivots with their sticks. Returns the number of
    /// selected nodes removed.
    pub fn delete_selected_nodes(&mut self) -> Result<usize, EngineError> {
        self.ensure_editable()?;
        let nodes = std::mem::take(&mut self.selection.nodes);
        if nodes.is_empty() {
            return Err(EngineError::NothingSelected);
        }
        let removed = nodes
            .into_iter()
            .filter(|&id| self.scene.remove_node(id).is_some())
            .count();
        self.finish_deletion("nodes", removed);
        Ok(removed)
    }

    /// Deletes selected sticks and the hinges they host.
    pub fn delete_selected_sticks(&mut self) -> Result<usize, EngineError> {
        self.ensure_editable()?;
        let sticks = std::mem::take(&mut self.selection.sticks);
        if sticks.is_empty() {
            return Err(EngineError::NothingSelected);
        }
        let removed = sticks
            .into_iter()
            .filter(|&id| self.scene.remove_stick(id).is_some())
            .count();
        self.finish_deletion("sticks", removed);
        Ok(removed)
    }

    pub fn delete_selected_lines(&mut self) -> Result<usize, EngineError> {
        self.ensure_editable()?;
        let lines = std::mem::take(&mut self.selection.lines);
        if lines.is_empty() {
            return Err(EngineError::NothingSelected);
        }
        let removed = lines
            .into_iter()
            .filter(|&id| self.scene.remove_line(id).is_some())
            .count();
        self.finish_deletion("lines", removed);
        Ok(removed)
    }

    pub fn delete_selected_circles(&mut self) -> Result<usize, EngineError> {
        self.ensure_editable()?;
        let circles = std::mem::take(&mut self.selection.circles);
        if circles.is_empty() {
            return Err(EngineError::NothingSelected);
        }
        let removed = circles
            .into_iter()
            .filter(|&id| self.scene.remove_circle(id).is_some())
            .count();
        self.finish_deletion("circles", removed);
        Ok(removed)
    }

    /// Deletes everything selected, sticks before nodes.
    pub fn delete_selection(&mut self) -> Result<usize, EngineError> {
        self.ensure_editable()?;
        if self.selection.is_empty() {
            return Err(EngineError::NothingSelected);
        }
        let selection = std::mem::take(&mut self.selection);
        let mut removed = 0;
        for id in selection.sticks {
            removed += usize::from(self.scene.remove_stick(id).is_some());
        }
        for id in selection.nodes {
            removed += usize::from(self.scene.remove_node(id).is_some());
        }
        for id in selection.lines {
            removed += usize::from(self.scene.remove_line(id).is_some());
        }
        for id in selection.circles {
            removed += usize::from(self.scene.remove_circle(id).is_some());
        }
        self.finish_deletion("entities", removed);
        Ok(removed)
    }

    fn finish_deletion(&mut self, kind: &str, removed: usize) {
        let pruned = self.scene.prune_isolated();
        log::debug!(
            "deleted {} {}, pruned {} isolated nodes",
            removed,
            kind,
            pruned.len()
        );
        self.after_structural_change();
        self.notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ManualClock;
    use glam::DVec2;

    fn engine() -> Engine {
        Engine::with_clock(ManualClock::new(0.0))
    }

    #[test]
    fn deleting_host_stick_detaches_hinge() {
        let mut e = engine();
        let host = e.add_stick(DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0)).unwrap();
        let arm = e.add_stick(DVec2::new(50.0, 2.0), DVec2::new(50.0, 80.0)).unwrap();
        let hinge = e.scene().stick(arm).unwrap().a;
        assert!(e.scene().node_attachment(hinge).is_some());

        e.select(EntityRef::Stick(host)).unwrap();
        assert_eq!(e.delete_selected_sticks(), Ok(1));
        assert!(e.scene().stick(host).is_none());
        assert_eq!(e.scene().attachments().count(), 0);
        assert!(e.scene().node(hinge).unwrap().constraint.is_none());
        // The host's endpoints became isolated and were pruned.
        assert_eq!(e.scene().node_count(), 2);
    }

    #[test]
    fn anchored_isolated_nodes_survive() {
        let mut e = engine();
        let s = e.add_stick(DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0)).unwrap();
        let a = e.scene().stick(s).unwrap().a;
        e.set_anchor(a, true).unwrap();
        e.select(EntityRef::Stick(s)).unwrap();
        e.delete_selection().unwrap();
        assert_eq!(e.scene().node_ids().collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn deleting_a_line_frees_its_nodes() {
        let mut e = engine();
        e.begin_line(DVec2::new(-100.0, 50.0)).unwrap();
        let line = e.end_line(DVec2::new(100.0, 50.0)).unwrap();
        let s = e.add_stick(DVec2::new(0.0, 0.0), DVec2::new(0.0, 30.0)).unwrap();
        let tip = e.scene().stick(s).unwrap().b;
        e.begin_drag(tip, DVec2::new(0.0, 30.0)).unwrap();
        e.update_drag(DVec2::new(0.0, 45.0)).unwrap();
        e.end_drag().unwrap();
        assert_eq!(e.scene().node(tip).unwrap().line(), Some(line));

        e.select(EntityRef::Line(line)).unwrap();
        assert_eq!(e.delete_selected_lines(), Ok(1));
        assert_eq!(e.scene().node(tip).unwrap().line(), None);
    }

    #[test]
    fn deletion_rules() {
        let mut e = engine();
        assert_eq!(e.delete_selected_nodes(), Err(EngineError::NothingSelected));
        let s = e.add_stick(DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0)).unwrap();
        assert_eq!(
            e.select(EntityRef::Stick(StickId(999))),
            Err(EngineError::StickNotFound(StickId(999)))
        );
        e.select(EntityRef::Stick(s)).unwrap();
        assert!(e.selection().contains(EntityRef::Stick(s)));
        e.set_physics_enabled(true).unwrap();
        assert!(e.selection().is_empty());
        e.select(EntityRef::Stick(s)).unwrap();
        assert_eq!(e.delete_selected_sticks(), Err(EngineError::PhysicsRunning));
        assert!(e.selection().contains(EntityRef::Stick(s)));
        e.set_physics_enabled(false).unwrap();

        let b = e.scene().stick(s).unwrap().b;
        e.select(EntityRef::Node(b)).unwrap();
        assert_eq!(e.delete_selected_nodes(), Ok(1));
        assert_eq!(e.scene().stick_count(), 0);
        assert_eq!(e.scene().node_count(), 0);
        assert!(e.selection().is_empty());
    }
}
