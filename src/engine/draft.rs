//! Drafting sticks, lines and circles, and resizing existing sticks.

use super::Engine;
use crate::error::EngineError;
use crate::scene::hinge::{
    attach_at, blocked_hosts, interior_stick_hit, reattach, rederive_hinges,
};
use crate::scene::{CircleId, HingeChange, LineId, NodeId, StickHit, StickId};
use glam::DVec2;

/// In-progress drafting gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Draft {
    Stick { start: DVec2, current: DVec2 },
    Line { start: DVec2, current: DVec2 },
    Circle { center: DVec2, current: DVec2 },
}

impl Draft {
    pub(super) fn kind(&self) -> &'static str {
        match self {
            Draft::Stick { .. } => "stick",
            Draft::Line { .. } => "line",
            Draft::Circle { .. } => "circle",
        }
    }
}

/// Geometry of the gesture being drafted, for rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DraftPreview {
    /// Endpoints after snapping to pivots and stick interiors.
    Stick { from: DVec2, to: DVec2 },
    Line { a: DVec2, b: DVec2 },
    Circle { center: DVec2, radius: f64 },
}

/// Where a stick endpoint lands.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Endpoint {
    Existing(NodeId),
    Hinge(StickHit),
    Fresh(DVec2),
}

#[derive(Debug, Clone)]
pub(crate) struct ResizeSession {
    stick: StickId,
    node: NodeId,
    origin: DVec2,
    rest_lengths: Vec<(StickId, f64)>,
}

impl Engine {
    /// Pivot within snap radius, else a stick interior outside `blocked`,
    /// else a fresh point.
    fn resolve_endpoint(&self, p: DVec2, blocked: &[StickId]) -> Endpoint {
        if let Some(node) = self.scene.nearest_node(p, self.edit.snap_radius, &[]) {
            return Endpoint::Existing(node);
        }
        match interior_stick_hit(
            &self.scene,
            p,
            self.edit.stick_hit_radius,
            self.edit.hinge_end_zone,
            blocked,
        ) {
            Some(hit) => Endpoint::Hinge(hit),
            None => Endpoint::Fresh(p),
        }
    }

    fn endpoint_position(&self, endpoint: &Endpoint) -> DVec2 {
        match *endpoint {
            Endpoint::Existing(node) => self.scene.position(node).unwrap_or_default(),
            Endpoint::Hinge(hit) => hit.point,
            Endpoint::Fresh(p) => p,
        }
    }

    fn resolve_stick(&self, from: DVec2, to: DVec2) -> (Endpoint, Endpoint) {
        let start = self.resolve_endpoint(from, &[]);
        let blocked = match start {
            Endpoint::Existing(node) => blocked_hosts(&self.scene, &[node]),
            Endpoint::Hinge(hit) => vec![hit.stick],
            Endpoint::Fresh(_) => Vec::new(),
        };
        let end = self.resolve_endpoint(to, &blocked);
        (start, end)
    }

    fn validate_stick(&self, start: &Endpoint, end: &Endpoint) -> Result<(), EngineError> {
        if let (Endpoint::Existing(a), Endpoint::Existing(b)) = (start, end) {
            if a == b {
                return Err(EngineError::DuplicateEndpoints(*a));
            }
            if let Some(existing) = self.scene.stick_between(*a, *b) {
                return Err(EngineError::StickExists(existing));
            }
        }
        let length = self
            .endpoint_position(start)
            .distance(self.endpoint_position(end));
        if length < self.edit.min_stick_length {
            return Err(EngineError::StickTooShort {
                length,
                min: self.edit.min_stick_length,
            });
        }
        Ok(())
    }

    fn materialize(&mut self, endpoint: Endpoint) -> NodeId {
        match endpoint {
            Endpoint::Existing(node) => node,
            Endpoint::Hinge(hit) => {
                let node = self.scene.add_node(hit.point);
                attach_at(&mut self.scene, node, &hit);
                node
            }
            Endpoint::Fresh(p) => self.scene.add_node(p),
        }
    }

    fn create_stick(&mut self, from: DVec2, to: DVec2) -> Result<StickId, EngineError> {
        let (start, end) = self.resolve_stick(from, to);
        self.validate_stick(&start, &end)?;
        let a = self.materialize(start);
        let b = self.materialize(end);
        match self.scene.add_stick(a, b) {
            Ok(stick) => {
                log::debug!("created {} between {} and {}", stick, a, b);
                self.after_structural_change();
                Ok(stick)
            }
            Err(err) => {
                self.scene.prune_isolated();
                Err(err)
            }
        }
    }

    /// Creates a stick in one call, snapping both endpoints like a drafted stick.
    pub fn add_stick(&mut self, from: DVec2, to: DVec2) -> Result<StickId, EngineError> {
        self.ensure_editable()?;
        Self::ensure_finite(from)?;
        Self::ensure_finite(to)?;
        if let Some(draft) = &self.draft {
            return Err(EngineError::DraftInProgress(draft.kind()));
        }
        let stick = self.create_stick(from, to)?;
        self.notify();
        Ok(stick)
    }

    fn begin_draft(&mut self, draft: Draft, p: DVec2) -> Result<(), EngineError> {
        self.ensure_editable()?;
        Self::ensure_finite(p)?;
        if let Some(current) = &self.draft {
            return Err(EngineError::DraftInProgress(current.kind()));
        }
        if self.resize.is_some() {
            return Err(EngineError::DraftInProgress("resize"));
        }
        self.draft = Some(draft);
        self.notify();
        Ok(())
    }

    fn update_draft(&mut self, kind: &'static str, p: DVec2) -> Result<(), EngineError> {
        Self::ensure_finite(p)?;
        let draft = self
            .draft
            .as_mut()
            .filter(|d| d.kind() == kind)
            .ok_or(EngineError::NoActiveDraft(kind))?;
        match draft {
            Draft::Stick { current, .. }
            | Draft::Line { current, .. }
            | Draft::Circle { current, .. } => *current = p,
        }
        self.notify();
        Ok(())
    }

    pub fn begin_stick(&mut self, p: DVec2) -> Result<(), EngineError> {
        self.begin_draft(Draft::Stick { start: p, current: p }, p)
    }

    pub fn update_stick_preview(&mut self, p: DVec2) -> Result<(), EngineError> {
        self.update_draft("stick", p)
    }

    pub fn end_stick(&mut self, p: DVec2) -> Result<StickId, EngineError> {
        Self::ensure_finite(p)?;
        let Some(Draft::Stick { start, .. }) = self.draft else {
            return Err(EngineError::NoActiveDraft("stick"));
        };
        let stick = self.create_stick(start, p)?;
        self.draft = None;
        self.notify();
        Ok(stick)
    }

    pub fn begin_line(&mut self, p: DVec2) -> Result<(), EngineError> {
        self.begin_draft(Draft::Line { start: p, current: p }, p)
    }

    pub fn update_line_preview(&mut self, p: DVec2) -> Result<(), EngineError> {
        self.update_draft("line", p)
    }

    pub fn end_line(&mut self, p: DVec2) -> Result<LineId, EngineError> {
        Self::ensure_finite(p)?;
        let Some(Draft::Line { start, .. }) = self.draft else {
            return Err(EngineError::NoActiveDraft("line"));
        };
        let length = start.distance(p);
        if length < self.edit.min_line_length {
            return Err(EngineError::LineTooShort {
                length,
                min: self.edit.min_line_length,
            });
        }
        let line = self.scene.add_line(start, p);
        self.draft = None;
        log::debug!("created {}", line);
        self.notify();
        Ok(line)
    }

    pub fn begin_circle(&mut self, center: DVec2) -> Result<(), EngineError> {
        self.begin_draft(
            Draft::Circle {
                center,
                current: center,
            },
            center,
        )
    }

    pub fn update_circle_preview(&mut self, p: DVec2) -> Result<(), EngineError> {
        self.update_draft("circle", p)
    }

    pub fn end_circle(&mut self, p: DVec2) -> Result<CircleId, EngineError> {
        Self::ensure_finite(p)?;
        let Some(Draft::Circle { center, .. }) = self.draft else {
            return Err(EngineError::NoActiveDraft("circle"));
        };
        let radius = center.distance(p);
        if radius < self.edit.min_circle_radius {
            return Err(EngineError::CircleTooSmall {
                radius,
                min: self.edit.min_circle_radius,
            });
        }
        let circle = self.scene.add_circle(center, radius);
        self.draft = None;
        log::debug!("created {} (r={:.2})", circle, radius);
        self.notify();
        Ok(circle)
    }

    /// Abandons the active stick, line or circle draft.
    pub fn cancel_draft(&mut self) -> Result<(), EngineError> {
        if self.draft.take().is_none() {
            return Err(EngineError::NoActiveDraft("draft"));
        }
        self.notify();
        Ok(())
    }

    pub fn draft_preview(&self) -> Option<DraftPreview> {
        match self.draft? {
            Draft::Stick { start, current } => {
                let (from, to) = self.resolve_stick(start, current);
                Some(DraftPreview::Stick {
                    from: self.endpoint_position(&from),
                    to: self.endpoint_position(&to),
                })
            }
            Draft::Line { start, current } => Some(DraftPreview::Line {
                a: start,
                b: current,
            }),
            Draft::Circle { center, current } => Some(DraftPreview::Circle {
                center,
                radius: center.distance(current),
            }),
        }
    }

    /// Starts moving `node`, an endpoint of `stick`.
    pub fn begin_resize(&mut self, stick: StickId, node: NodeId) -> Result<(), EngineError> {
        self.ensure_editable()?;
        if let Some(draft) = &self.draft {
            return Err(EngineError::DraftInProgress(draft.kind()));
        }
        if self.resize.is_some() {
            return Err(EngineError::DraftInProgress("resize"));
        }
        let entry = self
            .scene
            .stick(stick)
            .ok_or(EngineError::StickNotFound(stick))?;
        if !entry.touches(node) {
            return Err(EngineError::NotAnEndpoint { stick, node });
        }
        let origin = self
            .scene
            .position(node)
            .ok_or(EngineError::NodeNotFound(node))?;
        let rest_lengths = self
            .scene
            .incident_sticks(node)
            .into_iter()
            .filter_map(|id| Some((id, self.scene.stick(id)?.rest_length)))
            .collect();
        self.resize = Some(ResizeSession {
            stick,
            node,
            origin,
            rest_lengths,
        });
        log::debug!("resize of {} at {} started", stick, node);
        self.notify();
        Ok(())
    }

    fn apply_resize(&mut self, p: DVec2) -> Result<(), EngineError> {
        Self::ensure_finite(p)?;
        let session = self.resize.as_ref().ok_or(EngineError::NoActiveResize)?;
        let node = session.node;
        let mut lengths = Vec::with_capacity(session.rest_lengths.len());
        for &(id, _) in &session.rest_lengths {
            let Some(other) = self.scene.stick(id).and_then(|s| s.other(node)) else {
                continue;
            };
            let length = self.scene.position(other).unwrap_or_default().distance(p);
            if length < self.edit.min_stick_length {
                return Err(EngineError::StickTooShort {
                    length,
                    min: self.edit.min_stick_length,
                });
            }
            lengths.push((id, length));
        }

        self.scene.set_position(node, p);
        for &(id, length) in &lengths {
            if let Some(stick) = self.scene.stick_mut(id) {
                stick.rest_length = length;
            }
        }
        let hosts: Vec<StickId> = lengths.iter().map(|&(id, _)| id).collect();
        rederive_hinges(&mut self.scene, &hosts);
        Ok(())
    }

    pub fn update_resize(&mut self, p: DVec2) -> Result<(), EngineError> {
        self.apply_resize(p)?;
        self.notify();
        Ok(())
    }

    /// Finishes the resize at `p` and re-evaluates the moved endpoint as a hinge.
    pub fn end_resize(&mut self, p: DVec2) -> Result<HingeChange, EngineError> {
        self.apply_resize(p)?;
        let Some(session) = self.resize.take() else {
            return Err(EngineError::NoActiveResize);
        };
        let change = reattach(
            &mut self.scene,
            session.node,
            self.edit.stick_hit_radius,
            self.edit.hinge_end_zone,
            self.edit.min_stick_length,
        );
        if change != HingeChange::Unchanged {
            self.refresh_rest_lengths(&session);
        }
        log::debug!("resize of {} finished: {:?}", session.stick, change);
        self.after_structural_change();
        self.notify();
        Ok(change)
    }

    /// Re-measures the sticks at a node that snapped onto a host.
    fn refresh_rest_lengths(&mut self, session: &ResizeSession) {
        let Some(p) = self.scene.position(session.node) else {
            return;
        };
        for &(id, _) in &session.rest_lengths {
            let Some(other) = self.scene.stick(id).and_then(|s| s.other(session.node)) else {
                continue;
            };
            let length = self.scene.position(other).unwrap_or_default().distance(p);
            if let Some(stick) = self.scene.stick_mut(id) {
                stick.rest_length = length;
            }
        }
    }

    /// Restores the pre-resize geometry.
    pub fn cancel_resize(&mut self) -> Result<(), EngineError> {
        if self.resize.is_none() {
            return Err(EngineError::NoActiveResize);
        }
        self.cancel_resize_session();
        self.notify();
        Ok(())
    }

    pub(crate) fn cancel_resize_session(&mut self) {
        let Some(session) = self.resize.take() else {
            return;
        };
        self.scene.set_position(session.node, session.origin);
        for &(id, rest) in &session.rest_lengths {
            if let Some(stick) = self.scene.stick_mut(id) {
                stick.rest_length = rest;
            }
        }
        let hosts: Vec<StickId> = session.rest_lengths.iter().map(|&(id, _)| id).collect();
        rederive_hinges(&mut self.scene, &hosts);
    }

    pub fn is_resizing(&self) -> bool {
        self.resize.is_some()
    }
}
