use super::entity::{
    AttachmentConstraint, AttachmentId, CircleConstraint, CircleId, LineConstraint, LineId, Node,
    NodeConstraint, NodeId, Stick, StickId,
};
use crate::error::EngineError;
use crate::math::{
    distance_to_segment, project_to_segment, signed_circle_offset, signed_line_offset,
    DEGENERATE_LENGTH,
};
use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of a nearest-stick query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickHit {
    pub stick: StickId,
    /// Barycentric parameter of the closest point along `a → b`.
    pub t: f64,
    pub point: DVec2,
    pub distance: f64,
}

/// Id-keyed entity store for a mechanism.
///
/// Entities reference each other by id only. A node whose constraint id no
/// longer resolves is treated as unconstrained.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    nodes: BTreeMap<NodeId, Node>,
    sticks: BTreeMap<StickId, Stick>,
    lines: BTreeMap<LineId, LineConstraint>,
    circles: BTreeMap<CircleId, CircleConstraint>,
    attachments: BTreeMap<AttachmentId, AttachmentConstraint>,
    next_id: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn position(&self, id: NodeId) -> Option<DVec2> {
        self.nodes.get(&id).map(|n| n.position)
    }

    pub(crate) fn set_position(&mut self, id: NodeId, position: DVec2) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.position = position;
        }
    }

    pub fn is_anchored(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|n| n.anchored)
    }

    pub fn stick(&self, id: StickId) -> Option<&Stick> {
        self.sticks.get(&id)
    }

    pub(crate) fn stick_mut(&mut self, id: StickId) -> Option<&mut Stick> {
        self.sticks.get_mut(&id)
    }

    pub fn sticks(&self) -> impl Iterator<Item = &Stick> + '_ {
        self.sticks.values()
    }

    pub fn stick_count(&self) -> usize {
        self.sticks.len()
    }

    pub fn line(&self, id: LineId) -> Option<&LineConstraint> {
        self.lines.get(&id)
    }

    pub fn lines(&self) -> impl Iterator<Item = &LineConstraint> + '_ {
        self.lines.values()
    }

    pub fn circle(&self, id: CircleId) -> Option<&CircleConstraint> {
        self.circles.get(&id)
    }

    pub fn circles(&self) -> impl Iterator<Item = &CircleConstraint> + '_ {
        self.circles.values()
    }

    pub fn attachment(&self, id: AttachmentId) -> Option<&AttachmentConstraint> {
        self.attachments.get(&id)
    }

    pub fn attachments(&self) -> impl Iterator<Item = &AttachmentConstraint> + '_ {
        self.attachments.values()
    }

    /// Line the node is constrained to, if the reference is still live.
    pub fn node_line(&self, id: NodeId) -> Option<&LineConstraint> {
        self.node(id)?.line().and_then(|l| self.lines.get(&l))
    }

    pub fn node_circle(&self, id: NodeId) -> Option<&CircleConstraint> {
        self.node(id)?.circle().and_then(|c| self.circles.get(&c))
    }

    /// Attachment binding the node, if both it and its host stick are live.
    pub fn node_attachment(&self, id: NodeId) -> Option<&AttachmentConstraint> {
        let att = self.node(id)?.attachment().and_then(|a| self.attachments.get(&a))?;
        if att.node == id && self.sticks.contains_key(&att.host) {
            Some(att)
        } else {
            None
        }
    }

    /// Point on the host stick an attachment currently pins its node to.
    pub fn attachment_point(&self, att: &AttachmentConstraint) -> Option<DVec2> {
        let host = self.sticks.get(&att.host)?;
        let a = self.position(host.a)?;
        let b = self.position(host.b)?;
        Some(a.lerp(b, att.t))
    }

    pub fn add_node(&mut self, position: DVec2) -> NodeId {
        let id = NodeId(self.allocate());
        self.nodes.insert(id, Node::new(id, position));
        id
    }

    /// Adds a visible stick whose rest length is the current endpoint distance.
    pub fn add_stick(&mut self, a: NodeId, b: NodeId) -> Result<StickId, EngineError> {
        let pa = self.position(a).ok_or(EngineError::NodeNotFound(a))?;
        let pb = self.position(b).ok_or(EngineError::NodeNotFound(b))?;
        if a == b {
            return Err(EngineError::DuplicateEndpoints(a));
        }
        if let Some(existing) = self.stick_between(a, b) {
            return Err(EngineError::StickExists(existing));
        }
        let length = pa.distance(pb);
        if length <= DEGENERATE_LENGTH {
            return Err(EngineError::StickTooShort {
                length,
                min: DEGENERATE_LENGTH,
            });
        }
        let id = StickId(self.allocate());
        self.sticks.insert(
            id,
            Stick {
                id,
                a,
                b,
                rest_length: length,
                visible: true,
            },
        );
        Ok(id)
    }

    pub fn stick_between(&self, a: NodeId, b: NodeId) -> Option<StickId> {
        self.sticks
            .values()
            .find(|s| (s.a == a && s.b == b) || (s.a == b && s.b == a))
            .map(|s| s.id)
    }

    pub fn add_line(&mut self, a: DVec2, b: DVec2) -> LineId {
        let id = LineId(self.allocate());
        self.lines.insert(id, LineConstraint { id, a, b });
        id
    }

    pub fn add_circle(&mut self, center: DVec2, radius: f64) -> CircleId {
        let id = CircleId(self.allocate());
        self.circles.insert(id, CircleConstraint { id, center, radius });
        id
    }

    /// Replaces the node's positional constraint. Dropping an attachment also
    /// removes the attachment entity.
    pub(crate) fn set_node_constraint(&mut self, id: NodeId, constraint: Option<NodeConstraint>) {
        let previous = match self.nodes.get_mut(&id) {
            Some(node) => std::mem::replace(&mut node.constraint, constraint),
            None => return,
        };
        if let Some(NodeConstraint::Attachment(att)) = previous {
            if constraint != previous {
                self.attachments.remove(&att);
            }
        }
    }

    /// Binds `node` to `host` at parameter `t`, replacing any existing constraint on the node.
    pub(crate) fn insert_attachment(
        &mut self,
        node: NodeId,
        host: StickId,
        t: f64,
    ) -> AttachmentId {
        if let Some(existing) = self.nodes.get(&node).and_then(|n| n.attachment()) {
            if let Some(att) = self.attachments.get_mut(&existing) {
                att.host = host;
                att.t = t;
                return existing;
            }
        }
        let id = AttachmentId(self.allocate());
        self.attachments.insert(id, AttachmentConstraint { id, node, host, t });
        self.set_node_constraint(node, Some(NodeConstraint::Attachment(id)));
        id
    }

    pub fn incident_sticks(&self, node: NodeId) -> Vec<StickId> {
        self.sticks
            .values()
            .filter(|s| s.touches(node))
            .map(|s| s.id)
            .collect()
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.sticks.values().filter(|s| s.touches(node)).count()
    }

    /// Removes a stick and the attachments it hosts.
    pub(crate) fn remove_stick(&mut self, id: StickId) -> Option<Stick> {
        let stick = self.sticks.remove(&id)?;
        let hosted: Vec<AttachmentConstraint> = self
            .attachments
            .values()
            .filter(|a| a.host == id)
            .cloned()
            .collect();
        for att in hosted {
            self.attachments.remove(&att.id);
            if let Some(node) = self.nodes.get_mut(&att.node) {
                if node.attachment() == Some(att.id) {
                    node.constraint = None;
                }
            }
        }
        Some(stick)
    }

    /// Removes a node together with its incident sticks.
    pub(crate) fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        for stick in self.incident_sticks(id) {
            self.remove_stick(stick);
        }
        let node = self.nodes.remove(&id)?;
        if let Some(att) = node.attachment() {
            self.attachments.remove(&att);
        }
        Some(node)
    }

    pub(crate) fn remove_line(&mut self, id: LineId) -> Option<LineConstraint> {
        let line = self.lines.remove(&id)?;
        for node in self.nodes.values_mut() {
            if node.line() == Some(id) {
                node.constraint = None;
            }
        }
        Some(line)
    }

    pub(crate) fn remove_circle(&mut self, id: CircleId) -> Option<CircleConstraint> {
        let circle = self.circles.remove(&id)?;
        for node in self.nodes.values_mut() {
            if node.circle() == Some(id) {
                node.constraint = None;
            }
        }
        Some(circle)
    }

    /// Deletes unanchored nodes with no incident stick; returns what was removed.
    pub(crate) fn prune_isolated(&mut self) -> Vec<NodeId> {
        let isolated: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| !n.anchored && self.degree(n.id) == 0)
            .map(|n| n.id)
            .collect();
        for id in &isolated {
            self.remove_node(*id);
        }
        isolated
    }

    /// Nearest node within `radius` of `p`, skipping `exclude`.
    pub fn nearest_node(&self, p: DVec2, radius: f64, exclude: &[NodeId]) -> Option<NodeId> {
        self.nodes
            .values()
            .filter(|n| !exclude.contains(&n.id))
            .map(|n| (n.id, n.position.distance(p)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Nearest visible stick within `radius` of `p`.
    pub fn nearest_stick(&self, p: DVec2, radius: f64) -> Option<StickHit> {
        self.sticks
            .values()
            .filter(|s| s.visible)
            .filter_map(|s| {
                let a = self.position(s.a)?;
                let b = self.position(s.b)?;
                let (t, point) = project_to_segment(p, a, b);
                Some(StickHit {
                    stick: s.id,
                    t,
                    point,
                    distance: point.distance(p),
                })
            })
            .filter(|h| h.distance <= radius)
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    pub fn nearest_line(&self, p: DVec2, radius: f64) -> Option<LineId> {
        self.lines
            .values()
            .map(|l| (l.id, signed_line_offset(p, l.a, l.b).abs()))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    pub fn nearest_circle(&self, p: DVec2, radius: f64) -> Option<CircleId> {
        self.circles
            .values()
            .map(|c| (c.id, signed_circle_offset(p, c.center, c.radius).abs()))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Distance from `p` to the drawn segment of a line, for UI picking.
    pub fn line_segment_distance(&self, id: LineId, p: DVec2) -> Option<f64> {
        self.lines.get(&id).map(|l| distance_to_segment(p, l.a, l.b))
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            nodes: self.nodes.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            sticks: self.sticks.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            lines: self.lines.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            circles: self.circles.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            attachments: self
                .attachments
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }
}

/// Keyed-map dump of a scene, for debugging and test assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub nodes: BTreeMap<String, Node>,
    pub sticks: BTreeMap<String, Stick>,
    pub lines: BTreeMap<String, LineConstraint>,
    pub circles: BTreeMap<String, CircleConstraint>,
    pub attachments: BTreeMap<String, AttachmentConstraint>,
}
