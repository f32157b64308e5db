use super::entity::{NodeId, StickId};
use super::store::Scene;
use std::collections::{BTreeSet, VecDeque};

/// Nodes and sticks reachable from a seed node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Component {
    pub node_ids: BTreeSet<NodeId>,
    pub stick_ids: BTreeSet<StickId>,
}

impl Component {
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }
}

/// Breadth-first walk of the stick graph from `start`.
///
/// Attachments count as edges too: a hinge node is connected to both
/// endpoints of its host stick, and the host stick joins the component.
/// An unknown `start` yields an empty component.
pub fn connected_component(scene: &Scene, start: NodeId) -> Component {
    let mut component = Component::default();
    if scene.node(start).is_none() {
        return component;
    }

    let mut queue = VecDeque::new();
    component.node_ids.insert(start);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        let mut reached: Vec<(Option<StickId>, NodeId)> = Vec::new();

        for stick in scene.sticks().filter(|s| s.touches(current)) {
            if let Some(other) = stick.other(current) {
                reached.push((Some(stick.id), other));
            }
        }

        // Hinge -> host endpoints.
        if let Some(att) = scene.node_attachment(current) {
            if let Some(host) = scene.stick(att.host) {
                reached.push((Some(host.id), host.a));
                reached.push((None, host.b));
            }
        }

        // Host endpoint -> hinges riding on its sticks.
        for att in scene.attachments() {
            if let Some(host) = scene.stick(att.host) {
                if host.touches(current) && scene.node_attachment(att.node).is_some() {
                    reached.push((Some(host.id), att.node));
                }
            }
        }

        for (stick, node) in reached {
            if let Some(stick) = stick {
                component.stick_ids.insert(stick);
            }
            if scene.node(node).is_some() && component.node_ids.insert(node) {
                queue.push_back(node);
            }
        }
    }

    component
}
