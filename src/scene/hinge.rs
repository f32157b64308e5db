//! Hinge derivation: binding a node to the interior of another stick.

use super::entity::{AttachmentId, NodeId, StickId};
use super::store::{Scene, StickHit};
use crate::math::project_to_segment;
use glam::DVec2;

/// Attachments keep `t` strictly inside `(T_MARGIN, 1 - T_MARGIN)`.
pub const T_MARGIN: f64 = 1e-3;

/// What happened to a node's attachment after it was re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HingeChange {
    Attached(AttachmentId),
    Retargeted(AttachmentId),
    Detached,
    Unchanged,
}

/// Closest visible stick whose interior lies within `hit_radius` of `p`.
///
/// Hits within `end_zone` of either host endpoint are rejected, as are the
/// sticks in `exclude`.
pub fn interior_stick_hit(
    scene: &Scene,
    p: DVec2,
    hit_radius: f64,
    end_zone: f64,
    exclude: &[StickId],
) -> Option<StickHit> {
    scene
        .sticks()
        .filter(|s| s.visible && !exclude.contains(&s.id))
        .filter_map(|s| {
            let a = scene.position(s.a)?;
            let b = scene.position(s.b)?;
            let (t, point) = project_to_segment(p, a, b);
            let distance = point.distance(p);
            let interior = t > T_MARGIN
                && t < 1.0 - T_MARGIN
                && point.distance(a) > end_zone
                && point.distance(b) > end_zone;
            (interior && distance <= hit_radius).then_some(StickHit {
                stick: s.id,
                t,
                point,
                distance,
            })
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// Sticks a node joined to `neighbors` may not hinge onto: every stick at a
/// neighbor and every host a neighbor already rides on.
pub fn blocked_hosts(scene: &Scene, neighbors: &[NodeId]) -> Vec<StickId> {
    let mut blocked = Vec::new();
    for &n in neighbors {
        blocked.extend(scene.incident_sticks(n));
        if let Some(att) = scene.node_attachment(n) {
            blocked.push(att.host);
        }
    }
    blocked.sort_unstable();
    blocked.dedup();
    blocked
}

/// Binds `node` to the hit stick and moves it onto the host.
pub fn attach_at(scene: &mut Scene, node: NodeId, hit: &StickHit) -> AttachmentId {
    let id = scene.insert_attachment(node, hit.stick, hit.t);
    scene.set_position(node, hit.point);
    log::debug!("hinge {} binds {} to {} at t={:.4}", id, node, hit.stick, hit.t);
    id
}

/// Re-evaluates a moved node against stick interiors: attach, retarget or detach.
///
/// A hit is ignored when snapping onto it would leave one of the node's
/// sticks shorter than `min_length`.
pub fn reattach(
    scene: &mut Scene,
    node: NodeId,
    hit_radius: f64,
    end_zone: f64,
    min_length: f64,
) -> HingeChange {
    let Some(position) = scene.position(node) else {
        return HingeChange::Unchanged;
    };
    let neighbors: Vec<NodeId> = scene
        .incident_sticks(node)
        .into_iter()
        .filter_map(|id| scene.stick(id)?.other(node))
        .collect();
    let blocked = blocked_hosts(scene, &neighbors);
    let hit = interior_stick_hit(scene, position, hit_radius, end_zone, &blocked).filter(|hit| {
        let fits = neighbors.iter().all(|&n| {
            scene
                .position(n)
                .is_some_and(|p| p.distance(hit.point) >= min_length)
        });
        if !fits {
            log::debug!("{} would collapse a stick on {}, not attaching", node, hit.stick);
        }
        fits
    });
    let current = scene.node_attachment(node).cloned();

    match (current, hit) {
        (Some(att), Some(hit)) => {
            if att.host == hit.stick && (att.t - hit.t).abs() < f64::EPSILON {
                return HingeChange::Unchanged;
            }
            HingeChange::Retargeted(attach_at(scene, node, &hit))
        }
        (None, Some(hit)) => HingeChange::Attached(attach_at(scene, node, &hit)),
        (Some(att), None) => {
            scene.set_node_constraint(node, None);
            log::debug!("hinge {} released {}", att.id, node);
            HingeChange::Detached
        }
        (None, None) => HingeChange::Unchanged,
    }
}

/// Moves every hinge riding on `hosts` back onto its host stick.
pub fn rederive_hinges(scene: &mut Scene, hosts: &[StickId]) {
    let targets: Vec<(NodeId, DVec2)> = scene
        .attachments()
        .filter(|att| hosts.contains(&att.host))
        .filter_map(|att| Some((att.node, scene.attachment_point(att)?)))
        .collect();
    for (node, point) in targets {
        scene.set_position(node, point);
    }
}
