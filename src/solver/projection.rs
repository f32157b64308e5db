//! Exact positional projection shared by the drag solver and physics enable.
//!
//! Every constraint is corrected along its gradient, with the correction split
//! by inverse mass: 50/50 between two free nodes, entirely onto the free node
//! when the other side is fixed, skipped when everything is fixed.

use crate::math::{
    direction_and_length, project_to_circle, project_to_line, signed_circle_offset,
    signed_line_offset,
};
use crate::scene::{NodeId, Scene};
use glam::DVec2;
use std::collections::HashMap;

/// Dense copy of node state for a solve.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    ids: Vec<NodeId>,
    index: HashMap<NodeId, usize>,
    pub positions: Vec<DVec2>,
    pub inv_mass: Vec<f64>,
}

/// A positional constraint over workspace indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bond {
    Stick { a: usize, b: usize, rest: f64 },
    Line { node: usize, a: DVec2, b: DVec2 },
    Circle { node: usize, center: DVec2, radius: f64 },
    Hinge { node: usize, a: usize, b: usize, t: f64 },
}

/// Outcome of an iterated projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionReport {
    pub iterations: u32,
    pub max_error: f64,
}

impl Workspace {
    /// Collects `nodes` from the scene; `is_fixed` decides which get zero inverse mass.
    pub fn gather<I, F>(scene: &Scene, nodes: I, is_fixed: F) -> Self
    where
        I: IntoIterator<Item = NodeId>,
        F: Fn(NodeId) -> bool,
    {
        let mut ws = Workspace::default();
        for id in nodes {
            let Some(node) = scene.node(id) else {
                continue;
            };
            ws.index.insert(id, ws.ids.len());
            ws.ids.push(id);
            ws.positions.push(node.position);
            ws.inv_mass.push(if is_fixed(id) { 0.0 } else { 1.0 });
        }
        ws
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Sticks, line/circle memberships and hinges among the gathered nodes.
    pub fn bonds(&self, scene: &Scene) -> Vec<Bond> {
        let mut bonds = Vec::new();
        for stick in scene.sticks() {
            if let (Some(a), Some(b)) = (self.index_of(stick.a), self.index_of(stick.b)) {
                bonds.push(Bond::Stick {
                    a,
                    b,
                    rest: stick.rest_length,
                });
            }
        }
        for (node, &id) in self.ids.iter().enumerate() {
            if let Some(line) = scene.node_line(id) {
                bonds.push(Bond::Line {
                    node,
                    a: line.a,
                    b: line.b,
                });
            } else if let Some(circle) = scene.node_circle(id) {
                bonds.push(Bond::Circle {
                    node,
                    center: circle.center,
                    radius: circle.radius,
                });
            } else if let Some(att) = scene.node_attachment(id) {
                let Some(host) = scene.stick(att.host) else {
                    continue;
                };
                if let (Some(a), Some(b)) = (self.index_of(host.a), self.index_of(host.b)) {
                    bonds.push(Bond::Hinge { node, a, b, t: att.t });
                }
            }
        }
        bonds
    }

    pub fn write_back(&self, scene: &mut Scene) {
        for (i, &id) in self.ids.iter().enumerate() {
            scene.set_position(id, self.positions[i]);
        }
    }

    /// Current violation magnitude of one bond.
    pub fn violation(&self, bond: &Bond) -> f64 {
        let p = &self.positions;
        match *bond {
            Bond::Stick { a, b, rest } => (p[a].distance(p[b]) - rest).abs(),
            Bond::Line { node, a, b } => signed_line_offset(p[node], a, b).abs(),
            Bond::Circle {
                node,
                center,
                radius,
            } => signed_circle_offset(p[node], center, radius).abs(),
            Bond::Hinge { node, a, b, t } => (p[node] - p[a].lerp(p[b], t)).length(),
        }
    }

    pub fn max_violation(&self, bonds: &[Bond]) -> f64 {
        bonds.iter().map(|b| self.violation(b)).fold(0.0, f64::max)
    }

    /// Applies the correction rule to one bond if its violation exceeds
    /// `tolerance`. Returns the violation seen before correcting.
    pub fn correct(&mut self, bond: &Bond, tolerance: f64) -> f64 {
        let error = self.violation(bond);
        if error <= tolerance {
            return error;
        }
        let w = &self.inv_mass;
        let p = &mut self.positions;
        match *bond {
            Bond::Stick { a, b, rest } => {
                let total = w[a] + w[b];
                if total > 0.0 {
                    let (dir, len) = direction_and_length(p[a], p[b]);
                    let delta = dir * (len - rest);
                    p[a] += delta * (w[a] / total);
                    p[b] -= delta * (w[b] / total);
                }
            }
            Bond::Line { node, a, b } => {
                if w[node] > 0.0 {
                    p[node] = project_to_line(p[node], a, b);
                }
            }
            Bond::Circle {
                node,
                center,
                radius,
            } => {
                if w[node] > 0.0 {
                    p[node] = project_to_circle(p[node], center, radius);
                }
            }
            Bond::Hinge { node, a, b, t } => {
                let s = 1.0 - t;
                let total = w[node] + s * s * w[a] + t * t * w[b];
                if total > 0.0 {
                    let c = p[node] - p[a].lerp(p[b], t);
                    let lambda = c / total;
                    p[node] -= lambda * w[node];
                    p[a] += lambda * (w[a] * s);
                    p[b] += lambda * (w[b] * t);
                }
            }
        }
        error
    }

    /// One Gauss-Seidel sweep; returns the worst violation encountered.
    pub fn sweep(&mut self, bonds: &[Bond], tolerance: f64) -> f64 {
        let mut worst: f64 = 0.0;
        for bond in bonds {
            worst = worst.max(self.correct(bond, tolerance));
        }
        worst
    }

    /// Sweeps until every bond is within `tolerance` or `iterations` run out.
    pub fn project(&mut self, bonds: &[Bond], iterations: u32, tolerance: f64) -> ProjectionReport {
        let mut used = 0;
        for _ in 0..iterations {
            used += 1;
            if self.sweep(bonds, tolerance) <= tolerance {
                break;
            }
        }
        ProjectionReport {
            iterations: used,
            max_error: self.max_violation(bonds),
        }
    }
}

/// Projects every node in the scene with anchors held fixed.
pub fn refine_scene(scene: &mut Scene, iterations: u32, tolerance: f64) -> ProjectionReport {
    let ids: Vec<NodeId> = scene.node_ids().collect();
    let mut ws = Workspace::gather(scene, ids, |id| scene.is_anchored(id));
    let bonds = ws.bonds(scene);
    let report = ws.project(&bonds, iterations, tolerance);
    ws.write_back(scene);
    log::trace!(
        "scene refinement: {} iterations, residual {:.3e}",
        report.iterations,
        report.max_error
    );
    report
}
