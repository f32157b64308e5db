//! Constraint gathering and the scalar constraint rows the integrators solve.

use super::options::MassModel;
use crate::math::{direction_and_length, line_normal, unit_or_x};
use crate::scene::{AttachmentId, NodeId, Scene, StickId};
use glam::DVec2;
use std::collections::{BTreeMap, HashMap};

/// Stable identity of a scalar constraint, used to key multiplier caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintKey {
    Distance(StickId),
    Line(NodeId),
    Circle(NodeId),
    AttachmentX(AttachmentId),
    AttachmentY(AttachmentId),
}

/// Accumulated Lagrange multipliers per constraint.
pub type MultiplierCache = HashMap<ConstraintKey, f64>;

/// Dense simulation state for every node in the scene.
#[derive(Debug, Clone, Default)]
pub struct Bodies {
    pub ids: Vec<NodeId>,
    index: HashMap<NodeId, usize>,
    pub positions: Vec<DVec2>,
    pub velocities: Vec<DVec2>,
    pub mass: Vec<f64>,
    pub inv_mass: Vec<f64>,
}

impl Bodies {
    pub fn gather(
        scene: &Scene,
        velocities: &BTreeMap<NodeId, DVec2>,
        mass_model: MassModel,
    ) -> Self {
        let mut bodies = Bodies::default();
        for node in scene.nodes() {
            let i = bodies.ids.len();
            bodies.index.insert(node.id, i);
            bodies.ids.push(node.id);
            bodies.positions.push(node.position);
            if node.anchored {
                bodies.velocities.push(DVec2::ZERO);
                bodies.mass.push(0.0);
                bodies.inv_mass.push(0.0);
                continue;
            }
            let mass = match mass_model {
                MassModel::Unit => 1.0,
                MassModel::Lumped => {
                    let carried: f64 = scene
                        .sticks()
                        .filter(|s| s.visible && s.touches(node.id))
                        .map(|s| s.rest_length)
                        .sum();
                    (carried / 200.0).max(0.1)
                }
            };
            bodies
                .velocities
                .push(velocities.get(&node.id).copied().unwrap_or(DVec2::ZERO));
            bodies.mass.push(mass);
            bodies.inv_mass.push(1.0 / mass);
        }
        bodies
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn is_free(&self, i: usize) -> bool {
        self.inv_mass[i] > 0.0
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.velocities
            .iter()
            .zip(&self.mass)
            .map(|(v, m)| 0.5 * m * v.length_squared())
            .sum()
    }

    /// Uniformly scales free-node velocities.
    pub fn scale_velocities(&mut self, factor: f64) {
        for (i, v) in self.velocities.iter_mut().enumerate() {
            if self.inv_mass[i] > 0.0 {
                *v *= factor;
            }
        }
    }

    pub fn zero_velocities(&mut self) {
        self.velocities.fill(DVec2::ZERO);
    }

    /// Stores positions in the scene. Nodes at rest get no velocity entry.
    pub fn write_back(&self, scene: &mut Scene, velocities: &mut BTreeMap<NodeId, DVec2>) {
        velocities.clear();
        for (i, &id) in self.ids.iter().enumerate() {
            scene.set_position(id, self.positions[i]);
            if self.velocities[i] != DVec2::ZERO {
                velocities.insert(id, self.velocities[i]);
            }
        }
    }
}

/// A scalar equality constraint `C(x) = 0` over body indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Row {
    Distance {
        key: ConstraintKey,
        a: usize,
        b: usize,
        rest: f64,
    },
    /// Signed perpendicular offset from a line.
    Line {
        key: ConstraintKey,
        node: usize,
        origin: DVec2,
        normal: DVec2,
    },
    Circle {
        key: ConstraintKey,
        node: usize,
        center: DVec2,
        radius: f64,
    },
    /// One axis of `x_node - ((1 - t) x_a + t x_b)`.
    Attachment {
        key: ConstraintKey,
        node: usize,
        a: usize,
        b: usize,
        t: f64,
        axis: DVec2,
    },
}

/// Constraint gradient: up to three `(body, dC/dx_body)` terms.
#[derive(Debug, Clone, Copy)]
pub struct Gradient {
    terms: [(usize, DVec2); 3],
    len: usize,
}

impl Gradient {
    fn one(i: usize, g: DVec2) -> Self {
        Self {
            terms: [(i, g), (0, DVec2::ZERO), (0, DVec2::ZERO)],
            len: 1,
        }
    }

    pub fn terms(&self) -> &[(usize, DVec2)] {
        &self.terms[..self.len]
    }

    /// `Σ w_i |g_i|²`, the effective inverse mass along the constraint.
    pub fn effective_inv_mass(&self, bodies: &Bodies) -> f64 {
        self.terms()
            .iter()
            .map(|&(i, g)| bodies.inv_mass[i] * g.length_squared())
            .sum()
    }
}

impl Row {
    pub fn key(&self) -> ConstraintKey {
        match *self {
            Row::Distance { key, .. }
            | Row::Line { key, .. }
            | Row::Circle { key, .. }
            | Row::Attachment { key, .. } => key,
        }
    }

    pub fn value(&self, x: &[DVec2]) -> f64 {
        match *self {
            Row::Distance { a, b, rest, .. } => x[a].distance(x[b]) - rest,
            Row::Line {
                node,
                origin,
                normal,
                ..
            } => (x[node] - origin).dot(normal),
            Row::Circle {
                node,
                center,
                radius,
                ..
            } => x[node].distance(center) - radius,
            Row::Attachment {
                node, a, b, t, axis, ..
            } => (x[node] - x[a].lerp(x[b], t)).dot(axis),
        }
    }

    pub fn gradient(&self, x: &[DVec2]) -> Gradient {
        match *self {
            Row::Distance { a, b, .. } => {
                let (n, _) = direction_and_length(x[a], x[b]);
                Gradient {
                    terms: [(a, -n), (b, n), (0, DVec2::ZERO)],
                    len: 2,
                }
            }
            Row::Line { node, normal, .. } => Gradient::one(node, normal),
            Row::Circle { node, center, .. } => Gradient::one(node, unit_or_x(x[node] - center)),
            Row::Attachment {
                node, a, b, t, axis, ..
            } => Gradient {
                terms: [(node, axis), (a, axis * -(1.0 - t)), (b, axis * -t)],
                len: 3,
            },
        }
    }

    /// Time derivative of the constraint, `Σ g_i · v_i`.
    pub fn velocity_error(&self, x: &[DVec2], v: &[DVec2]) -> f64 {
        self.gradient(x)
            .terms()
            .iter()
            .map(|&(i, g)| g.dot(v[i]))
            .sum()
    }
}

/// Builds the constraint rows for the current scene.
///
/// One distance row per visible stick, one row per live line or circle
/// membership, and two rows (x and y) per live attachment.
pub fn gather_rows(scene: &Scene, bodies: &Bodies) -> Vec<Row> {
    let mut rows = Vec::new();
    for stick in scene.sticks().filter(|s| s.visible) {
        if let (Some(a), Some(b)) = (bodies.index_of(stick.a), bodies.index_of(stick.b)) {
            rows.push(Row::Distance {
                key: ConstraintKey::Distance(stick.id),
                a,
                b,
                rest: stick.rest_length,
            });
        }
    }
    for node in scene.nodes() {
        let Some(i) = bodies.index_of(node.id) else {
            continue;
        };
        if let Some(line) = scene.node_line(node.id) {
            rows.push(Row::Line {
                key: ConstraintKey::Line(node.id),
                node: i,
                origin: line.a,
                normal: line_normal(line.a, line.b),
            });
        } else if let Some(circle) = scene.node_circle(node.id) {
            rows.push(Row::Circle {
                key: ConstraintKey::Circle(node.id),
                node: i,
                center: circle.center,
                radius: circle.radius,
            });
        }
    }
    for att in scene.attachments() {
        if scene.node_attachment(att.node).map(|a| a.id) != Some(att.id) {
            continue;
        }
        let Some(host) = scene.stick(att.host) else {
            continue;
        };
        let (Some(node), Some(a), Some(b)) = (
            bodies.index_of(att.node),
            bodies.index_of(host.a),
            bodies.index_of(host.b),
        ) else {
            continue;
        };
        for (key, axis) in [
            (ConstraintKey::AttachmentX(att.id), DVec2::X),
            (ConstraintKey::AttachmentY(att.id), DVec2::Y),
        ] {
            rows.push(Row::Attachment {
                key,
                node,
                a,
                b,
                t: att.t,
                axis,
            });
        }
    }
    rows
}

/// Re-applies cached position multipliers as an initial correction.
pub fn warm_start_positions(rows: &[Row], bodies: &mut Bodies, cache: &MultiplierCache) {
    for row in rows {
        let Some(&lambda) = cache.get(&row.key()) else {
            continue;
        };
        let gradient = row.gradient(&bodies.positions);
        for &(i, g) in gradient.terms() {
            bodies.positions[i] += g * (bodies.inv_mass[i] * lambda);
        }
    }
}

/// Re-applies cached velocity multipliers as an initial impulse.
pub fn warm_start_velocities(rows: &[Row], bodies: &mut Bodies, cache: &MultiplierCache) {
    for row in rows {
        let Some(&lambda) = cache.get(&row.key()) else {
            continue;
        };
        let gradient = row.gradient(&bodies.positions);
        for &(i, g) in gradient.terms() {
            bodies.velocities[i] += g * (bodies.inv_mass[i] * lambda);
        }
    }
}

/// Gauss-Seidel position projection. With a cache, each row's corrections
/// are accumulated into its multiplier.
pub fn solve_positions(
    rows: &[Row],
    bodies: &mut Bodies,
    iterations: u32,
    tolerance: f64,
    mut cache: Option<&mut MultiplierCache>,
) -> u32 {
    let mut used = 0;
    for _ in 0..iterations {
        used += 1;
        let mut worst: f64 = 0.0;
        for row in rows {
            let c = row.value(&bodies.positions);
            worst = worst.max(c.abs());
            if c.abs() <= tolerance {
                continue;
            }
            let gradient = row.gradient(&bodies.positions);
            let w = gradient.effective_inv_mass(bodies);
            if w <= 1e-12 {
                continue;
            }
            let delta = -c / w;
            for &(i, g) in gradient.terms() {
                bodies.positions[i] += g * (bodies.inv_mass[i] * delta);
            }
            if let Some(cache) = cache.as_deref_mut() {
                *cache.entry(row.key()).or_insert(0.0) += delta;
            }
        }
        if worst <= tolerance {
            break;
        }
    }
    used
}

/// Gauss-Seidel projection of velocities onto the constraint tangent space.
pub fn solve_velocities(
    rows: &[Row],
    bodies: &mut Bodies,
    iterations: u32,
    tolerance: f64,
    cache: &mut MultiplierCache,
) -> u32 {
    let mut used = 0;
    for _ in 0..iterations {
        used += 1;
        let mut worst: f64 = 0.0;
        for row in rows {
            let cdot = row.velocity_error(&bodies.positions, &bodies.velocities);
            worst = worst.max(cdot.abs());
            if cdot.abs() <= tolerance {
                continue;
            }
            let gradient = row.gradient(&bodies.positions);
            let w = gradient.effective_inv_mass(bodies);
            if w <= 1e-12 {
                continue;
            }
            let delta = -cdot / w;
            for &(i, g) in gradient.terms() {
                bodies.velocities[i] += g * (bodies.inv_mass[i] * delta);
            }
            *cache.entry(row.key()).or_insert(0.0) += delta;
        }
        if worst <= tolerance {
            break;
        }
    }
    used
}

/// Worst and root-sum-square constraint violation.
pub fn violation(rows: &[Row], x: &[DVec2]) -> (f64, f64) {
    let mut max: f64 = 0.0;
    let mut sum_sq = 0.0;
    for row in rows {
        let c = row.value(x).abs();
        max = max.max(c);
        sum_sq += c * c;
    }
    (max, sum_sq.sqrt())
}
