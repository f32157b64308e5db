use super::constraints::{violation, Bodies, Row};
use super::integrator::SubstepOutcome;
use super::options::ANGLE_HISTORY_LEN;
use crate::math::{direction_and_length, signed_angle};
use crate::scene::Scene;
use glam::DVec2;
use serde::Serialize;
use std::collections::VecDeque;

/// Per-sub-step measurements for external consumption.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhysicsDiagnostics {
    pub kinetic_energy: f64,
    /// Angular momentum about [`Self::reference_point`].
    pub angular_momentum: f64,
    /// Lowest-id anchor, or the centroid of all nodes when nothing is anchored.
    pub reference_point: DVec2,
    pub max_violation: f64,
    pub l2_violation: f64,
    /// Whether strict mode refused to rescale energy on the last sub-step.
    pub rescale_skipped: bool,
    /// Signed angle between the two lowest-id sticks at the lowest-id joint.
    pub joint_angle: Option<f64>,
    pub angle_history: VecDeque<f64>,
    pub constraint_count: usize,
    pub position_iterations: u32,
    pub velocity_iterations: u32,
    /// Sub-steps simulated since physics was enabled.
    pub substeps: u64,
}

impl PhysicsDiagnostics {
    pub(crate) fn record(
        &mut self,
        scene: &Scene,
        bodies: &Bodies,
        rows: &[Row],
        outcome: &SubstepOutcome,
    ) {
        let (max, l2) = violation(rows, &bodies.positions);
        self.kinetic_energy = bodies.kinetic_energy();
        self.reference_point = reference_point(scene, bodies);
        self.angular_momentum = angular_momentum(bodies, self.reference_point);
        self.max_violation = max;
        self.l2_violation = l2;
        self.rescale_skipped = outcome.rescale_skipped;
        self.constraint_count = rows.len();
        self.position_iterations = outcome.position_iterations;
        self.velocity_iterations = outcome.velocity_iterations;
        self.substeps += 1;

        self.joint_angle = joint_angle(scene, bodies);
        if let Some(angle) = self.joint_angle {
            self.angle_history.push_back(angle);
            while self.angle_history.len() > ANGLE_HISTORY_LEN {
                self.angle_history.pop_front();
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn reference_point(scene: &Scene, bodies: &Bodies) -> DVec2 {
    if let Some(anchor) = scene.nodes().find(|n| n.anchored) {
        if let Some(i) = bodies.index_of(anchor.id) {
            return bodies.positions[i];
        }
    }
    if bodies.positions.is_empty() {
        return DVec2::ZERO;
    }
    bodies.positions.iter().copied().sum::<DVec2>() / bodies.positions.len() as f64
}

fn angular_momentum(bodies: &Bodies, origin: DVec2) -> f64 {
    bodies
        .positions
        .iter()
        .zip(&bodies.velocities)
        .zip(&bodies.mass)
        .map(|((x, v), m)| m * (*x - origin).perp_dot(*v))
        .sum()
}

fn joint_angle(scene: &Scene, bodies: &Bodies) -> Option<f64> {
    for node in scene.nodes() {
        let mut incident: Vec<_> = scene
            .sticks()
            .filter(|s| s.visible && s.touches(node.id))
            .collect();
        if incident.len() < 2 {
            continue;
        }
        incident.sort_by_key(|s| s.id);
        let center = bodies.positions[bodies.index_of(node.id)?];
        let mut dirs = incident.iter().take(2).filter_map(|s| {
            let other = bodies.index_of(s.other(node.id)?)?;
            Some(direction_and_length(center, bodies.positions[other]).0)
        });
        let (first, second) = (dirs.next()?, dirs.next()?);
        return Some(signed_angle(first, second));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::constraints::gather_rows;
    use crate::physics::options::MassModel;
    use std::collections::BTreeMap;

    #[test]
    fn joint_angle_uses_lowest_ids() {
        let mut scene = Scene::new();
        let pivot = scene.add_node(DVec2::new(0.0, 0.0));
        let elbow = scene.add_node(DVec2::new(100.0, 0.0));
        let hand = scene.add_node(DVec2::new(100.0, 100.0));
        scene.add_stick(pivot, elbow).unwrap();
        scene.add_stick(elbow, hand).unwrap();
        scene.node_mut(pivot).unwrap().anchored = true;

        let mut velocities = BTreeMap::new();
        velocities.insert(hand, DVec2::new(-10.0, 0.0));
        let bodies = Bodies::gather(&scene, &velocities, MassModel::Unit);
        let rows = gather_rows(&scene, &bodies);
        let mut diag = PhysicsDiagnostics::default();
        diag.record(&scene, &bodies, &rows, &SubstepOutcome::default());

        // At the elbow: first stick points back to the pivot (-X), second up (+Y).
        let angle = diag.joint_angle.unwrap();
        assert!((angle + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(diag.reference_point, DVec2::ZERO);
        // r x v = (100, 100) x (-10, 0) = 1000
        assert!((diag.angular_momentum - 1000.0).abs() < 1e-9);
        assert!((diag.kinetic_energy - 50.0).abs() < 1e-12);
        assert_eq!(diag.angle_history.len(), 1);
    }

    #[test]
    fn history_is_capped() {
        let mut scene = Scene::new();
        let a = scene.add_node(DVec2::new(0.0, 0.0));
        let b = scene.add_node(DVec2::new(10.0, 0.0));
        let c = scene.add_node(DVec2::new(10.0, 10.0));
        scene.add_stick(a, b).unwrap();
        scene.add_stick(b, c).unwrap();
        let bodies = Bodies::gather(&scene, &BTreeMap::new(), MassModel::Unit);
        let rows = gather_rows(&scene, &bodies);
        let mut diag = PhysicsDiagnostics::default();
        for _ in 0..(ANGLE_HISTORY_LEN + 20) {
            diag.record(&scene, &bodies, &rows, &SubstepOutcome::default());
        }
        assert_eq!(diag.angle_history.len(), ANGLE_HISTORY_LEN);
        assert_eq!(diag.substeps, (ANGLE_HISTORY_LEN + 20) as u64);
    }
}
