//! The two interchangeable sub-step integrators and energy management.

use super::constraints::{
    solve_positions, solve_velocities, violation, warm_start_positions, warm_start_velocities,
    Bodies, MultiplierCache, Row,
};
use super::options::{EnergyMode, PhysicsOptions, REST_ENERGY, STRICT_RESIDUAL_LIMIT};
use glam::DVec2;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SubstepOutcome {
    pub energy_before: f64,
    pub energy_after: f64,
    pub rescale_skipped: bool,
    pub position_iterations: u32,
    pub velocity_iterations: u32,
}

/// Integrate, project positions, then re-derive velocity from the net displacement.
pub fn legacy_substep(bodies: &mut Bodies, rows: &[Row], h: f64, options: &PhysicsOptions) -> SubstepOutcome {
    let previous = bodies.positions.clone();
    for i in 0..bodies.ids.len() {
        if bodies.is_free(i) {
            let v = bodies.velocities[i];
            bodies.positions[i] += v * h;
        } else {
            bodies.velocities[i] = DVec2::ZERO;
        }
    }
    let energy_before = bodies.kinetic_energy();

    let position_iterations = solve_positions(
        rows,
        bodies,
        options.constraint_iterations,
        options.position_tolerance,
        None,
    );

    for i in 0..bodies.ids.len() {
        if bodies.is_free(i) {
            bodies.velocities[i] = (bodies.positions[i] - previous[i]) / h;
        }
    }

    let rescale_skipped = restore_energy(bodies, rows, energy_before, options.energy_mode);
    SubstepOutcome {
        energy_before,
        energy_after: bodies.kinetic_energy(),
        rescale_skipped,
        position_iterations,
        velocity_iterations: 0,
    }
}

/// RATTLE-style sub-step with warm-started multipliers.
pub fn rattle_substep(
    bodies: &mut Bodies,
    rows: &[Row],
    h: f64,
    options: &PhysicsOptions,
    position_cache: &mut MultiplierCache,
    velocity_cache: &mut MultiplierCache,
) -> SubstepOutcome {
    let energy_before = bodies.kinetic_energy();

    let mut predicted = bodies.positions.clone();
    for i in 0..bodies.ids.len() {
        if bodies.is_free(i) {
            let v = bodies.velocities[i];
            bodies.positions[i] += v * h;
            predicted[i] = bodies.positions[i];
        }
    }

    warm_start_positions(rows, bodies, position_cache);
    let position_iterations = solve_positions(
        rows,
        bodies,
        options.constraint_iterations,
        options.position_tolerance,
        Some(position_cache),
    );

    for i in 0..bodies.ids.len() {
        if bodies.is_free(i) {
            let correction = (bodies.positions[i] - predicted[i]) / h;
            bodies.velocities[i] += correction;
        }
    }

    warm_start_velocities(rows, bodies, velocity_cache);
    let velocity_iterations = solve_velocities(
        rows,
        bodies,
        options.constraint_iterations,
        options.velocity_tolerance,
        velocity_cache,
    );

    for i in 0..bodies.ids.len() {
        if !bodies.is_free(i) {
            bodies.velocities[i] = DVec2::ZERO;
        }
    }

    let rescale_skipped = restore_energy(bodies, rows, energy_before, options.energy_mode);
    SubstepOutcome {
        energy_before,
        energy_after: bodies.kinetic_energy(),
        rescale_skipped,
        position_iterations,
        velocity_iterations,
    }
}

/// Rescales free-node velocities back to `target` kinetic energy.
///
/// Returns `true` when strict mode refused because the residual is too large.
fn restore_energy(bodies: &mut Bodies, rows: &[Row], target: f64, mode: EnergyMode) -> bool {
    match mode {
        EnergyMode::Off => return false,
        EnergyMode::Strict => {
            let (worst, _) = violation(rows, &bodies.positions);
            if worst > STRICT_RESIDUAL_LIMIT {
                log::warn!(
                    "energy rescale skipped: residual {:.3} exceeds {:.2}",
                    worst,
                    STRICT_RESIDUAL_LIMIT
                );
                return true;
            }
        }
        EnergyMode::Preserve => {}
    }

    if target <= REST_ENERGY {
        bodies.zero_velocities();
        return false;
    }
    let current = bodies.kinetic_energy();
    if current > REST_ENERGY {
        bodies.scale_velocities((target / current).sqrt());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::constraints::gather_rows;
    use crate::physics::options::{IntegratorMode, MassModel};
    use crate::scene::Scene;
    use std::collections::BTreeMap;

    fn spinning_pendulum() -> (Scene, Bodies, Vec<Row>, usize) {
        let mut scene = Scene::new();
        let pivot = scene.add_node(DVec2::new(0.0, 0.0));
        let bob = scene.add_node(DVec2::new(100.0, 0.0));
        scene.add_stick(pivot, bob).unwrap();
        scene.node_mut(pivot).unwrap().anchored = true;
        let mut velocities = BTreeMap::new();
        velocities.insert(bob, DVec2::new(0.0, 200.0));
        let bodies = Bodies::gather(&scene, &velocities, MassModel::Unit);
        let rows = gather_rows(&scene, &bodies);
        let b = bodies.index_of(bob).unwrap();
        (scene, bodies, rows, b)
    }

    #[test]
    fn rattle_keeps_length_and_energy() {
        let (_, mut bodies, rows, b) = spinning_pendulum();
        let options = PhysicsOptions::default();
        let mut pc = MultiplierCache::new();
        let mut vc = MultiplierCache::new();
        let e0 = bodies.kinetic_energy();
        for _ in 0..240 {
            rattle_substep(&mut bodies, &rows, 1.0 / 120.0, &options, &mut pc, &mut vc);
        }
        assert!((bodies.positions[b].length() - 100.0).abs() < 0.01);
        assert!((bodies.kinetic_energy() - e0).abs() / e0 < 1e-6);
        assert!(!pc.is_empty());
        assert_eq!(bodies.positions[0], DVec2::ZERO);
    }

    #[test]
    fn legacy_keeps_length_and_energy() {
        let (_, mut bodies, rows, b) = spinning_pendulum();
        let options = PhysicsOptions {
            integrator: IntegratorMode::Legacy,
            ..PhysicsOptions::default()
        };
        let e0 = bodies.kinetic_energy();
        for _ in 0..240 {
            legacy_substep(&mut bodies, &rows, 1.0 / 120.0, &options);
        }
        assert!((bodies.positions[b].length() - 100.0).abs() < 0.01);
        assert!((bodies.kinetic_energy() - e0).abs() / e0 < 1e-6);
    }

    #[test]
    fn strict_mode_skips_rescale_on_large_residual() {
        let (_, mut bodies, rows, b) = spinning_pendulum();
        bodies.positions[b] = DVec2::new(150.0, 0.0);
        bodies.velocities[b] = DVec2::new(0.0, 1.0);
        let skipped = restore_energy(&mut bodies, &rows, 50.0, EnergyMode::Strict);
        assert!(skipped);
        assert_eq!(bodies.velocities[b], DVec2::new(0.0, 1.0));
        let skipped = restore_energy(&mut bodies, &rows, 50.0, EnergyMode::Preserve);
        assert!(!skipped);
        assert!((bodies.kinetic_energy() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn resting_energy_zeroes_velocity() {
        let (_, mut bodies, rows, b) = spinning_pendulum();
        restore_energy(&mut bodies, &rows, 0.0, EnergyMode::Preserve);
        assert_eq!(bodies.velocities[b], DVec2::ZERO);
    }
}
