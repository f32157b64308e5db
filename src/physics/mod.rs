//! Constraint-consistent free motion.
//!
//! The mechanism has no forces: nodes keep whatever velocity a drag gave them,
//! and every sub-step projects positions and velocities back onto the
//! constraint manifold. Two integrators share the same constraint rows; the
//! RATTLE variant additionally warm-starts from multipliers cached per
//! [`ConstraintKey`].

pub mod constraints;
pub mod diagnostics;
pub mod integrator;
pub mod options;

pub use constraints::{gather_rows, Bodies, ConstraintKey, MultiplierCache, Row};
pub use diagnostics::PhysicsDiagnostics;
pub use integrator::{legacy_substep, rattle_substep, SubstepOutcome};
pub use options::{
    EnergyMode, IntegratorMode, MassModel, PhysicsOptions, PhysicsOptionsUpdate, MAX_FRAME_DT,
    MAX_SUBSTEP_DT,
};

use crate::error::EngineError;
use crate::scene::{NodeId, Scene};
use crate::solver::refine_scene;
use glam::DVec2;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub substeps: u32,
    pub substep_dt: f64,
    pub kinetic_energy: f64,
    pub max_violation: f64,
    pub rescale_skipped: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PhysicsEngine {
    enabled: bool,
    options: PhysicsOptions,
    velocities: BTreeMap<NodeId, DVec2>,
    position_multipliers: MultiplierCache,
    velocity_multipliers: MultiplierCache,
    diagnostics: PhysicsDiagnostics,
}

impl PhysicsEngine {
    pub fn new(options: PhysicsOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn options(&self) -> &PhysicsOptions {
        &self.options
    }

    pub fn diagnostics(&self) -> &PhysicsDiagnostics {
        &self.diagnostics
    }

    /// Settles the scene onto its constraints and starts from rest.
    pub fn enable(&mut self, scene: &mut Scene) {
        let report = refine_scene(
            scene,
            self.options.constraint_iterations.saturating_mul(2),
            self.options.position_tolerance,
        );
        log::debug!(
            "physics enabled: settled in {} iterations, residual {:.3e}",
            report.iterations,
            report.max_error
        );
        self.enabled = true;
        self.reset_state();
    }

    pub fn disable(&mut self) {
        if self.enabled {
            log::debug!("physics disabled after {} sub-steps", self.diagnostics.substeps);
        }
        self.enabled = false;
        self.reset_state();
    }

    fn reset_state(&mut self) {
        self.velocities.clear();
        self.clear_multipliers();
        self.diagnostics.reset();
    }

    pub fn clear_multipliers(&mut self) {
        self.position_multipliers.clear();
        self.velocity_multipliers.clear();
    }

    /// Applies a partial options update. Switching integrator or mass model
    /// invalidates cached multipliers.
    pub fn set_options(&mut self, update: &PhysicsOptionsUpdate) -> Result<(), EngineError> {
        let next = self.options.merged(update)?;
        if next.integrator != self.options.integrator || next.mass_model != self.options.mass_model {
            self.clear_multipliers();
        }
        self.options = next;
        Ok(())
    }

    pub fn velocity(&self, node: NodeId) -> DVec2 {
        self.velocities.get(&node).copied().unwrap_or(DVec2::ZERO)
    }

    pub fn set_velocity(&mut self, node: NodeId, velocity: DVec2) {
        if velocity == DVec2::ZERO {
            self.velocities.remove(&node);
        } else {
            self.velocities.insert(node, velocity);
        }
    }

    pub fn velocities(&self) -> &BTreeMap<NodeId, DVec2> {
        &self.velocities
    }

    pub fn position_multipliers(&self) -> &MultiplierCache {
        &self.position_multipliers
    }

    pub fn velocity_multipliers(&self) -> &MultiplierCache {
        &self.velocity_multipliers
    }

    /// Drops velocities of deleted nodes and multipliers of constraints that
    /// no longer exist.
    pub fn prune(&mut self, scene: &Scene) {
        self.velocities.retain(|id, _| scene.node(*id).is_some());
        let bodies = Bodies::gather(scene, &self.velocities, self.options.mass_model);
        let rows = gather_rows(scene, &bodies);
        self.retain_live(&rows);
    }

    fn retain_live(&mut self, rows: &[Row]) {
        let live: HashSet<ConstraintKey> = rows.iter().map(Row::key).collect();
        self.position_multipliers.retain(|key, _| live.contains(key));
        self.velocity_multipliers.retain(|key, _| live.contains(key));
    }

    /// Advances the simulation by `dt` seconds (clamped to [`MAX_FRAME_DT`]).
    pub fn step(&mut self, scene: &mut Scene, dt: f64) -> Result<StepReport, EngineError> {
        if !self.enabled {
            return Err(EngineError::PhysicsDisabled);
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(EngineError::InvalidTimestep(dt));
        }

        let (count, h) = self.options.substep_plan(dt);
        let mut skipped = false;
        for _ in 0..count {
            let mut bodies = Bodies::gather(scene, &self.velocities, self.options.mass_model);
            let rows = gather_rows(scene, &bodies);
            self.retain_live(&rows);

            let outcome = match self.options.integrator {
                IntegratorMode::Legacy => legacy_substep(&mut bodies, &rows, h, &self.options),
                IntegratorMode::RattleSymplectic => rattle_substep(
                    &mut bodies,
                    &rows,
                    h,
                    &self.options,
                    &mut self.position_multipliers,
                    &mut self.velocity_multipliers,
                ),
            };
            skipped |= outcome.rescale_skipped;
            bodies.write_back(scene, &mut self.velocities);
            self.diagnostics.record(scene, &bodies, &rows, &outcome);
        }

        log::trace!(
            "physics step {:.4}s: {} x {:.5}s, energy {:.4}, residual {:.3e}",
            dt,
            count,
            h,
            self.diagnostics.kinetic_energy,
            self.diagnostics.max_violation
        );

        Ok(StepReport {
            substeps: count,
            substep_dt: h,
            kinetic_energy: self.diagnostics.kinetic_energy,
            max_violation: self.diagnostics.max_violation,
            rescale_skipped: skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pendulum() -> (Scene, NodeId, NodeId) {
        let mut scene = Scene::new();
        let pivot = scene.add_node(DVec2::new(0.0, 0.0));
        let bob = scene.add_node(DVec2::new(100.0, 0.0));
        scene.add_stick(pivot, bob).unwrap();
        scene.node_mut(pivot).unwrap().anchored = true;
        (scene, pivot, bob)
    }

    #[test]
    fn step_requires_enabled_and_positive_dt() {
        let (mut scene, _, _) = pendulum();
        let mut physics = PhysicsEngine::default();
        assert_eq!(physics.step(&mut scene, 0.01), Err(EngineError::PhysicsDisabled));
        physics.enable(&mut scene);
        assert!(matches!(physics.step(&mut scene, 0.0), Err(EngineError::InvalidTimestep(_))));
        assert!(matches!(
            physics.step(&mut scene, f64::NAN),
            Err(EngineError::InvalidTimestep(_))
        ));
        let report = physics.step(&mut scene, 1.0 / 60.0).unwrap();
        assert_eq!(report.substeps, 2);
    }

    #[test]
    fn enabled_scene_starts_at_rest() {
        let (mut scene, _, bob) = pendulum();
        let mut physics = PhysicsEngine::default();
        physics.set_velocity(bob, DVec2::new(0.0, 5.0));
        physics.enable(&mut scene);
        assert_eq!(physics.velocity(bob), DVec2::ZERO);
        physics.step(&mut scene, 1.0 / 60.0).unwrap();
        assert_eq!(scene.position(bob), Some(DVec2::new(100.0, 0.0)));
    }

    #[test]
    fn swinging_bob_stays_on_circle() {
        let (mut scene, pivot, bob) = pendulum();
        let mut physics = PhysicsEngine::default();
        physics.enable(&mut scene);
        physics.set_velocity(bob, DVec2::new(0.0, 120.0));
        for _ in 0..120 {
            physics.step(&mut scene, 1.0 / 60.0).unwrap();
        }
        assert_eq!(scene.position(pivot), Some(DVec2::ZERO));
        let r = scene.position(bob).unwrap().length();
        assert!((r - 100.0).abs() < 0.01);
        assert!((physics.velocity(bob).length() - 120.0).abs() < 1e-3);
        assert!(!physics.position_multipliers().is_empty());
    }

    #[test]
    fn switching_integrator_clears_multipliers() {
        let (mut scene, _, bob) = pendulum();
        let mut physics = PhysicsEngine::default();
        physics.enable(&mut scene);
        physics.set_velocity(bob, DVec2::new(0.0, 50.0));
        physics.step(&mut scene, 1.0 / 60.0).unwrap();
        assert!(!physics.position_multipliers().is_empty());
        physics
            .set_options(&PhysicsOptionsUpdate::default().energy_mode(EnergyMode::Preserve))
            .unwrap();
        assert!(!physics.position_multipliers().is_empty());
        physics
            .set_options(&PhysicsOptionsUpdate::default().integrator(IntegratorMode::Legacy))
            .unwrap();
        assert!(physics.position_multipliers().is_empty());
        assert!(physics.velocity_multipliers().is_empty());
    }

    #[test]
    fn step_keeps_no_velocity_for_anchors() {
        let (mut scene, pivot, bob) = pendulum();
        let mut physics = PhysicsEngine::default();
        physics.enable(&mut scene);
        physics.set_velocity(bob, DVec2::new(0.0, 50.0));
        physics.step(&mut scene, 1.0 / 60.0).unwrap();
        assert!(!physics.velocities().contains_key(&pivot));
        assert!(physics.velocities().contains_key(&bob));
    }

    #[test]
    fn prune_drops_dead_constraints() {
        let (mut scene, _, bob) = pendulum();
        let mut physics = PhysicsEngine::default();
        physics.enable(&mut scene);
        physics.set_velocity(bob, DVec2::new(0.0, 50.0));
        physics.step(&mut scene, 1.0 / 60.0).unwrap();
        scene.remove_node(bob);
        physics.prune(&scene);
        assert!(physics.position_multipliers().is_empty());
        assert!(physics.velocities().is_empty());
    }
}
