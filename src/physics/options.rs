use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// Longest frame time a single `step` will simulate, in seconds.
pub const MAX_FRAME_DT: f64 = 0.05;
/// Longest sub-step, in seconds.
pub const MAX_SUBSTEP_DT: f64 = 1.0 / 120.0;
/// Residual above which strict energy mode refuses to rescale velocities.
pub const STRICT_RESIDUAL_LIMIT: f64 = 0.35;
/// Samples kept in the joint-angle history.
pub const ANGLE_HISTORY_LEN: usize = 512;
/// Kinetic energies at or below this count as "at rest".
pub const REST_ENERGY: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegratorMode {
    /// Integrate, project positions, re-derive velocity from the displacement.
    Legacy,
    /// RATTLE-style position + velocity projection with warm-started multipliers.
    RattleSymplectic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MassModel {
    /// Every free node has unit mass.
    Unit,
    /// Free nodes carry half the rest length of their incident sticks.
    Lumped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergyMode {
    /// Restore pre-correction energy unless the residual is above
    /// [`STRICT_RESIDUAL_LIMIT`].
    Strict,
    /// Always restore pre-correction energy.
    Preserve,
    /// Never rescale.
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsOptions {
    /// Minimum number of sub-steps per call.
    pub substeps: u32,
    pub constraint_iterations: u32,
    pub position_tolerance: f64,
    pub velocity_tolerance: f64,
    pub integrator: IntegratorMode,
    pub mass_model: MassModel,
    pub energy_mode: EnergyMode,
}

impl Default for PhysicsOptions {
    fn default() -> Self {
        Self {
            substeps: 1,
            constraint_iterations: 24,
            position_tolerance: 1e-4,
            velocity_tolerance: 1e-4,
            integrator: IntegratorMode::RattleSymplectic,
            mass_model: MassModel::Unit,
            energy_mode: EnergyMode::Strict,
        }
    }
}

/// Partial update of [`PhysicsOptions`]; `None` leaves a field unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicsOptionsUpdate {
    pub substeps: Option<u32>,
    pub constraint_iterations: Option<u32>,
    pub position_tolerance: Option<f64>,
    pub velocity_tolerance: Option<f64>,
    pub integrator: Option<IntegratorMode>,
    pub mass_model: Option<MassModel>,
    pub energy_mode: Option<EnergyMode>,
}

impl PhysicsOptionsUpdate {
    pub fn integrator(mut self, mode: IntegratorMode) -> Self {
        self.integrator = Some(mode);
        self
    }

    pub fn energy_mode(mut self, mode: EnergyMode) -> Self {
        self.energy_mode = Some(mode);
        self
    }

    pub fn mass_model(mut self, model: MassModel) -> Self {
        self.mass_model = Some(model);
        self
    }

    pub fn substeps(mut self, substeps: u32) -> Self {
        self.substeps = Some(substeps);
        self
    }

    pub fn constraint_iterations(mut self, iterations: u32) -> Self {
        self.constraint_iterations = Some(iterations);
        self
    }

    pub fn position_tolerance(mut self, tolerance: f64) -> Self {
        self.position_tolerance = Some(tolerance);
        self
    }

    pub fn velocity_tolerance(mut self, tolerance: f64) -> Self {
        self.velocity_tolerance = Some(tolerance);
        self
    }
}

fn clamp_tolerance(name: &'static str, value: f64) -> Result<f64, EngineError> {
    if !value.is_finite() {
        return Err(EngineError::InvalidOption { name, value });
    }
    Ok(value.clamp(1e-9, 1.0))
}

impl PhysicsOptions {
    /// Returns the options with `update` applied, each field clamped into range.
    /// Non-finite tolerances reject the whole update.
    pub fn merged(&self, update: &PhysicsOptionsUpdate) -> Result<Self, EngineError> {
        let mut next = *self;
        if let Some(value) = update.position_tolerance {
            next.position_tolerance = clamp_tolerance("position_tolerance", value)?;
        }
        if let Some(value) = update.velocity_tolerance {
            next.velocity_tolerance = clamp_tolerance("velocity_tolerance", value)?;
        }
        if let Some(value) = update.substeps {
            next.substeps = value.clamp(1, 32);
        }
        if let Some(value) = update.constraint_iterations {
            next.constraint_iterations = value.clamp(1, 256);
        }
        if let Some(mode) = update.integrator {
            next.integrator = mode;
        }
        if let Some(model) = update.mass_model {
            next.mass_model = model;
        }
        if let Some(mode) = update.energy_mode {
            next.energy_mode = mode;
        }
        Ok(next)
    }

    /// Number and length of sub-steps for a clamped frame time.
    pub fn substep_plan(&self, dt: f64) -> (u32, f64) {
        let dt = dt.min(MAX_FRAME_DT);
        let needed = (dt / MAX_SUBSTEP_DT - 1e-9).ceil() as u32;
        let count = needed.max(self.substeps).max(1);
        (count, dt / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_clamps_each_field_independently() {
        let opts = PhysicsOptions::default();
        let next = opts
            .merged(&PhysicsOptionsUpdate {
                substeps: Some(0),
                constraint_iterations: Some(10_000),
                position_tolerance: Some(5.0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(next.substeps, 1);
        assert_eq!(next.constraint_iterations, 256);
        assert_eq!(next.position_tolerance, 1.0);
        assert_eq!(next.velocity_tolerance, opts.velocity_tolerance);
        assert_eq!(next.integrator, IntegratorMode::RattleSymplectic);
    }

    #[test]
    fn non_finite_tolerance_rejects_update() {
        let opts = PhysicsOptions::default();
        let err = opts
            .merged(&PhysicsOptionsUpdate::default().velocity_tolerance(f64::NAN))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidOption { name: "velocity_tolerance", .. }));
    }

    #[test]
    fn substep_plan_clamps_frame_and_caps_substep_length() {
        let opts = PhysicsOptions::default();
        let (n, h) = opts.substep_plan(1.0);
        assert_eq!(n, 6);
        assert!((h * n as f64 - MAX_FRAME_DT).abs() < 1e-12);
        let (n, h) = opts.substep_plan(1.0 / 60.0);
        assert_eq!(n, 2);
        assert!(h <= MAX_SUBSTEP_DT + 1e-12);
        let four = opts
            .merged(&PhysicsOptionsUpdate::default().substeps(4))
            .unwrap();
        let (n, _) = four.substep_plan(1.0 / 60.0);
        assert_eq!(n, 4);
    }
}
