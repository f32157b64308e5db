//! WASM entry point - a browser-facing handle on the mechanism engine.
//!
//! Coordinates cross as plain numbers, ids as `u64`, timestamps as
//! milliseconds (`performance.now()`), and scene state as JSON.

use crate::engine::{Engine, ManualClock};
use crate::error::EngineError;
use crate::physics::{EnergyMode, IntegratorMode, MassModel, PhysicsOptionsUpdate};
use crate::scene::{CircleId, EntityRef, LineId, NodeId, StickId};
use glam::DVec2;
use wasm_bindgen::prelude::*;

fn to_js(err: EngineError) -> JsError {
    JsError::new(&err.to_string())
}

#[wasm_bindgen]
pub struct WebEngine {
    engine: Engine,
    clock: ManualClock,
}

#[wasm_bindgen]
impl WebEngine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WebEngine {
        let clock = ManualClock::new(0.0);
        WebEngine {
            engine: Engine::with_clock(clock.clone()),
            clock,
        }
    }

    /// Forwards the browser's frame timestamp.
    pub fn set_time(&self, millis: f64) {
        self.clock.set(millis / 1000.0);
    }

    pub fn snapshot_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.engine.snapshot()).map_err(|e| JsError::new(&e.to_string()))
    }

    pub fn diagnostics_json(&self) -> Result<String, JsError> {
        serde_json::to_string(self.engine.physics_diagnostics())
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Entity under the pointer as a display id (`n3`, `s7`, ...), if any.
    pub fn pick(&self, x: f64, y: f64) -> Option<String> {
        self.engine.pick(DVec2::new(x, y)).map(|e| e.to_string())
    }

    pub fn add_stick(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) -> Result<u64, JsError> {
        self.engine
            .add_stick(DVec2::new(x0, y0), DVec2::new(x1, y1))
            .map(|id| id.0)
            .map_err(to_js)
    }

    pub fn begin_stick(&mut self, x: f64, y: f64) -> Result<(), JsError> {
        self.engine.begin_stick(DVec2::new(x, y)).map_err(to_js)
    }

    pub fn update_stick_preview(&mut self, x: f64, y: f64) -> Result<(), JsError> {
        self.engine.update_stick_preview(DVec2::new(x, y)).map_err(to_js)
    }

    pub fn end_stick(&mut self, x: f64, y: f64) -> Result<u64, JsError> {
        self.engine
            .end_stick(DVec2::new(x, y))
            .map(|id| id.0)
            .map_err(to_js)
    }

    pub fn begin_line(&mut self, x: f64, y: f64) -> Result<(), JsError> {
        self.engine.begin_line(DVec2::new(x, y)).map_err(to_js)
    }

    pub fn update_line_preview(&mut self, x: f64, y: f64) -> Result<(), JsError> {
        self.engine.update_line_preview(DVec2::new(x, y)).map_err(to_js)
    }

    pub fn end_line(&mut self, x: f64, y: f64) -> Result<u64, JsError> {
        self.engine
            .end_line(DVec2::new(x, y))
            .map(|id| id.0)
            .map_err(to_js)
    }

    pub fn begin_circle(&mut self, x: f64, y: f64) -> Result<(), JsError> {
        self.engine.begin_circle(DVec2::new(x, y)).map_err(to_js)
    }

    pub fn update_circle_preview(&mut self, x: f64, y: f64) -> Result<(), JsError> {
        self.engine.update_circle_preview(DVec2::new(x, y)).map_err(to_js)
    }

    pub fn end_circle(&mut self, x: f64, y: f64) -> Result<u64, JsError> {
        self.engine
            .end_circle(DVec2::new(x, y))
            .map(|id| id.0)
            .map_err(to_js)
    }

    pub fn cancel_draft(&mut self) -> Result<(), JsError> {
        self.engine.cancel_draft().map_err(to_js)
    }

    pub fn begin_resize(&mut self, stick: u64, node: u64) -> Result<(), JsError> {
        self.engine
            .begin_resize(StickId(stick), NodeId(node))
            .map_err(to_js)
    }

    pub fn update_resize(&mut self, x: f64, y: f64) -> Result<(), JsError> {
        self.engine.update_resize(DVec2::new(x, y)).map_err(to_js)
    }

    pub fn end_resize(&mut self, x: f64, y: f64) -> Result<(), JsError> {
        self.engine
            .end_resize(DVec2::new(x, y))
            .map(|_| ())
            .map_err(to_js)
    }

    pub fn set_anchor(&mut self, node: u64, anchored: bool) -> Result<(), JsError> {
        self.engine.set_anchor(NodeId(node), anchored).map_err(to_js)
    }

    pub fn begin_drag(&mut self, node: u64, x: f64, y: f64) -> Result<(), JsError> {
        self.engine
            .begin_drag(NodeId(node), DVec2::new(x, y))
            .map_err(to_js)
    }

    /// Returns the worst residual after the solve.
    pub fn update_drag(&mut self, x: f64, y: f64) -> Result<f64, JsError> {
        self.engine
            .update_drag(DVec2::new(x, y))
            .map(|r| r.max_error)
            .map_err(to_js)
    }

    pub fn end_drag(&mut self) -> Result<(), JsError> {
        self.engine.end_drag().map_err(to_js)
    }

    /// `kind` is one of `node`, `stick`, `line`, `circle`.
    pub fn select(&mut self, kind: &str, id: u64) -> Result<(), JsError> {
        let entity = match kind {
            "node" => EntityRef::Node(NodeId(id)),
            "stick" => EntityRef::Stick(StickId(id)),
            "line" => EntityRef::Line(LineId(id)),
            "circle" => EntityRef::Circle(CircleId(id)),
            other => return Err(JsError::new(&format!("unknown entity kind: {other}"))),
        };
        self.engine.select(entity).map_err(to_js)
    }

    pub fn clear_selection(&mut self) {
        self.engine.clear_selection();
    }

    pub fn delete_selection(&mut self) -> Result<usize, JsError> {
        self.engine.delete_selection().map_err(to_js)
    }

    pub fn set_physics_enabled(&mut self, enabled: bool) -> Result<(), JsError> {
        self.engine.set_physics_enabled(enabled).map_err(to_js)
    }

    /// `integrator`: `legacy` | `rattle`; `energy`: `strict` | `preserve` | `off`;
    /// `mass`: `unit` | `lumped`. Empty strings leave a field unchanged.
    pub fn set_physics_modes(
        &mut self,
        integrator: &str,
        energy: &str,
        mass: &str,
    ) -> Result<(), JsError> {
        let mut update = PhysicsOptionsUpdate::default();
        update.integrator = match integrator {
            "" => None,
            "legacy" => Some(IntegratorMode::Legacy),
            "rattle" => Some(IntegratorMode::RattleSymplectic),
            other => return Err(JsError::new(&format!("unknown integrator: {other}"))),
        };
        update.energy_mode = match energy {
            "" => None,
            "strict" => Some(EnergyMode::Strict),
            "preserve" => Some(EnergyMode::Preserve),
            "off" => Some(EnergyMode::Off),
            other => return Err(JsError::new(&format!("unknown energy mode: {other}"))),
        };
        update.mass_model = match mass {
            "" => None,
            "unit" => Some(MassModel::Unit),
            "lumped" => Some(MassModel::Lumped),
            other => return Err(JsError::new(&format!("unknown mass model: {other}"))),
        };
        self.engine.set_physics_options(&update).map_err(to_js)
    }

    pub fn set_solver_budget(
        &mut self,
        substeps: u32,
        iterations: u32,
        position_tolerance: f64,
        velocity_tolerance: f64,
    ) -> Result<(), JsError> {
        let update = PhysicsOptionsUpdate::default()
            .substeps(substeps)
            .constraint_iterations(iterations)
            .position_tolerance(position_tolerance)
            .velocity_tolerance(velocity_tolerance);
        self.engine.set_physics_options(&update).map_err(to_js)
    }

    /// `dt` in seconds.
    pub fn step_physics(&mut self, dt: f64) -> Result<(), JsError> {
        self.engine.step_physics(dt).map(|_| ()).map_err(to_js)
    }
}

impl Default for WebEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    // A logger may already be installed by the host page.
    let _ = console_log::init_with_level(log::Level::Warn);
}
