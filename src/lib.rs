//! # linkwork
//!
//! Constraint solving and kinematic simulation for 2D mechanisms built from
//! rigid sticks pinned at shared pivots.
//!
//! ## Features
//! - Id-keyed scene of pivots, sticks, line/circle guides and interior hinges
//! - Interactive drag solver (Gauss-Seidel relaxation with subspace pre-projection)
//! - Force-free physics with Legacy and RATTLE-style integrators
//! - Warm-started constraint multipliers, energy rescaling and diagnostics
//! - Cross-platform: Native + WASM support
//!
//! ## Example
//! ```rust,ignore
//! use linkwork::{DVec2, Engine, ManualClock};
//!
//! let clock = ManualClock::new(0.0);
//! let mut engine = Engine::with_clock(clock.clone());
//!
//! // A single stick pinned at the origin
//! let stick = engine.add_stick(DVec2::ZERO, DVec2::new(100.0, 0.0))?;
//! let (pivot, bob) = {
//!     let s = engine.scene().stick(stick).unwrap();
//!     (s.a, s.b)
//! };
//! engine.set_anchor(pivot, true)?;
//!
//! // Swing it by hand, then let it go
//! engine.set_physics_enabled(true)?;
//! engine.begin_drag(bob, DVec2::new(100.0, 0.0))?;
//! clock.advance(1.0 / 60.0);
//! let result = engine.update_drag(DVec2::new(100.0, 20.0))?;
//! engine.end_drag()?;
//! for _ in 0..60 {
//!     engine.step_physics(1.0 / 60.0)?;
//! }
//! println!("mode: {:?}, energy: {}", result.mode, engine.physics_diagnostics().kinetic_energy);
//! ```

pub mod engine;
pub mod error;
pub mod math;
pub mod physics;
pub mod scene;
pub mod solver;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use engine::{
    Clock, DraftPreview, EditConfig, Engine, ManualClock, MonotonicClock, Selection, Subscription,
};
pub use error::EngineError;
pub use math::DVec2;
pub use physics::{
    EnergyMode, IntegratorMode, MassModel, PhysicsDiagnostics, PhysicsEngine, PhysicsOptions,
    PhysicsOptionsUpdate, StepReport,
};
pub use scene::{
    connected_component, AttachmentId, CircleId, Component, EntityRef, HingeChange, LineId,
    NodeId, Scene, SceneSnapshot, StickId,
};
pub use solver::{DragConfig, DragMode, DragSolver, SolveResult};
