//! The owned mechanism engine: the only way to mutate a scene.
//!
//! Every mutating operation validates its preconditions before touching any
//! state, so an `Err` always means nothing changed. Listeners registered with
//! [`Engine::subscribe`] run after each successful mutation.

mod clock;
mod config;
mod draft;
mod drag;
mod observer;
mod selection;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::EditConfig;
pub use draft::DraftPreview;
pub use observer::Subscription;
pub use selection::Selection;

use crate::error::EngineError;
use crate::math::is_finite_point;
use crate::physics::{
    PhysicsDiagnostics, PhysicsEngine, PhysicsOptions, PhysicsOptionsUpdate, StepReport,
};
use crate::scene::{EntityRef, NodeId, Scene, SceneSnapshot, StickId};
use crate::solver::DragConfig;
use draft::{Draft, ResizeSession};
use drag::DragSession;
use glam::DVec2;
use observer::Listeners;

pub struct Engine {
    scene: Scene,
    physics: PhysicsEngine,
    edit: EditConfig,
    drag_config: DragConfig,
    draft: Option<Draft>,
    resize: Option<ResizeSession>,
    drag: Option<DragSession>,
    selection: Selection,
    clock: Box<dyn Clock>,
    listeners: Listeners,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }

    pub fn with_clock<C: Clock + 'static>(clock: C) -> Self {
        Self {
            scene: Scene::new(),
            physics: PhysicsEngine::default(),
            edit: EditConfig::default(),
            drag_config: DragConfig::default(),
            draft: None,
            resize: None,
            drag: None,
            selection: Selection::default(),
            clock: Box::new(clock),
            listeners: Listeners::default(),
        }
    }

    pub fn with_edit_config(mut self, config: EditConfig) -> Self {
        self.edit = config;
        self
    }

    pub fn with_drag_config(mut self, config: DragConfig) -> Self {
        self.drag_config = config;
        self
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        self.scene.snapshot()
    }

    pub fn edit_config(&self) -> &EditConfig {
        &self.edit
    }

    pub fn drag_config(&self) -> &DragConfig {
        &self.drag_config
    }

    /// Registers `listener` to run after every successful mutation.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&Engine) + 'static,
    {
        self.listeners.add(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn notify(&self) {
        self.listeners.notify(self);
    }

    /// Topmost entity under `p`: pivots first, then sticks, lines, circles.
    pub fn pick(&self, p: DVec2) -> Option<EntityRef> {
        if let Some(node) = self.scene.nearest_node(p, self.edit.snap_radius, &[]) {
            return Some(EntityRef::Node(node));
        }
        if let Some(hit) = self.scene.nearest_stick(p, self.edit.stick_hit_radius) {
            return Some(EntityRef::Stick(hit.stick));
        }
        if let Some(line) = self.scene.nearest_line(p, self.edit.line_snap_distance) {
            return Some(EntityRef::Line(line));
        }
        self.scene
            .nearest_circle(p, self.edit.line_snap_distance)
            .map(EntityRef::Circle)
    }

    fn ensure_editable(&self) -> Result<(), EngineError> {
        if self.physics.is_enabled() {
            return Err(EngineError::PhysicsRunning);
        }
        if self.drag.is_some() {
            return Err(EngineError::DragInProgress);
        }
        Ok(())
    }

    fn ensure_finite(p: DVec2) -> Result<(), EngineError> {
        if is_finite_point(p) {
            Ok(())
        } else {
            Err(EngineError::NonFinitePoint { x: p.x, y: p.y })
        }
    }

    /// Drops state that refers to deleted entities after a structural change.
    fn after_structural_change(&mut self) {
        self.physics.prune(&self.scene);
        self.selection.retain_live(&self.scene);
    }

    pub fn set_anchor(&mut self, node: NodeId, anchored: bool) -> Result<(), EngineError> {
        let entry = self
            .scene
            .node_mut(node)
            .ok_or(EngineError::NodeNotFound(node))?;
        entry.anchored = anchored;
        if anchored {
            self.physics.set_velocity(node, DVec2::ZERO);
        }
        log::debug!("{} {}", node, if anchored { "anchored" } else { "released" });
        self.notify();
        Ok(())
    }

    pub fn set_stick_visible(&mut self, stick: StickId, visible: bool) -> Result<(), EngineError> {
        let entry = self
            .scene
            .stick_mut(stick)
            .ok_or(EngineError::StickNotFound(stick))?;
        entry.visible = visible;
        self.physics.prune(&self.scene);
        self.notify();
        Ok(())
    }

    pub fn is_physics_enabled(&self) -> bool {
        self.physics.is_enabled()
    }

    /// Enabling cancels drafts, resizes and drags, clears the selection,
    /// settles the scene and starts from rest. Disabling zeroes velocities.
    pub fn set_physics_enabled(&mut self, enabled: bool) -> Result<(), EngineError> {
        if enabled == self.physics.is_enabled() {
            return Ok(());
        }
        if enabled {
            self.draft = None;
            self.cancel_resize_session();
            self.drag = None;
            self.selection.clear();
            self.physics.enable(&mut self.scene);
        } else {
            self.drag = None;
            self.physics.disable();
        }
        self.notify();
        Ok(())
    }

    pub fn physics_options(&self) -> &PhysicsOptions {
        self.physics.options()
    }

    pub fn set_physics_options(&mut self, update: &PhysicsOptionsUpdate) -> Result<(), EngineError> {
        self.physics.set_options(update)?;
        self.notify();
        Ok(())
    }

    /// Advances the simulation. Refused while a drag is active.
    pub fn step_physics(&mut self, dt: f64) -> Result<StepReport, EngineError> {
        if !self.physics.is_enabled() {
            return Err(EngineError::PhysicsDisabled);
        }
        if self.drag.is_some() {
            return Err(EngineError::DragInProgress);
        }
        let report = self.physics.step(&mut self.scene, dt)?;
        self.notify();
        Ok(report)
    }

    pub fn physics_diagnostics(&self) -> &PhysicsDiagnostics {
        self.physics.diagnostics()
    }

    pub fn velocity(&self, node: NodeId) -> DVec2 {
        self.physics.velocity(node)
    }
}
