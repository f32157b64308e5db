use linkwork::{DVec2, Engine, EngineError, ManualClock, PhysicsOptionsUpdate};

const FRAME: f64 = 1.0 / 60.0;

fn build_pendulum(engine: &mut Engine) -> Result<(linkwork::NodeId, linkwork::NodeId), EngineError> {
    let upper = engine.add_stick(DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0))?;
    let lower = engine.add_stick(DVec2::new(100.0, 0.0), DVec2::new(200.0, 0.0))?;
    let scene = engine.scene();
    let pivot = scene.stick(upper).map(|s| s.a);
    let tip = scene.stick(lower).map(|s| s.b);
    match (pivot, tip) {
        (Some(pivot), Some(tip)) => Ok((pivot, tip)),
        _ => Err(EngineError::StickNotFound(lower)),
    }
}

fn run() -> Result<(), EngineError> {
    let clock = ManualClock::new(0.0);
    let mut engine = Engine::with_clock(clock.clone());
    let (pivot, tip) = build_pendulum(&mut engine)?;
    engine.set_anchor(pivot, true)?;

    let _log_energy = engine.subscribe(|e| {
        let diag = e.physics_diagnostics();
        if diag.substeps > 0 && diag.substeps % 60 == 0 {
            log::info!(
                "t={:.2}s energy={:.3} L={:.3} residual={:.2e} angle={:?}",
                diag.substeps as f64 / 120.0,
                diag.kinetic_energy,
                diag.angular_momentum,
                diag.max_violation,
                diag.joint_angle
            );
        }
    });

    engine.set_physics_enabled(true)?;
    engine.set_physics_options(&PhysicsOptionsUpdate::default().constraint_iterations(32))?;

    // Flick the tip upward over a few frames.
    engine.begin_drag(tip, DVec2::new(200.0, 0.0))?;
    for i in 1..=4 {
        clock.advance(FRAME);
        let result = engine.update_drag(DVec2::new(200.0, 6.0 * i as f64))?;
        log::debug!("drag frame {}: {:?}", i, result);
    }
    engine.end_drag()?;

    for _ in 0..600 {
        clock.advance(FRAME);
        engine.step_physics(FRAME)?;
    }

    let snapshot = engine.snapshot();
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{json}"),
        Err(err) => log::error!("snapshot serialization failed: {err}"),
    }
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        log::error!("demo failed: {err}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}
