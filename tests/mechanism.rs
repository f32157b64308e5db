use linkwork::{
    DVec2, DragMode, Engine, EngineError, IntegratorMode, ManualClock, NodeId,
    PhysicsOptionsUpdate, Scene, StickId,
};

fn engine() -> (Engine, ManualClock) {
    let clock = ManualClock::new(0.0);
    (Engine::with_clock(clock.clone()), clock)
}

fn endpoints(engine: &Engine, stick: StickId) -> (NodeId, NodeId) {
    let s = engine.scene().stick(stick).unwrap();
    (s.a, s.b)
}

fn max_stick_error(scene: &Scene) -> f64 {
    scene
        .sticks()
        .filter(|s| s.visible)
        .map(|s| {
            let len = scene.position(s.a).unwrap().distance(scene.position(s.b).unwrap());
            (len - s.rest_length).abs()
        })
        .fold(0.0, f64::max)
}

#[test]
fn anchored_stick_drag_scenario() {
    let (mut e, _) = engine();
    let stick = e
        .add_stick(DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0))
        .unwrap();
    let (a, b) = endpoints(&e, stick);
    e.set_anchor(a, true).unwrap();

    e.begin_drag(b, DVec2::new(100.0, 0.0)).unwrap();
    e.update_drag(DVec2::new(50.0, 50.0)).unwrap();
    e.end_drag().unwrap();

    let pa = e.scene().position(a).unwrap();
    let pb = e.scene().position(b).unwrap();
    assert!(pa.length() < 1e-6);
    assert!((pa.distance(pb) - 100.0).abs() < 0.1);
}

#[test]
fn four_bar_stays_rigid_under_unreachable_drag() {
    let (mut e, _) = engine();
    let ab = e.add_stick(DVec2::new(0.0, 0.0), DVec2::new(50.0, 100.0)).unwrap();
    let bc = e.add_stick(DVec2::new(50.0, 100.0), DVec2::new(150.0, 100.0)).unwrap();
    let cd = e.add_stick(DVec2::new(150.0, 100.0), DVec2::new(200.0, 0.0)).unwrap();
    let (a, b) = endpoints(&e, ab);
    let (_, c) = endpoints(&e, bc);
    let (_, d) = endpoints(&e, cd);
    e.set_anchor(a, true).unwrap();
    e.set_anchor(d, true).unwrap();

    e.begin_drag(b, DVec2::new(50.0, 100.0)).unwrap();
    for target in [
        DVec2::new(60.0, 110.0),
        DVec2::new(90.0, 140.0),
        DVec2::new(130.0, 200.0),
        DVec2::new(250.0, 50.0),
    ] {
        let result = e.update_drag(target).unwrap();
        assert_eq!(result.mode, DragMode::Soft);
        assert!(max_stick_error(e.scene()) <= 0.5);
    }
    e.end_drag().unwrap();

    assert_eq!(e.scene().position(a), Some(DVec2::new(0.0, 0.0)));
    assert_eq!(e.scene().position(d), Some(DVec2::new(200.0, 0.0)));
    assert!(e.scene().position(c).is_some());
}

#[test]
fn anchors_hold_through_drags_and_physics() {
    let (mut e, clock) = engine();
    let upper = e.add_stick(DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0)).unwrap();
    let lower = e.add_stick(DVec2::new(100.0, 0.0), DVec2::new(200.0, 0.0)).unwrap();
    let (pivot, elbow) = endpoints(&e, upper);
    let (_, tip) = endpoints(&e, lower);
    e.set_anchor(pivot, true).unwrap();
    let anchor = e.scene().position(pivot).unwrap();

    e.set_physics_enabled(true).unwrap();
    e.begin_drag(elbow, DVec2::new(100.0, 0.0)).unwrap();
    clock.advance(1.0 / 60.0);
    e.update_drag(DVec2::new(80.0, 60.0)).unwrap();
    e.end_drag().unwrap();
    for _ in 0..90 {
        e.step_physics(1.0 / 60.0).unwrap();
        assert_eq!(e.scene().position(pivot), Some(anchor));
        assert!(max_stick_error(e.scene()) <= 0.5);
    }
    assert!(e.velocity(tip).length() > 0.0);
    assert_eq!(e.velocity(pivot), DVec2::ZERO);
}

#[test]
fn dragging_an_anchor_moves_it() {
    let (mut e, _) = engine();
    let stick = e.add_stick(DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0)).unwrap();
    let (a, _) = endpoints(&e, stick);
    e.set_anchor(a, true).unwrap();
    e.begin_drag(a, DVec2::new(0.0, 0.0)).unwrap();
    let result = e.update_drag(DVec2::new(0.0, 40.0)).unwrap();
    assert_eq!(result.mode, DragMode::Fixed);
    assert_eq!(e.scene().position(a), Some(DVec2::new(0.0, 40.0)));
}

#[test]
fn disjoint_components_are_untouched() {
    let (mut e, _) = engine();
    let left = e.add_stick(DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0)).unwrap();
    let right = e.add_stick(DVec2::new(300.0, 0.0), DVec2::new(400.0, 37.5)).unwrap();
    let (_, lb) = endpoints(&e, left);
    let (ra, rb) = endpoints(&e, right);
    let before = (e.scene().position(ra).unwrap(), e.scene().position(rb).unwrap());

    e.begin_drag(lb, DVec2::new(100.0, 0.0)).unwrap();
    e.update_drag(DVec2::new(250.0, -80.0)).unwrap();
    e.update_drag(DVec2::new(320.0, 10.0)).unwrap();
    e.end_drag().unwrap();

    let after = (e.scene().position(ra).unwrap(), e.scene().position(rb).unwrap());
    assert_eq!(before.0.x.to_bits(), after.0.x.to_bits());
    assert_eq!(before.0.y.to_bits(), after.0.y.to_bits());
    assert_eq!(before.1.x.to_bits(), after.1.x.to_bits());
    assert_eq!(before.1.y.to_bits(), after.1.y.to_bits());
}

#[test]
fn line_snap_then_release() {
    let (mut e, _) = engine();
    e.begin_line(DVec2::new(-200.0, 50.0)).unwrap();
    let line = e.end_line(DVec2::new(200.0, 50.0)).unwrap();
    let stick = e.add_stick(DVec2::new(0.0, 0.0), DVec2::new(0.0, 30.0)).unwrap();
    let (_, tip) = endpoints(&e, stick);

    e.begin_drag(tip, DVec2::new(0.0, 30.0)).unwrap();
    e.update_drag(DVec2::new(0.0, 45.0)).unwrap();
    assert_eq!(e.scene().node(tip).unwrap().line(), Some(line));
    assert!((e.scene().position(tip).unwrap().y - 50.0).abs() < 0.1);

    // Mostly tangential motion keeps the node on the line.
    e.update_drag(DVec2::new(40.0, 70.0)).unwrap();
    assert_eq!(e.scene().node(tip).unwrap().line(), Some(line));
    let p = e.scene().position(tip).unwrap();
    assert!((p.y - 50.0).abs() < 0.1);
    assert!((p.x - 40.0).abs() < 0.1);

    // A steep pull away from the line releases it.
    e.update_drag(DVec2::new(40.0, 100.0)).unwrap();
    assert_eq!(e.scene().node(tip).unwrap().line(), None);
    assert!((e.scene().position(tip).unwrap().y - 100.0).abs() < 0.1);
    e.end_drag().unwrap();
}

#[test]
fn end_drag_without_drag_is_a_no_op() {
    let (mut e, _) = engine();
    e.add_stick(DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0)).unwrap();
    let before = e.snapshot();
    let err = e.end_drag().unwrap_err();
    assert_eq!(err, EngineError::NoActiveDrag);
    assert_eq!(err.to_string(), "no active drag");
    assert_eq!(e.snapshot(), before);
    assert!(matches!(e.update_drag(DVec2::ZERO), Err(EngineError::NoActiveDrag)));
    assert_eq!(e.snapshot(), before);
}

fn mean_squared_speed(e: &Engine, nodes: &[NodeId]) -> f64 {
    nodes.iter().map(|&n| e.velocity(n).length_squared()).sum::<f64>() / nodes.len() as f64
}

fn energy_ratio(integrator: IntegratorMode) -> f64 {
    let (mut e, clock) = engine();
    let upper = e.add_stick(DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0)).unwrap();
    let lower = e.add_stick(DVec2::new(100.0, 0.0), DVec2::new(200.0, 0.0)).unwrap();
    let (pivot, elbow) = endpoints(&e, upper);
    let (_, tip) = endpoints(&e, lower);
    e.set_anchor(pivot, true).unwrap();
    e.set_physics_enabled(true).unwrap();
    e.set_physics_options(&PhysicsOptionsUpdate::default().integrator(integrator))
        .unwrap();

    e.begin_drag(tip, DVec2::new(200.0, 0.0)).unwrap();
    clock.advance(1.0 / 60.0);
    e.update_drag(DVec2::new(199.0, 12.0)).unwrap();
    e.end_drag().unwrap();

    let free = [elbow, tip];
    let mut early = Vec::new();
    let mut late = Vec::new();
    for step in 1..=150 {
        clock.advance(1.0 / 60.0);
        e.step_physics(1.0 / 60.0).unwrap();
        assert!(max_stick_error(e.scene()) <= 0.5);
        if (10..=40).contains(&step) {
            early.push(mean_squared_speed(&e, &free));
        }
        if (120..=150).contains(&step) {
            late.push(mean_squared_speed(&e, &free));
        }
    }
    let early = early.iter().sum::<f64>() / early.len() as f64;
    let late = late.iter().sum::<f64>() / late.len() as f64;
    assert!(early > 1.0, "drag should inject motion, got {early}");
    late / early
}

#[test]
fn rattle_energy_stays_bounded() {
    let ratio = energy_ratio(IntegratorMode::RattleSymplectic);
    assert!((0.75..=1.35).contains(&ratio), "ratio {ratio}");
}

#[test]
fn legacy_energy_stays_bounded() {
    let ratio = energy_ratio(IntegratorMode::Legacy);
    assert!((0.75..=1.35).contains(&ratio), "ratio {ratio}");
}

#[test]
fn hinge_follows_host_during_drag() {
    let (mut e, _) = engine();
    let host = e.add_stick(DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0)).unwrap();
    let arm = e.add_stick(DVec2::new(50.0, 3.0), DVec2::new(50.0, 80.0)).unwrap();
    let (pivot, end) = endpoints(&e, host);
    let (hinge, _) = endpoints(&e, arm);
    e.set_anchor(pivot, true).unwrap();
    let t = e.scene().node_attachment(hinge).unwrap().t;

    e.begin_drag(end, DVec2::new(100.0, 0.0)).unwrap();
    e.update_drag(DVec2::new(0.0, 100.0)).unwrap();
    e.end_drag().unwrap();

    let scene = e.scene();
    let pa = scene.position(pivot).unwrap();
    let pb = scene.position(end).unwrap();
    let ph = scene.position(hinge).unwrap();
    assert!(ph.distance(pa.lerp(pb, t)) <= 0.5);
    assert!(max_stick_error(scene) <= 0.5);
    assert!(pb.y > 50.0);
}

/// Nudges `driver`, lets the mechanism run for two seconds and checks that
/// `guided` stays on its guide the whole time while actually moving.
fn run_guided(
    e: &mut Engine,
    clock: &ManualClock,
    integrator: IntegratorMode,
    driver: NodeId,
    nudge: DVec2,
    guided: NodeId,
    off_guide: impl Fn(&Engine) -> f64,
) {
    e.set_physics_enabled(true).unwrap();
    e.set_physics_options(&PhysicsOptionsUpdate::default().integrator(integrator))
        .unwrap();
    let start = e.scene().position(driver).unwrap();
    e.begin_drag(driver, start).unwrap();
    clock.advance(1.0 / 60.0);
    e.update_drag(start + nudge).unwrap();
    e.end_drag().unwrap();

    let origin = e.scene().position(guided).unwrap();
    let mut travel = 0.0f64;
    for _ in 0..120 {
        clock.advance(1.0 / 60.0);
        e.step_physics(1.0 / 60.0).unwrap();
        let drift = off_guide(e);
        assert!(drift <= 0.5, "{integrator:?} drifted {drift} off the guide");
        assert!(max_stick_error(e.scene()) <= 0.5);
        travel = travel.max(e.scene().position(guided).unwrap().distance(origin));
    }
    assert!(travel > 1.0, "{integrator:?} barely moved the guided node ({travel})");
}

/// Crank anchored at the origin driving a slider on the x axis.
fn slider_crank(integrator: IntegratorMode) {
    let (mut e, clock) = engine();
    e.begin_line(DVec2::new(-300.0, 0.0)).unwrap();
    let line = e.end_line(DVec2::new(300.0, 0.0)).unwrap();
    let crank = e.add_stick(DVec2::new(0.0, 0.0), DVec2::new(0.0, 50.0)).unwrap();
    let rod = e.add_stick(DVec2::new(0.0, 50.0), DVec2::new(120.0, 0.0)).unwrap();
    let (pivot, elbow) = endpoints(&e, crank);
    let (_, slider) = endpoints(&e, rod);
    e.set_anchor(pivot, true).unwrap();

    e.begin_drag(slider, DVec2::new(120.0, 0.0)).unwrap();
    e.update_drag(DVec2::new(120.0, 0.0)).unwrap();
    e.end_drag().unwrap();
    assert_eq!(e.scene().node(slider).unwrap().line(), Some(line));

    run_guided(&mut e, &clock, integrator, elbow, DVec2::new(3.0, 0.0), slider, |e| {
        e.scene().position(slider).unwrap().y.abs()
    });
    assert_eq!(e.scene().node(slider).unwrap().line(), Some(line));
}

#[test]
fn rattle_keeps_slider_on_its_line() {
    slider_crank(IntegratorMode::RattleSymplectic);
}

#[test]
fn legacy_keeps_slider_on_its_line() {
    slider_crank(IntegratorMode::Legacy);
}

/// Four-bar whose rocker tip rides a circle of radius 100 around (200, 0).
fn circle_rocker(integrator: IntegratorMode) {
    let (mut e, clock) = engine();
    let center = DVec2::new(200.0, 0.0);
    e.begin_circle(center).unwrap();
    let circle = e.end_circle(DVec2::new(200.0, 100.0)).unwrap();
    let crank = e.add_stick(DVec2::new(0.0, 0.0), DVec2::new(0.0, 80.0)).unwrap();
    let coupler = e.add_stick(DVec2::new(0.0, 80.0), DVec2::new(100.0, 0.0)).unwrap();
    let (pivot, elbow) = endpoints(&e, crank);
    let (_, rider) = endpoints(&e, coupler);
    e.set_anchor(pivot, true).unwrap();

    e.begin_drag(rider, DVec2::new(100.0, 0.0)).unwrap();
    e.update_drag(DVec2::new(100.0, 0.0)).unwrap();
    e.end_drag().unwrap();
    assert_eq!(e.scene().node(rider).unwrap().circle(), Some(circle));

    run_guided(&mut e, &clock, integrator, elbow, DVec2::new(3.0, 0.0), rider, |e| {
        (e.scene().position(rider).unwrap().distance(center) - 100.0).abs()
    });
    assert_eq!(e.scene().node(rider).unwrap().circle(), Some(circle));
}

#[test]
fn rattle_keeps_rider_on_its_circle() {
    circle_rocker(IntegratorMode::RattleSymplectic);
}

#[test]
fn legacy_keeps_rider_on_its_circle() {
    circle_rocker(IntegratorMode::Legacy);
}

/// Pendulum with a free arm hinged halfway along it.
fn hinged_pendulum(integrator: IntegratorMode) {
    let (mut e, clock) = engine();
    let host = e.add_stick(DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0)).unwrap();
    let arm = e.add_stick(DVec2::new(50.0, 3.0), DVec2::new(50.0, 80.0)).unwrap();
    let (pivot, end) = endpoints(&e, host);
    let (hinge, _) = endpoints(&e, arm);
    e.set_anchor(pivot, true).unwrap();
    let t = e.scene().node_attachment(hinge).unwrap().t;

    run_guided(&mut e, &clock, integrator, end, DVec2::new(0.0, 3.0), hinge, |e| {
        let scene = e.scene();
        let on_host = scene
            .position(pivot)
            .unwrap()
            .lerp(scene.position(end).unwrap(), t);
        scene.position(hinge).unwrap().distance(on_host)
    });
    assert!(e.scene().node_attachment(hinge).is_some());
}

#[test]
fn rattle_keeps_hinge_on_its_host() {
    hinged_pendulum(IntegratorMode::RattleSymplectic);
}

#[test]
fn legacy_keeps_hinge_on_its_host() {
    hinged_pendulum(IntegratorMode::Legacy);
}
