use ballpit::{
    Backend, BallpitConfig, Engine, EngineError, FrameUniforms, LoopState, Mesh, Transition,
    Viewport,
};
use nalgebra::Vector2;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Default)]
struct Calls {
    prepared: Vec<usize>,
    matrix_uploads: usize,
    color_uploads: usize,
    resizes: Vec<Viewport>,
    draws: Vec<usize>,
    disposed: usize,
}

#[derive(Clone, Default)]
struct RecordingBackend(Rc<RefCell<Calls>>);

impl Backend for RecordingBackend {
    fn prepare(&mut self, _mesh: &Mesh, capacity: usize) {
        self.0.borrow_mut().prepared.push(capacity);
    }
    fn upload_matrices(&mut self, _matrices: &[f32]) {
        self.0.borrow_mut().matrix_uploads += 1;
    }
    fn upload_colors(&mut self, _colors: &[f32]) {
        self.0.borrow_mut().color_uploads += 1;
    }
    fn resize(&mut self, viewport: &Viewport) {
        self.0.borrow_mut().resizes.push(*viewport);
    }
    fn draw(&mut self, frame: &FrameUniforms) {
        self.0.borrow_mut().draws.push(frame.instance_count);
    }
    fn dispose(&mut self) {
        self.0.borrow_mut().disposed += 1;
    }
}

fn engine(count: usize) -> (Engine<RecordingBackend>, Rc<RefCell<Calls>>) {
    let backend = RecordingBackend::default();
    let calls = backend.0.clone();
    let mut config = BallpitConfig::default();
    config.theme.sim.count = count;
    config.theme.sim.seed = Some(7);
    (Engine::new(backend, config), calls)
}

#[test]
fn frames_only_while_visible() {
    let (mut e, calls) = engine(20);
    assert_eq!(e.loop_state(), LoopState::Stopped);
    assert!(!e.frame(0.0));

    assert_eq!(e.set_intersecting(true, 0.0), Transition::Start);
    assert!(e.frame(16.0));
    assert!(e.frame(32.0));
    assert_eq!(e.frames(), 2);

    assert_eq!(e.set_intersecting(false, 40.0), Transition::Stop);
    assert!(!e.frame(48.0));
    assert!(!e.frame(64.0));
    assert_eq!(e.frames(), 2);
    assert_eq!(calls.borrow().draws.len(), 2);

    assert_eq!(e.set_intersecting(true, 1000.0), Transition::Start);
    assert!(e.frame(1016.0));
    assert_eq!(e.frames(), 3);
    // The clock restarts on resume instead of reporting the hidden gap.
    assert!((e.clock().delta() - 0.016).abs() < 1e-9);
}

#[test]
fn hidden_tab_suspends_the_loop() {
    let (mut e, _) = engine(5);
    e.set_intersecting(true, 0.0);
    assert_eq!(e.set_tab_visible(false, 10.0), Transition::Stop);
    assert_eq!(e.loop_state(), LoopState::Suspended);
    assert!(!e.frame(20.0));
    assert_eq!(e.set_tab_visible(true, 30.0), Transition::Start);
    assert!(e.frame(40.0));
}

#[test]
fn dispose_releases_backend_once() {
    let (mut e, calls) = engine(10);
    e.set_intersecting(true, 0.0);
    e.frame(16.0);
    e.dispose();
    assert!(e.is_disposed());
    assert_eq!(e.loop_state(), LoopState::Stopped);
    assert!(!e.frame(32.0));
    e.tick(0.016);
    e.dispose();
    assert_eq!(e.set_intersecting(true, 48.0), Transition::Unchanged);

    let calls = calls.borrow();
    assert_eq!(calls.disposed, 1);
    assert_eq!(calls.draws.len(), 1);
    assert_eq!(e.frames(), 1);
}

#[test]
fn resize_fits_world_box_and_notifies() {
    let (mut e, calls) = engine(10);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    e.set_on_resize(move |v| sink.borrow_mut().push(*v));

    let v = e.resize(800.0, 600.0, 2.0).unwrap();
    assert_eq!(v.width, 800.0);
    assert!((v.ratio - 800.0 / 600.0).abs() < 1e-6);
    let sim = e.physics().config();
    assert!((sim.max_x - v.w_width / 2.0).abs() < 1e-6);
    assert!((sim.max_y - v.w_height / 2.0).abs() < 1e-6);
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(calls.borrow().resizes.len(), 1);

    let err = e.resize(0.0, 600.0, 1.0).unwrap_err();
    assert!(matches!(err, EngineError::DegenerateSize { .. }));
    assert_eq!(*e.viewport(), v);
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn set_count_rebuilds_instances() {
    let (mut e, calls) = engine(10);
    e.set_count(3);
    assert_eq!(e.physics().len(), 3);
    assert_eq!(e.spheres().count(), 3);
    assert_eq!(e.spheres().matrices().len(), 3 * 16);
    assert_eq!(calls.borrow().prepared, vec![10, 3]);

    e.tick(0.016);
    assert_eq!(calls.borrow().draws, vec![3]);
}

#[test]
fn pause_freezes_physics_but_keeps_drawing() {
    let (mut e, calls) = engine(10);
    e.tick(0.016);
    assert!(e.toggle_pause());
    let before = e.physics().buffers().positions().to_vec();
    e.tick(0.016);
    e.tick(0.016);
    assert_eq!(e.physics().buffers().positions(), &before[..]);
    assert_eq!(calls.borrow().draws.len(), 3);
    assert!(!e.toggle_pause());
    e.tick(0.016);
    assert_ne!(e.physics().buffers().positions(), &before[..]);
}

#[test]
fn uploads_are_batched_per_frame() {
    let (mut e, calls) = engine(50);
    let initial = calls.borrow().matrix_uploads;
    e.tick(0.016);
    e.tick(0.016);
    let calls = calls.borrow();
    assert_eq!(calls.matrix_uploads, initial + 2);
    // Colours are uploaded once and then only on change.
    assert_eq!(calls.color_uploads, 1);
}

#[test]
fn set_colors_needs_two_stops() {
    let (mut e, calls) = engine(4);
    e.tick(0.016);
    assert!(!e.set_colors(&[0xff0000]));
    assert!(e.set_colors(&[0xff0000, 0x0000ff]));
    e.tick(0.016);
    assert_eq!(calls.borrow().color_uploads, 2);
    let last = e.spheres().instance_color(3);
    assert!(last.b > 0.99 && last.r < 0.01);
}

#[test]
fn pointer_steers_slot_zero() {
    let (mut e, _) = engine(10);
    e.resize(1000.0, 1000.0, 1.0).unwrap();
    e.pointer_moved(Vector2::new(0.5, 0.0));
    assert!(e.physics().is_controlled());
    let target = e.physics().target();
    assert!(target.x > 0.0);
    assert!(target.z.abs() < 1e-4);

    for _ in 0..200 {
        e.tick(0.016);
    }
    let p0 = e.physics().buffers().position(0);
    assert!((p0 - target).norm() < 1e-3);

    e.pointer_left();
    assert!(!e.physics().is_controlled());
}

#[test]
fn hidden_at_mount_waits_for_the_tab() {
    let (mut e, calls) = engine(8);
    assert_eq!(e.set_tab_visible(false, 0.0), Transition::Unchanged);
    assert_eq!(e.set_intersecting(true, 5.0), Transition::Unchanged);
    assert!(!e.is_running());
    assert!(!e.frame(16.0));
    assert!(calls.borrow().draws.is_empty());

    assert_eq!(e.set_tab_visible(true, 100.0), Transition::Start);
    assert!(e.frame(116.0));
    assert_eq!(e.frames(), 1);
}

#[test]
fn dispose_before_any_frame_releases_backend() {
    let (mut e, calls) = engine(8);
    e.resize(300.0, 150.0, 1.0).unwrap();
    e.dispose();
    let calls = calls.borrow();
    assert_eq!(calls.disposed, 1);
    assert!(calls.draws.is_empty());
    assert_eq!(e.loop_state(), LoopState::Stopped);
    assert!(e.backend().is_none());
}
