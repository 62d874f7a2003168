use crate::config::{BallpitConfig, ThemeConfig};
use crate::context::{FrameClock, RenderContext, Viewport};
use crate::error::Result;
use crate::geometry::{self, Mesh, SPHERE_HEIGHT_SEGMENTS, SPHERE_WIDTH_SEGMENTS};
use crate::lifecycle::{Lifecycle, LoopState, Transition};
use crate::physics::Physics;
use crate::render::{Backend, FrameUniforms, InstancedSpheres};
use nalgebra::Vector2;

type ResizeCallback = Box<dyn FnMut(&Viewport)>;

/// One ball-pit instance bound to a rendering backend.
///
/// Per frame: pointer state (already applied by the event handlers) →
/// physics → instance transforms → one upload → one draw.
pub struct Engine<B: Backend> {
    theme: ThemeConfig,
    context: RenderContext,
    lifecycle: Lifecycle,
    clock: FrameClock,
    physics: Physics,
    spheres: InstancedSpheres,
    mesh: Mesh,
    backend: Option<B>,
    paused: bool,
    frames: u64,
    on_resize: Option<ResizeCallback>,
}

impl<B: Backend> Engine<B> {
    pub fn new(mut backend: B, config: BallpitConfig) -> Self {
        let BallpitConfig { theme, context } = config;
        let physics = Physics::new(theme.sim.clone());
        let mut spheres = InstancedSpheres::new(&theme);
        spheres.update(&physics);
        let mesh = geometry::sphere(SPHERE_WIDTH_SEGMENTS, SPHERE_HEIGHT_SEGMENTS);
        backend.prepare(&mesh, spheres.count());
        log::info!("ball pit ready with {} spheres", spheres.count());
        Self {
            theme,
            context: RenderContext::new(&context),
            lifecycle: Lifecycle::new(),
            clock: FrameClock::new(),
            physics,
            spheres,
            mesh,
            backend: Some(backend),
            paused: false,
            frames: 0,
            on_resize: None,
        }
    }

    pub fn physics(&self) -> &Physics { &self.physics }

    pub fn spheres(&self) -> &InstancedSpheres { &self.spheres }

    pub fn context(&self) -> &RenderContext { &self.context }

    pub fn viewport(&self) -> &Viewport { self.context.viewport() }

    pub fn loop_state(&self) -> LoopState { self.lifecycle.state() }

    pub fn is_running(&self) -> bool { self.lifecycle.is_running() }

    pub fn clock(&self) -> &FrameClock { &self.clock }

    /// Number of frames drawn so far.
    pub fn frames(&self) -> u64 { self.frames }

    pub fn backend(&self) -> Option<&B> { self.backend.as_ref() }

    pub fn is_disposed(&self) -> bool { self.backend.is_none() }

    pub fn is_paused(&self) -> bool { self.paused }

    /// Called after every successful resize with the new viewport.
    pub fn set_on_resize(&mut self, callback: impl FnMut(&Viewport) + 'static) {
        self.on_resize = Some(Box::new(callback));
    }

    /// Resize to a `width` x `height` surface and fit the physics box to the
    /// visible world. On a degenerate size nothing changes.
    pub fn resize(&mut self, width: f32, height: f32, device_pixel_ratio: f32) -> Result<Viewport> {
        let viewport = self.context.resize(width, height, device_pixel_ratio)?;
        if let Some(backend) = self.backend.as_mut() {
            backend.resize(&viewport);
        }
        self.physics.set_world_bounds(viewport.w_width / 2.0, viewport.w_height / 2.0);
        if let Some(callback) = self.on_resize.as_mut() {
            callback(&viewport);
        }
        Ok(viewport)
    }

    pub fn set_intersecting(&mut self, intersecting: bool, now_ms: f64) -> Transition {
        let t = self.lifecycle.set_intersecting(intersecting);
        self.apply(t, now_ms);
        t
    }

    pub fn set_tab_visible(&mut self, visible: bool, now_ms: f64) -> Transition {
        let t = self.lifecycle.set_tab_visible(visible);
        self.apply(t, now_ms);
        t
    }

    fn apply(&mut self, transition: Transition, now_ms: f64) {
        match transition {
            Transition::Start => {
                log::debug!("frame loop started");
                self.clock.start(now_ms);
            }
            Transition::Stop => {
                log::debug!("frame loop suspended");
                self.clock.stop();
            }
            Transition::Unchanged => {}
        }
    }

    /// Frame callback. Returns whether a frame was produced; the host should
    /// only reschedule while this is true.
    pub fn frame(&mut self, now_ms: f64) -> bool {
        if !self.lifecycle.is_running() || self.backend.is_none() {
            return false;
        }
        let dt = self.clock.tick(now_ms) as f32;
        self.tick(dt);
        true
    }

    /// Advance and draw one frame with an explicit `dt`, regardless of
    /// visibility. No-op after dispose.
    pub fn tick(&mut self, dt: f32) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        if !self.paused {
            self.physics.update(dt);
            self.spheres.update(&self.physics);
        }
        self.spheres.flush(backend);
        backend.draw(&frame_uniforms(&self.context, &self.spheres));
        self.frames += 1;
    }

    /// Slot 0 starts following the world point under `ndc`.
    pub fn pointer_moved(&mut self, ndc: Vector2<f32>) {
        if let Some(target) = self.context.camera().unproject_to_plane(ndc) {
            self.physics.set_target(target);
            self.physics.set_controlled(true);
        }
    }

    pub fn pointer_left(&mut self) {
        self.physics.set_controlled(false);
    }

    /// Rebuild particles and instance storage for `count` spheres.
    pub fn set_count(&mut self, count: usize) {
        self.physics = self.physics.with_count(count);
        self.theme.sim = self.physics.config().clone();
        self.spheres = InstancedSpheres::new(&self.theme);
        self.spheres.update(&self.physics);
        if let Some(backend) = self.backend.as_mut() {
            backend.prepare(&self.mesh, count);
        }
        log::info!("ball pit rebuilt with {} spheres", count);
    }

    /// Returns false when the ramp has fewer than two colours.
    pub fn set_colors(&mut self, colors: &[u32]) -> bool {
        let applied = self.spheres.set_colors(colors);
        if applied {
            self.theme.colors = colors.to_vec();
        }
        applied
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Stop the loop and free the backend. Later calls only warn.
    pub fn dispose(&mut self) {
        let Some(mut backend) = self.backend.take() else {
            log::warn!("ball pit disposed twice");
            return;
        };
        self.lifecycle.dispose();
        self.clock.stop();
        self.on_resize = None;
        backend.dispose();
        log::info!("ball pit disposed after {} frames", self.frames);
    }
}

fn frame_uniforms(context: &RenderContext, spheres: &InstancedSpheres) -> FrameUniforms {
    let camera = context.camera();
    FrameUniforms {
        view: camera.view_matrix(),
        projection: camera.projection_matrix(),
        camera_position: camera.position().coords,
        light: *spheres.light(),
        ambient: *spheres.ambient(),
        material: spheres.material().clone(),
        instance_count: spheres.count(),
    }
}
