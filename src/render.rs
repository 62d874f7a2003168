//! Instanced sphere renderer.
//!
//! [`InstancedSpheres`] projects the physics buffers into one transform and
//! one colour per slot. The arrays are handed to a [`Backend`] that owns the
//! GPU side; uploads happen at most once per frame no matter how many slots
//! there are.

use crate::color::{Color, ColorRamp};
use crate::config::{MaterialParams, ThemeConfig};
use crate::context::Viewport;
use crate::geometry::Mesh;
use crate::physics::Physics;
use nalgebra::{Matrix4, Vector3};

pub const MATRIX_STRIDE: usize = 16;
pub const COLOR_STRIDE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vector3<f32>,
    pub color: Color,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

/// Per-frame values the backend needs besides the instance arrays.
#[derive(Debug, Clone)]
pub struct FrameUniforms {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub camera_position: Vector3<f32>,
    pub light: PointLight,
    pub ambient: AmbientLight,
    pub material: MaterialParams,
    pub instance_count: usize,
}

/// GPU seam. Implemented by the WebGL2 backend in the browser and by
/// recording fakes in tests.
pub trait Backend {
    /// Build the shared mesh and allocate storage for `capacity` instances.
    fn prepare(&mut self, mesh: &Mesh, capacity: usize);
    fn upload_matrices(&mut self, matrices: &[f32]);
    fn upload_colors(&mut self, colors: &[f32]);
    fn resize(&mut self, viewport: &Viewport);
    fn draw(&mut self, frame: &FrameUniforms);
    /// Free every GPU resource. Called exactly once.
    fn dispose(&mut self);
}

/// CPU mirror of the instanced mesh: transforms, colours and lights.
#[derive(Debug, Clone)]
pub struct InstancedSpheres {
    count: usize,
    matrices: Vec<f32>,
    colors: Vec<f32>,
    light: PointLight,
    ambient: AmbientLight,
    material: MaterialParams,
    follow_cursor: bool,
    matrices_dirty: bool,
    colors_dirty: bool,
}

impl InstancedSpheres {
    pub fn new(theme: &ThemeConfig) -> Self {
        let count = theme.sim.count;
        let start = theme.colors.first().copied().map(Color::from_hex).unwrap_or(Color::BLACK);
        let mut spheres = Self {
            count,
            matrices: vec![0.0; MATRIX_STRIDE * count],
            colors: vec![1.0; COLOR_STRIDE * count],
            light: PointLight {
                position: Vector3::zeros(),
                color: start,
                intensity: theme.light_intensity,
            },
            ambient: AmbientLight {
                color: Color::from_hex(theme.ambient_color),
                intensity: theme.ambient_intensity,
            },
            material: theme.material_params.clone(),
            follow_cursor: theme.sim.follow_cursor,
            matrices_dirty: true,
            colors_dirty: true,
        };
        spheres.set_colors(&theme.colors);
        spheres
    }

    pub fn count(&self) -> usize { self.count }

    pub fn matrices(&self) -> &[f32] { &self.matrices }

    pub fn colors(&self) -> &[f32] { &self.colors }

    pub fn light(&self) -> &PointLight { &self.light }

    pub fn ambient(&self) -> &AmbientLight { &self.ambient }

    pub fn material(&self) -> &MaterialParams { &self.material }

    pub fn instance_color(&self, slot: usize) -> Color {
        let o = COLOR_STRIDE * slot;
        Color::new(self.colors[o], self.colors[o + 1], self.colors[o + 2])
    }

    /// Spread `hex` across the slots. Ramps with fewer than two colours are
    /// ignored and leave the current colours in place.
    pub fn set_colors(&mut self, hex: &[u32]) -> bool {
        let Some(ramp) = ColorRamp::from_hex(hex) else {
            return false;
        };
        for slot in 0..self.count {
            let c = ramp.color_for_slot(slot, self.count);
            let o = COLOR_STRIDE * slot;
            self.colors[o..o + COLOR_STRIDE].copy_from_slice(&c.to_array());
        }
        self.light.color = ramp.start();
        self.colors_dirty = true;
        true
    }

    /// Write one transform per slot from the current physics state and move
    /// the light onto slot 0.
    pub fn update(&mut self, physics: &Physics) {
        let buffers = physics.buffers();
        let n = self.count.min(buffers.len());
        for slot in 0..n {
            let p = buffers.position(slot);
            let scale = if slot == 0 && !self.follow_cursor { 0.0 } else { buffers.size(slot) };
            let m = Matrix4::new_translation(&p) * Matrix4::new_scaling(scale);
            let o = MATRIX_STRIDE * slot;
            self.matrices[o..o + MATRIX_STRIDE].copy_from_slice(m.as_slice());
            if slot == 0 {
                self.light.position = p;
            }
        }
        self.matrices_dirty = true;
    }

    /// Push pending instance data to the backend.
    pub fn flush<B: Backend + ?Sized>(&mut self, backend: &mut B) {
        if self.matrices_dirty {
            backend.upload_matrices(&self.matrices);
            self.matrices_dirty = false;
        }
        if self.colors_dirty {
            backend.upload_colors(&self.colors);
            self.colors_dirty = false;
        }
    }
}
