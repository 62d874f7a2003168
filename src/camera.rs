use crate::config::CameraConfig;
use nalgebra::{Isometry3, Matrix4, Perspective3, Point3, Vector2, Vector3};

/// Perspective camera on the +Z axis looking at the origin.
#[derive(Debug, Clone)]
pub struct Camera {
    base_fov: f32,
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
    position: Point3<f32>,
    target: Point3<f32>,
    min_aspect: Option<f32>,
    max_aspect: Option<f32>,
}

impl Camera {
    pub fn new(cfg: &CameraConfig) -> Self {
        Self {
            base_fov: cfg.fov,
            fov: cfg.fov,
            aspect: 1.0,
            near: cfg.near,
            far: cfg.far,
            position: Point3::new(0.0, 0.0, cfg.distance),
            target: Point3::origin(),
            min_aspect: cfg.min_aspect,
            max_aspect: cfg.max_aspect,
        }
    }

    /// Vertical field of view in degrees, after aspect clamping.
    pub fn fov(&self) -> f32 { self.fov }

    pub fn aspect(&self) -> f32 { self.aspect }

    pub fn position(&self) -> Point3<f32> { self.position }

    /// Update the aspect ratio. Outside `[min_aspect, max_aspect]` the FOV is
    /// re-derived so the image keeps the extent it would have at the bound.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.fov = match (self.min_aspect, self.max_aspect) {
            (Some(min), _) if aspect < min => self.fov_for_bound(min),
            (_, Some(max)) if aspect > max => self.fov_for_bound(max),
            _ => self.base_fov,
        };
    }

    fn fov_for_bound(&self, bound: f32) -> f32 {
        let tan_fov = (self.base_fov.to_radians() / 2.0).tan();
        let new_tan = tan_fov / (self.aspect / bound);
        2.0 * new_tan.atan().to_degrees()
    }

    /// Visible `(width, height)` in world units at the origin's depth.
    pub fn world_size(&self) -> (f32, f32) {
        let h = 2.0 * (self.fov.to_radians() / 2.0).tan() * self.position.coords.norm();
        (h * self.aspect, h)
    }

    fn isometry(&self) -> Isometry3<f32> {
        Isometry3::look_at_rh(&self.position, &self.target, &Vector3::y())
    }

    fn perspective(&self) -> Perspective3<f32> {
        Perspective3::new(self.aspect, self.fov.to_radians(), self.near, self.far)
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.isometry().to_homogeneous()
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        self.perspective().to_homogeneous()
    }

    pub fn direction(&self) -> Vector3<f32> {
        (self.target - self.position).normalize()
    }

    /// Cast a ray through `ndc` and intersect it with the plane through the
    /// origin facing the camera. `None` when the ray misses.
    pub fn unproject_to_plane(&self, ndc: Vector2<f32>) -> Option<Vector3<f32>> {
        let in_view = self.perspective().unproject_point(&Point3::new(ndc.x, ndc.y, 0.5));
        let world = self.isometry().inverse_transform_point(&in_view);
        let dir = (world - self.position).normalize();
        let normal = self.direction();
        let denom = normal.dot(&dir);
        if denom.abs() < f32::EPSILON {
            return None;
        }
        let t = -normal.dot(&self.position.coords) / denom;
        if t < 0.0 {
            return None;
        }
        Some(self.position.coords + dir * t)
    }
}
