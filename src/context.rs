use crate::camera::Camera;
use crate::config::{ContextConfig, SizingMode};
use crate::error::{EngineError, Result};
use serde::Serialize;

/// Surface size in CSS pixels plus the visible world extents.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub w_width: f32,
    pub w_height: f32,
    pub ratio: f32,
    pub pixel_ratio: f32,
}

impl Viewport {
    /// Backing-store size in device pixels.
    pub fn drawing_buffer_size(&self) -> (u32, u32) {
        (
            (self.width * self.pixel_ratio).floor() as u32,
            (self.height * self.pixel_ratio).floor() as u32,
        )
    }
}

/// Camera and viewport state derived from the surface size.
#[derive(Debug, Clone)]
pub struct RenderContext {
    sizing: SizingMode,
    camera: Camera,
    viewport: Viewport,
    min_pixel_ratio: Option<f32>,
    max_pixel_ratio: Option<f32>,
}

impl RenderContext {
    pub fn new(cfg: &ContextConfig) -> Self {
        Self {
            sizing: cfg.size,
            camera: Camera::new(&cfg.camera),
            viewport: Viewport::default(),
            min_pixel_ratio: cfg.min_pixel_ratio,
            max_pixel_ratio: cfg.max_pixel_ratio,
        }
    }

    pub fn sizing(&self) -> SizingMode { self.sizing }

    pub fn camera(&self) -> &Camera { &self.camera }

    pub fn viewport(&self) -> &Viewport { &self.viewport }

    pub fn clamp_pixel_ratio(&self, device: f32) -> f32 {
        match (self.min_pixel_ratio, self.max_pixel_ratio) {
            (_, Some(max)) if device > max => max,
            (Some(min), _) if device < min => min,
            _ => device,
        }
    }

    /// Recompute the viewport for a `width` x `height` surface.
    ///
    /// A zero or non-finite size leaves the previous viewport untouched and
    /// reports [`EngineError::DegenerateSize`].
    pub fn resize(&mut self, width: f32, height: f32, device_pixel_ratio: f32) -> Result<Viewport> {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(EngineError::DegenerateSize { width, height });
        }
        let ratio = width / height;
        self.camera.set_aspect(ratio);
        let (w_width, w_height) = self.camera.world_size();
        self.viewport = Viewport {
            width,
            height,
            w_width,
            w_height,
            ratio,
            pixel_ratio: self.clamp_pixel_ratio(device_pixel_ratio),
        };
        log::debug!(
            "resized to {}x{} (world {:.2}x{:.2}, dpr {})",
            width,
            height,
            w_width,
            w_height,
            self.viewport.pixel_ratio
        );
        Ok(self.viewport)
    }
}

/// Seconds-based frame clock fed with host timestamps in milliseconds.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_ms: Option<f64>,
    elapsed: f64,
    delta: f64,
}

impl FrameClock {
    pub fn new() -> Self { Self::default() }

    /// Restart delta tracking at `now_ms`; elapsed time is kept.
    pub fn start(&mut self, now_ms: f64) {
        self.last_ms = Some(now_ms);
    }

    pub fn stop(&mut self) {
        self.last_ms = None;
    }

    pub fn is_running(&self) -> bool { self.last_ms.is_some() }

    /// Advance to `now_ms`, returning the delta in seconds. A stopped clock
    /// starts at `now_ms` and reports zero.
    pub fn tick(&mut self, now_ms: f64) -> f64 {
        let last = self.last_ms.replace(now_ms).unwrap_or(now_ms);
        self.delta = ((now_ms - last) / 1000.0).max(0.0);
        self.elapsed += self.delta;
        self.delta
    }

    pub fn delta(&self) -> f64 { self.delta }

    pub fn elapsed(&self) -> f64 { self.elapsed }
}
