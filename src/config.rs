use serde::{Deserialize, Serialize};

pub const DEFAULT_COUNT: usize = 200;
pub const DEFAULT_GRAVITY: f32 = 0.5;
pub const DEFAULT_FRICTION: f32 = 0.9975;
pub const DEFAULT_WALL_BOUNCE: f32 = 0.95;
pub const DEFAULT_MAX_VELOCITY: f32 = 0.15;

pub const DEFAULT_CAMERA_FOV: f32 = 50.0;
pub const DEFAULT_CAMERA_DISTANCE: f32 = 20.0;
pub const DEFAULT_CAMERA_MAX_ASPECT: f32 = 1.5;

/// Physics parameters for one ball-pit session.
///
/// Values are trusted as given: negative extents or friction are not
/// rejected and simply make the simulation misbehave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimConfig {
    pub count: usize,
    pub max_x: f32,
    pub max_y: f32,
    pub max_z: f32,
    pub max_size: f32,
    pub min_size: f32,
    /// Radius of slot 0 (the attractor).
    pub size0: f32,
    pub gravity: f32,
    pub friction: f32,
    pub wall_bounce: f32,
    pub max_velocity: f32,
    /// Start with slot 0 following the pointer target.
    pub control_sphere0: bool,
    /// Draw slot 0. When false it still collides but is rendered at zero scale.
    pub follow_cursor: bool,
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            max_x: 5.0,
            max_y: 5.0,
            max_z: 2.0,
            max_size: 1.0,
            min_size: 0.5,
            size0: 1.0,
            gravity: DEFAULT_GRAVITY,
            friction: DEFAULT_FRICTION,
            wall_bounce: DEFAULT_WALL_BOUNCE,
            max_velocity: DEFAULT_MAX_VELOCITY,
            control_sphere0: false,
            follow_cursor: true,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaterialParams {
    pub metalness: f32,
    pub roughness: f32,
    pub clearcoat: f32,
    pub clearcoat_roughness: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            metalness: 0.5,
            roughness: 0.5,
            clearcoat: 1.0,
            clearcoat_roughness: 0.15,
        }
    }
}

/// Appearance of the spheres plus the physics they run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThemeConfig {
    #[serde(flatten)]
    pub sim: SimConfig,
    /// Colour ramp as 0xRRGGBB values.
    pub colors: Vec<u32>,
    pub ambient_color: u32,
    pub ambient_intensity: f32,
    pub light_intensity: f32,
    pub material_params: MaterialParams,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            sim: SimConfig::default(),
            colors: vec![0x000000, 0x000000, 0x000000],
            ambient_color: 0xffffff,
            ambient_intensity: 1.0,
            light_intensity: 200.0,
            material_params: MaterialParams::default(),
        }
    }
}

/// How the drawing surface picks its CSS pixel size.
///
/// From JS this is `"parent"`, `"window"` or a bare `{ width, height }`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "SizingRepr", into = "SizingRepr")]
pub enum SizingMode {
    /// Track the parent element's box.
    #[default]
    Parent,
    /// Track the window's inner size.
    Window,
    Fixed { width: f32, height: f32 },
}

#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum NamedSizing {
    Parent,
    Window,
}

#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum SizingRepr {
    Named(NamedSizing),
    Fixed { width: f32, height: f32 },
}

impl From<SizingRepr> for SizingMode {
    fn from(repr: SizingRepr) -> Self {
        match repr {
            SizingRepr::Named(NamedSizing::Parent) => SizingMode::Parent,
            SizingRepr::Named(NamedSizing::Window) => SizingMode::Window,
            SizingRepr::Fixed { width, height } => SizingMode::Fixed { width, height },
        }
    }
}

impl From<SizingMode> for SizingRepr {
    fn from(mode: SizingMode) -> Self {
        match mode {
            SizingMode::Parent => SizingRepr::Named(NamedSizing::Parent),
            SizingMode::Window => SizingRepr::Named(NamedSizing::Window),
            SizingMode::Fixed { width, height } => SizingRepr::Fixed { width, height },
        }
    }
}

impl SizingMode {
    /// Picks the size for this mode from what the host measured.
    ///
    /// `Parent` falls back to the window size when the surface has no parent.
    pub fn resolve(&self, parent: Option<(f32, f32)>, window: (f32, f32)) -> (f32, f32) {
        match *self {
            SizingMode::Fixed { width, height } => (width, height),
            SizingMode::Parent => parent.unwrap_or(window),
            SizingMode::Window => window,
        }
    }

    /// Whether window/parent resize events should trigger a resize.
    pub fn is_tracking(&self) -> bool {
        !matches!(self, SizingMode::Fixed { .. })
    }
}

/// Options forwarded to graphics context creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RendererOptions {
    pub antialias: bool,
    pub alpha: bool,
    pub power_preference: String,
    pub premultiplied_alpha: bool,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            antialias: true,
            alpha: true,
            power_preference: "high-performance".to_string(),
            premultiplied_alpha: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Distance from the origin along +Z.
    pub distance: f32,
    pub min_aspect: Option<f32>,
    pub max_aspect: Option<f32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: DEFAULT_CAMERA_FOV,
            near: 0.1,
            far: 2000.0,
            distance: DEFAULT_CAMERA_DISTANCE,
            min_aspect: None,
            max_aspect: Some(DEFAULT_CAMERA_MAX_ASPECT),
        }
    }
}

/// Everything the render context needs besides the surface itself.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextConfig {
    /// Id of a canvas element, used when no canvas is handed over directly.
    pub id: Option<String>,
    pub size: SizingMode,
    pub renderer_options: RendererOptions,
    pub camera: CameraConfig,
    pub min_pixel_ratio: Option<f32>,
    pub max_pixel_ratio: Option<f32>,
}

/// Top-level object accepted by the embedder.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BallpitConfig {
    #[serde(flatten)]
    pub theme: ThemeConfig,
    pub context: ContextConfig,
}
