//! Interactive ball-pit background: instanced spheres bouncing inside a box
//! that fits the visible world, with one sphere optionally steered by the
//! pointer.
//!
//! The simulation, colouring, camera and lifecycle are plain Rust and run
//! anywhere; the WebGL2 backend and the JS bindings are only built for
//! `wasm32`.

pub mod buffers;
pub mod camera;
pub mod color;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod lifecycle;
pub mod physics;
pub mod pointer;
pub mod render;

#[cfg(target_arch = "wasm32")]
pub mod wasm;
#[cfg(target_arch = "wasm32")]
pub mod webgl;

pub use buffers::ParticleBuffers;
pub use camera::Camera;
pub use color::{Color, ColorRamp};
pub use config::{
    BallpitConfig, CameraConfig, ContextConfig, MaterialParams, RendererOptions, SimConfig,
    SizingMode, ThemeConfig,
};
pub use context::{FrameClock, RenderContext, Viewport};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use geometry::Mesh;
pub use lifecycle::{Lifecycle, LoopState, Transition};
pub use physics::Physics;
pub use pointer::{
    GlobalListeners, ManualListeners, PointerHandler, PointerRegistry, PointerSample, Rect,
    Surface, SurfaceId,
};
pub use render::{AmbientLight, Backend, FrameUniforms, InstancedSpheres, PointLight};
