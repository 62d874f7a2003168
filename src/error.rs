//! Error types for engine construction and resizing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("missing canvas or id parameter")]
    MissingSurface,
    #[error("element '{0}' is missing or is not a canvas")]
    NotACanvas(String),
    #[error("WebGL2 context is unavailable")]
    ContextUnavailable,
    #[error("shader error: {0}")]
    Shader(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("degenerate surface size {width}x{height}")]
    DegenerateSize { width: f32, height: f32 },
    #[error("host call failed: {0}")]
    Js(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
