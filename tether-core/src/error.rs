//! Renderer error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("arena exhausted: requested {requested} records, {remaining} remaining")]
    AllocationExhausted { requested: usize, remaining: usize },

    #[error("glyph bitmap {width}x{height} exceeds atlas maximum of {max}px")]
    OversizedGlyph { width: u32, height: u32, max: u32 },

    #[error("atlas full: no evictable space for a {width}x{height} glyph")]
    AtlasFull { width: u32, height: u32 },

    #[error("device supports {available}px textures, atlas needs at least {required}px")]
    DeviceCapabilityUnsupported { required: u32, available: u32 },

    #[error("font error: {0}")]
    Font(String),

    #[error("presentation failed: {0}")]
    Presentation(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
