//! Renderer configuration.
//!
//! Every field has a default, so hosts can deserialize a partial JSON
//! document and only override what they care about.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::primitives::Color;

/// Default font size for editor text.
pub const DEFAULT_FONT_SIZE: f32 = 14.0;

/// Maximum atlas size (8K is safe for most GPUs).
pub const MAX_ATLAS_SIZE: u32 = 8192;

/// Configuration for a renderer instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Font size in physical pixels.
    pub font_size: f32,

    /// Display columns a tab occupies.
    pub tab_width: usize,

    /// Inset of the text area from the surface edges, in pixels.
    pub padding: f32,

    /// Cursor bar width in pixels.
    pub cursor_width: f32,

    /// MSAA sample count of the multisample texture handed to `draw`.
    pub sample_count: u32,

    pub background_color: Color,
    pub text_color: Color,
    pub cursor_color: Color,

    /// Rasterize printable ASCII on the first frame.
    pub prewarm_ascii: bool,

    pub arena: ArenaConfig,
    pub atlas: AtlasConfig,
    pub scroll: ScrollConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            tab_width: 4,
            padding: 8.0,
            cursor_width: 2.0,
            sample_count: 4,
            background_color: Color::rgb8(0x1e, 0x1e, 0x24),
            text_color: Color::rgb8(0xd8, 0xd8, 0xd8),
            cursor_color: Color::rgb8(0x7a, 0xa2, 0xf7),
            prewarm_ascii: true,
            arena: ArenaConfig::default(),
            atlas: AtlasConfig::default(),
            scroll: ScrollConfig::default(),
        }
    }
}

/// Per-frame draw instance arena sizing (in records).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub initial_capacity: usize,
    /// Growth ceiling; frames needing more instances are truncated.
    pub max_capacity: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 4096,
            max_capacity: 1 << 20,
        }
    }
}

/// Glyph atlas texture sizing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Starting edge length. The device must support at least this size.
    pub initial_size: u32,
    /// Largest edge length the atlas may grow to before evicting.
    pub max_size: u32,
    /// Gap between packed glyphs, in texels.
    pub padding: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            initial_size: 1024,
            max_size: MAX_ATLAS_SIZE,
            padding: 1,
        }
    }
}

/// Scroll behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Pixels per line for line-based (mouse wheel) deltas.
    pub line_height_px: f32,
    /// Fraction of a delta applied once the offset is past either bound.
    pub overscroll_resistance: f32,
    /// Furthest the offset may travel past either bound mid-gesture.
    pub max_overscroll: f32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            line_height_px: 40.0,
            overscroll_resistance: 0.5,
            max_overscroll: 120.0,
        }
    }
}

impl RendererConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the renderer cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "font_size must be positive, got {}",
                self.font_size
            )));
        }
        if self.tab_width == 0 {
            return Err(ConfigError::Invalid("tab_width must be at least 1".into()));
        }
        if self.sample_count == 0 || !self.sample_count.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "sample_count must be a power of two, got {}",
                self.sample_count
            )));
        }
        if self.arena.initial_capacity == 0 || self.arena.initial_capacity > self.arena.max_capacity {
            return Err(ConfigError::Invalid(format!(
                "arena capacity range {}..={} is empty",
                self.arena.initial_capacity, self.arena.max_capacity
            )));
        }
        if self.atlas.initial_size == 0 || self.atlas.initial_size > self.atlas.max_size {
            return Err(ConfigError::Invalid(format!(
                "atlas size range {}..={} is empty",
                self.atlas.initial_size, self.atlas.max_size
            )));
        }
        if !(0.0..=1.0).contains(&self.scroll.overscroll_resistance) {
            return Err(ConfigError::Invalid(
                "scroll.overscroll_resistance must be within 0..=1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(RendererConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = RendererConfig::from_json_str(
            r#"{ "font_size": 18.0, "atlas": { "max_size": 4096 } }"#,
        )
        .unwrap();
        assert_eq!(config.font_size, 18.0);
        assert_eq!(config.atlas.max_size, 4096);
        assert_eq!(config.atlas.initial_size, 1024);
        assert_eq!(config.tab_width, 4);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            RendererConfig::from_json_str(r#"{ "font_size": 0.0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RendererConfig::from_json_str(r#"{ "sample_count": 3 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RendererConfig::from_json_str(r#"{ "atlas": { "initial_size": 16384 } }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            RendererConfig::from_json_str("{ font_size"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn round_trips_through_json() {
        let config = RendererConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(RendererConfig::from_json_str(&json).unwrap(), config);
    }
}
