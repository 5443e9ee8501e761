//! Tether: GPU text editor renderer core.
//!
//! The host application owns a [`Renderer`] and forwards its window events
//! to it: key presses and scroll gestures update the [`TextBuffer`], and
//! `draw` turns the visible text into instanced glyph quads sampled from a
//! lazily filled [`GlyphAtlas`].
//!
//! ```text
//! host events ─► InputStateMachine ─► TextBuffer
//!                                         │
//! draw() ─► Arena<DrawInstance> ◄─ GlyphAtlas ◄─ TextShaper
//!              │
//!              └─► FramePresenter (wgpu)
//! ```

pub mod arena;
pub mod atlas;
pub mod buffer;
pub mod config;
pub mod error;
pub mod gpu;
pub mod input;
pub mod primitives;
pub mod renderer;
pub mod shaping;

pub use arena::{Arena, ArenaHandle, ArenaSpan};
pub use atlas::{AtlasRect, AtlasSlot, AtlasStats, AtlasUpload, GlyphAtlas, PlaceholderGlyph};
pub use buffer::{CursorMotion, Position, TextBuffer};
pub use config::{ArenaConfig, AtlasConfig, RendererConfig, ScrollConfig};
pub use error::{ConfigError, RendererError};
pub use gpu::{DrawBatch, DrawInstance, Frame, FramePresenter, WgpuPresenter, WgpuTarget};
pub use input::{
    InputState, InputStateMachine, Key, KeyAction, KeyEvent, Modifiers, NamedKey,
    PlatformKeyEvent, ScrollPhase,
};
pub use primitives::{Color, Point, Size};
pub use renderer::{FrameStatus, Renderer, RendererStats};
pub use shaping::{FontId, FontdueShaper, GlyphBitmap, GlyphKey, LineMetrics, ShapedGlyph, TextShaper};
