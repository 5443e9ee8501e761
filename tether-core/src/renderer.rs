//! Renderer Core
//!
//! Owns the per-frame arena, the glyph atlas, the text buffer and the input
//! state machine, and turns them into one instanced draw per frame.
//!
//! All entry points run on the host's UI thread; nothing here blocks or
//! spawns work.

use std::collections::HashMap;

use image::RgbaImage;

use crate::arena::Arena;
use crate::atlas::{AtlasSlot, AtlasStats, GlyphAtlas, PlaceholderGlyph};
use crate::buffer::{TextBuffer, char_columns};
use crate::config::RendererConfig;
use crate::error::RendererError;
use crate::gpu::{DrawBatch, DrawInstance, Frame, FramePresenter};
use crate::input::{InputStateMachine, KeyAction, KeyEvent, PlatformKeyEvent, ScrollPhase};
use crate::primitives::Size;
use crate::shaping::{FontId, GlyphKey, LineMetrics, ShapedGlyph, TextShaper};

/// Outcome of a [`Renderer::draw`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Nothing changed (or the surface has no area); no work was submitted.
    Skipped,
    Drawn { instances: usize },
    /// The presenter rejected the frame. The redraw flag stays set.
    Failed,
}

/// Running counters, for debugging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    pub frames_drawn: u64,
    pub frames_skipped: u64,
    pub frames_failed: u64,
    pub last_instances: usize,
    /// Glyphs drawn as the placeholder because they could not be packed.
    pub placeholders: u64,
    /// Frames cut short because the arena hit its ceiling.
    pub truncated_frames: u64,
    pub atlas: AtlasStats,
}

/// The editor renderer.
///
/// `P` owns the GPU; `S` provides glyphs. The host keeps one `Renderer` and
/// drives it from its event and display callbacks.
pub struct Renderer<P: FramePresenter, S: TextShaper> {
    presenter: P,
    shaper: S,
    config: RendererConfig,
    arena: Arena<DrawInstance>,
    atlas: GlyphAtlas,
    buffer: TextBuffer,
    input: InputStateMachine,
    /// Surface size in pixels.
    width: u32,
    height: u32,
    font: FontId,
    metrics: LineMetrics,
    /// Char to glyph id cache; avoids re-shaping every char every frame.
    glyphs: HashMap<char, ShapedGlyph>,
    prewarmed: bool,
    stats: RendererStats,
}

impl<P: FramePresenter, S: TextShaper> Renderer<P, S> {
    /// Create a renderer for a `width` x `height` surface.
    ///
    /// Fails if the config is invalid or the device cannot hold the initial
    /// atlas texture.
    pub fn create(
        presenter: P,
        mut shaper: S,
        config: RendererConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, RendererError> {
        config.validate()?;

        let available = presenter.max_texture_dimension();
        if available < config.atlas.initial_size {
            return Err(RendererError::DeviceCapabilityUnsupported {
                required: config.atlas.initial_size,
                available,
            });
        }

        let font = shaper.primary_font();
        let metrics = shaper.line_metrics(font, config.font_size);
        let placeholder = PlaceholderGlyph {
            width: metrics.cell_width.ceil().max(3.0) as u32,
            height: (metrics.ascent - metrics.descent).ceil().max(3.0) as u32,
            advance: metrics.cell_width,
        };
        let atlas = GlyphAtlas::new(
            config.atlas.initial_size,
            config.atlas.max_size.min(available),
            config.atlas.padding,
            placeholder,
        );

        let mut buffer = TextBuffer::new(config.tab_width, config.scroll);
        buffer.set_cell_metrics(metrics.cell_width, metrics.line_height);
        buffer.set_viewport(text_viewport(width, height, config.padding));

        tracing::info!(
            "Renderer created: {}x{} surface, {}px font, {}x{} atlas (max {})",
            width,
            height,
            config.font_size,
            atlas.size().0,
            atlas.size().1,
            atlas.max_size()
        );

        Ok(Self {
            presenter,
            shaper,
            arena: Arena::with_capacity(config.arena.initial_capacity),
            input: InputStateMachine::new(config.scroll.line_height_px),
            config,
            atlas,
            buffer,
            width,
            height,
            font,
            metrics,
            glyphs: HashMap::new(),
            prewarmed: false,
            stats: RendererStats::default(),
        })
    }

    // =====================================================================
    // Host entry points
    // =====================================================================

    /// Draw a frame into `target` if anything changed since the last one.
    pub fn draw(&mut self, target: P::Target<'_>) -> FrameStatus {
        self.input.flush_scroll(&mut self.buffer);

        if self.width == 0 || self.height == 0 || !self.input.needs_redraw() {
            self.stats.frames_skipped += 1;
            tracing::debug!("Skipping frame");
            return FrameStatus::Skipped;
        }

        self.arena.reset();
        self.atlas.begin_frame();
        if !self.prewarmed {
            if self.config.prewarm_ascii {
                self.prewarm_ascii();
            }
            self.prewarmed = true;
        }

        self.build_instances();

        if let Some(upload) = self.atlas.take_upload() {
            if let Err(e) = self.presenter.upload_atlas(upload) {
                tracing::warn!("Atlas upload failed: {}", e);
                self.atlas.invalidate_texture();
                self.stats.frames_failed += 1;
                return FrameStatus::Failed;
            }
        }

        let instances = self.arena.as_slice();
        let frame = Frame {
            width: self.width,
            height: self.height,
            clear_color: self.config.background_color,
            atlas_size: self.atlas.size(),
            batches: vec![DrawBatch {
                atlas: 0,
                instances,
            }],
        };

        match self.presenter.present(target, &frame) {
            Ok(()) => {
                self.input.take_redraw();
                self.stats.frames_drawn += 1;
                self.stats.last_instances = instances.len();
                FrameStatus::Drawn {
                    instances: instances.len(),
                }
            }
            Err(e) => {
                tracing::warn!("Frame presentation failed: {}", e);
                self.stats.frames_failed += 1;
                FrameStatus::Failed
            }
        }
    }

    /// Track a new surface size. The atlas is kept as is.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        tracing::debug!("Resize {}x{} -> {}x{}", self.width, self.height, width, height);
        self.width = width;
        self.height = height;
        self.buffer
            .set_viewport(text_viewport(width, height, self.config.padding));
        self.input.request_redraw();
    }

    pub fn handle_keydown(&mut self, event: &KeyEvent) -> KeyAction {
        self.input.handle_keydown(event, &mut self.buffer)
    }

    /// Translate and apply a host key event.
    pub fn handle_platform_keydown<E: PlatformKeyEvent + ?Sized>(&mut self, event: &E) -> KeyAction {
        self.handle_keydown(&KeyEvent::from_platform(event))
    }

    /// Apply a pixel scroll delta immediately.
    pub fn handle_scroll(&mut self, dx: f32, dy: f32, phase: ScrollPhase) {
        self.input.handle_scroll(dx, dy, phase, &mut self.buffer);
    }

    /// Queue a scroll delta for the next `draw`.
    pub fn accumulate_scroll(&mut self, dx: f32, dy: f32, phase: ScrollPhase) {
        self.input.accumulate_scroll(dx, dy, phase);
    }

    /// Insert text at the cursor without going through key translation.
    pub fn insert_text(&mut self, text: &str) {
        self.buffer.insert(text);
        self.buffer.scroll_cursor_into_view();
        self.input.request_redraw();
    }

    /// Export the atlas contents.
    pub fn atlas_image(&self) -> RgbaImage {
        self.atlas.image()
    }

    /// Frames drawn so far.
    pub fn get_val(&self) -> u64 {
        self.stats.frames_drawn
    }

    pub fn stats(&self) -> RendererStats {
        RendererStats {
            atlas: self.atlas.stats(),
            ..self.stats
        }
    }

    pub fn needs_redraw(&self) -> bool {
        self.input.needs_redraw()
    }

    pub fn request_redraw(&mut self) {
        self.input.request_redraw();
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn atlas(&self) -> &GlyphAtlas {
        &self.atlas
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn line_metrics(&self) -> LineMetrics {
        self.metrics
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    // =====================================================================
    // Frame building
    // =====================================================================

    fn prewarm_ascii(&mut self) {
        let font_size = self.config.font_size;
        let keys: Vec<GlyphKey> = (' '..='~')
            .map(|ch| {
                let shaped = shape_cached(&mut self.glyphs, &mut self.shaper, self.font, ch, font_size);
                GlyphKey::new(self.font, shaped.glyph, font_size)
            })
            .collect();
        let packed = self.atlas.precache(keys, &mut self.shaper);
        tracing::info!("Pre-warmed {} ASCII glyphs", packed);
    }

    /// Lay out the visible lines and the cursor into the arena.
    fn build_instances(&mut self) {
        let Self {
            shaper,
            config,
            arena,
            atlas,
            buffer,
            font,
            metrics,
            glyphs,
            stats,
            ..
        } = self;

        let padding = config.padding;
        let font_size = config.font_size;
        let tab_width = config.tab_width;
        let max_capacity = config.arena.max_capacity;
        let cell_width = metrics.cell_width;
        let line_height = metrics.line_height;
        let scroll = buffer.scroll_offset();
        let viewport = buffer.viewport();
        let left = padding;
        let right = padding + viewport.width;

        let mut substituted = 0u64;
        let mut truncated = false;

        'lines: for line_index in buffer.visible_lines() {
            let Some(line) = buffer.line(line_index) else {
                break;
            };
            let baseline =
                padding + line_index as f32 * line_height - scroll.y + metrics.ascent;

            let mut col = 0usize;
            for ch in line.chars() {
                let columns = char_columns(ch, tab_width);
                let x = padding + col as f32 * cell_width - scroll.x;
                col += columns;

                if ch.is_whitespace() || ch.is_control() {
                    continue;
                }
                let extent = columns.max(1) as f32 * cell_width;
                if x + extent < left || x > right {
                    continue;
                }

                let slot = match resolve_char(atlas, shaper, glyphs, *font, font_size, ch) {
                    Ok(slot) => slot,
                    Err(e) => {
                        tracing::debug!("Placeholder for {:?}: {}", ch, e);
                        substituted += 1;
                        atlas.placeholder()
                    }
                };
                if slot.is_empty() {
                    continue;
                }

                let instance = DrawInstance::glyph(
                    x + slot.left as f32,
                    baseline - slot.top as f32,
                    &slot,
                    config.text_color,
                );
                if !push_instance(arena, max_capacity, instance) {
                    truncated = true;
                    break 'lines;
                }
            }
        }

        let cursor = buffer.cursor();
        if !truncated && buffer.visible_lines().contains(&cursor.line) {
            let x = padding + buffer.cursor_display_col() as f32 * cell_width - scroll.x;
            let y = padding + cursor.line as f32 * line_height - scroll.y;
            let instance = DrawInstance::solid(
                x,
                y,
                config.cursor_width,
                line_height,
                atlas.white_uv(),
                config.cursor_color,
            );
            truncated = !push_instance(arena, max_capacity, instance);
        }

        if substituted > 0 {
            tracing::warn!("Drew {} glyphs as placeholders", substituted);
            stats.placeholders += substituted;
        }
        if truncated {
            tracing::warn!(
                "Instance arena full at {} records; frame truncated",
                arena.capacity()
            );
            stats.truncated_frames += 1;
        }
    }
}

/// Text area inside the padding.
fn text_viewport(width: u32, height: u32, padding: f32) -> Size {
    Size::new(
        (width as f32 - 2.0 * padding).max(0.0),
        (height as f32 - 2.0 * padding).max(0.0),
    )
}

fn shape_cached<S: TextShaper>(
    glyphs: &mut HashMap<char, ShapedGlyph>,
    shaper: &mut S,
    font: FontId,
    ch: char,
    font_size: f32,
) -> ShapedGlyph {
    *glyphs
        .entry(ch)
        .or_insert_with(|| shaper.shape(font, ch, font_size))
}

fn resolve_char<S: TextShaper>(
    atlas: &mut GlyphAtlas,
    shaper: &mut S,
    glyphs: &mut HashMap<char, ShapedGlyph>,
    font: FontId,
    font_size: f32,
    ch: char,
) -> Result<AtlasSlot, RendererError> {
    let shaped = shape_cached(glyphs, shaper, font, ch, font_size);
    atlas.resolve(GlyphKey::new(font, shaped.glyph, font_size), shaper)
}

/// Append an instance, doubling the arena up to `max_capacity` when full.
fn push_instance(arena: &mut Arena<DrawInstance>, max_capacity: usize, instance: DrawInstance) -> bool {
    if arena.alloc(instance).is_ok() {
        return true;
    }
    let capacity = arena.capacity();
    if capacity >= max_capacity {
        return false;
    }
    let grown = (capacity * 2).clamp(1, max_capacity);
    tracing::debug!("Instance arena grown {} -> {}", capacity, grown);
    arena.grow(grown);
    arena.alloc(instance).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_excludes_padding() {
        assert_eq!(text_viewport(100, 50, 8.0), Size::new(84.0, 34.0));
        assert_eq!(text_viewport(10, 10, 8.0), Size::ZERO);
    }

    #[test]
    fn push_grows_arena_until_ceiling() {
        let mut arena = Arena::with_capacity(2);
        let instance = DrawInstance::solid(0.0, 0.0, 1.0, 1.0, [0.5, 0.5], Default::default());
        for _ in 0..8 {
            assert!(push_instance(&mut arena, 8, instance));
        }
        assert_eq!(arena.capacity(), 8);
        assert!(!push_instance(&mut arena, 8, instance));
        assert_eq!(arena.len(), 8);
    }
}
