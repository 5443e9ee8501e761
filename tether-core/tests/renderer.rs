//! Integration tests for the renderer core.
//!
//! The renderer is driven through its public entry points with an in-memory
//! shaper (fixed 6x10 glyphs on an 8x16 cell) and a presenter that records
//! every upload and frame instead of touching a GPU.

use tether_core::{
    AtlasRect, AtlasUpload, DrawInstance, FontId, Frame, FramePresenter, FrameStatus, GlyphBitmap,
    GlyphKey, Key, KeyAction, KeyEvent, LineMetrics, Modifiers, NamedKey, PlatformKeyEvent,
    Position, Renderer, RendererConfig, RendererError, ScrollPhase, ShapedGlyph, TextShaper,
};

/// Glyph drawn with a bitmap far larger than any atlas.
const HUGE: char = '@';

struct FakeShaper;

impl TextShaper for FakeShaper {
    fn primary_font(&self) -> FontId {
        FontId(0)
    }

    fn shape(&mut self, _font: FontId, ch: char, _font_size: f32) -> ShapedGlyph {
        ShapedGlyph {
            glyph: ch as u32 as u16,
            advance: 8.0,
        }
    }

    fn rasterize(&mut self, key: GlyphKey) -> Option<GlyphBitmap> {
        match char::from_u32(key.glyph as u32)? {
            ' ' => Some(GlyphBitmap {
                width: 0,
                height: 0,
                left: 0,
                top: 0,
                advance: 8.0,
                coverage: Vec::new(),
            }),
            HUGE => Some(GlyphBitmap {
                width: 5000,
                height: 20,
                left: 0,
                top: 20,
                advance: 8.0,
                coverage: Vec::new(),
            }),
            _ => Some(GlyphBitmap {
                width: 6,
                height: 10,
                left: 1,
                top: 10,
                advance: 8.0,
                coverage: vec![255; 60],
            }),
        }
    }

    fn line_metrics(&mut self, _font: FontId, _font_size: f32) -> LineMetrics {
        LineMetrics {
            ascent: 10.0,
            descent: -3.0,
            line_height: 16.0,
            cell_width: 8.0,
        }
    }
}

#[derive(Debug)]
struct RecordedUpload {
    size: (u32, u32),
    region: AtlasRect,
    recreate: bool,
}

#[derive(Debug)]
struct RecordedFrame {
    size: (u32, u32),
    atlas_size: (u32, u32),
    batches: usize,
    instances: Vec<DrawInstance>,
}

#[derive(Default)]
struct RecordingPresenter {
    max_dimension: u32,
    fail_present: bool,
    uploads: Vec<RecordedUpload>,
    frames: Vec<RecordedFrame>,
}

impl RecordingPresenter {
    fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension,
            ..Default::default()
        }
    }

    fn last_frame(&self) -> &RecordedFrame {
        self.frames.last().expect("no frame presented")
    }
}

impl FramePresenter for RecordingPresenter {
    type Target<'a> = ();

    fn max_texture_dimension(&self) -> u32 {
        self.max_dimension
    }

    fn upload_atlas(&mut self, upload: AtlasUpload<'_>) -> Result<(), RendererError> {
        assert_eq!(upload.data.len(), (upload.width * upload.height * 4) as usize);
        self.uploads.push(RecordedUpload {
            size: (upload.width, upload.height),
            region: upload.region,
            recreate: upload.recreate,
        });
        Ok(())
    }

    fn present(&mut self, _target: (), frame: &Frame<'_>) -> Result<(), RendererError> {
        if self.fail_present {
            return Err(RendererError::Presentation("surface lost".into()));
        }
        self.frames.push(RecordedFrame {
            size: (frame.width, frame.height),
            atlas_size: frame.atlas_size,
            batches: frame.batches.len(),
            instances: frame
                .batches
                .iter()
                .flat_map(|b| b.instances.iter().copied())
                .collect(),
        });
        Ok(())
    }
}

struct NsKey {
    code: u16,
    modifiers: Modifiers,
    chars: Option<&'static str>,
}

impl PlatformKeyEvent for NsKey {
    fn key_code(&self) -> u16 {
        self.code
    }

    fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    fn characters(&self) -> Option<&str> {
        self.chars
    }
}

fn test_config() -> RendererConfig {
    let mut config = RendererConfig::default();
    config.padding = 4.0;
    config.prewarm_ascii = false;
    config.atlas.initial_size = 128;
    config.atlas.max_size = 256;
    config
}

fn renderer(width: u32, height: u32) -> Renderer<RecordingPresenter, FakeShaper> {
    Renderer::create(RecordingPresenter::new(4096), FakeShaper, test_config(), width, height)
        .expect("renderer")
}

#[test]
fn create_fails_when_device_cannot_hold_atlas() {
    let result = Renderer::create(RecordingPresenter::new(64), FakeShaper, test_config(), 100, 100);
    assert!(matches!(
        result.err(),
        Some(RendererError::DeviceCapabilityUnsupported {
            required: 128,
            available: 64
        })
    ));
}

#[test]
fn create_rejects_invalid_config() {
    let mut config = test_config();
    config.tab_width = 0;
    let result = Renderer::create(RecordingPresenter::new(4096), FakeShaper, config, 100, 100);
    assert!(matches!(result.err(), Some(RendererError::Config(_))));
}

#[test]
fn atlas_is_capped_by_device_limit() {
    let mut config = test_config();
    config.atlas.max_size = 8192;
    let renderer =
        Renderer::create(RecordingPresenter::new(512), FakeShaper, config, 100, 100).unwrap();
    assert_eq!(renderer.atlas().max_size(), 512);
}

#[test]
fn unchanged_state_skips_redraw() {
    let mut renderer = renderer(200, 100);
    assert!(renderer.needs_redraw());
    assert!(matches!(renderer.draw(()), FrameStatus::Drawn { .. }));
    assert!(!renderer.needs_redraw());

    assert_eq!(renderer.draw(()), FrameStatus::Skipped);
    assert_eq!(renderer.draw(()), FrameStatus::Skipped);
    assert_eq!(renderer.get_val(), 1);
    assert_eq!(renderer.stats().frames_skipped, 2);
    assert_eq!(renderer.presenter().frames.len(), 1);

    renderer.insert_text("x");
    assert!(matches!(renderer.draw(()), FrameStatus::Drawn { .. }));
    assert_eq!(renderer.get_val(), 2);
}

#[test]
fn hello_lays_out_on_the_cell_grid() {
    let mut renderer = renderer(200, 100);
    renderer.insert_text("hello");
    assert_eq!(renderer.buffer().text(), "hello");
    assert_eq!(renderer.buffer().cursor(), Position::new(0, 5));

    assert_eq!(renderer.draw(()), FrameStatus::Drawn { instances: 6 });
    let frame = renderer.presenter().last_frame();
    assert_eq!(frame.size, (200, 100));
    assert_eq!(frame.batches, 1);
    assert_eq!(frame.atlas_size, (128, 128));

    // padding 4 + bearing 1; baseline 4 + ascent 10 minus top 10.
    for (i, glyph) in frame.instances[..5].iter().enumerate() {
        assert_eq!(glyph.pos, [5.0 + 8.0 * i as f32, 4.0]);
        assert_eq!(glyph.size, [6.0, 10.0]);
    }
    // Both 'l's share one atlas slot.
    assert_eq!(frame.instances[2].uv_tl, frame.instances[3].uv_tl);
    assert_ne!(frame.instances[0].uv_tl, frame.instances[1].uv_tl);

    let cursor = frame.instances[5];
    assert_eq!(cursor.pos, [44.0, 4.0]);
    assert_eq!(cursor.size, [2.0, 16.0]);
    assert_eq!(cursor.uv_tl, cursor.uv_br);
    assert_eq!(cursor.color, renderer.config().cursor_color.pack());
}

#[test]
fn oversized_glyph_draws_placeholder() {
    let mut renderer = renderer(200, 100);
    renderer.insert_text(&format!("a{HUGE}b"));
    assert!(renderer.needs_redraw());

    assert_eq!(renderer.draw(()), FrameStatus::Drawn { instances: 4 });
    let placeholder = renderer.atlas().placeholder();
    let frame = renderer.presenter().last_frame();
    assert_eq!(frame.instances[1].uv_tl, placeholder.uv_tl());
    assert_eq!(frame.instances[1].uv_br, placeholder.uv_br());
    assert_eq!(renderer.stats().placeholders, 1);

    // The next frame substitutes again without failing.
    renderer.request_redraw();
    assert_eq!(renderer.draw(()), FrameStatus::Drawn { instances: 4 });
    assert_eq!(renderer.stats().placeholders, 2);
}

#[test]
fn atlas_uploads_are_incremental() {
    let mut renderer = renderer(200, 100);
    renderer.insert_text("ab");
    renderer.draw(());
    renderer.insert_text("c");
    renderer.draw(());
    renderer.insert_text("a");
    renderer.draw(());

    let uploads = &renderer.presenter().uploads;
    assert_eq!(uploads.len(), 2);
    assert!(uploads[0].recreate);
    assert_eq!(uploads[0].region, AtlasRect::new(0, 0, 128, 128));
    assert!(!uploads[1].recreate);
    assert_eq!((uploads[1].region.width, uploads[1].region.height), (6, 10));
    assert!(uploads.iter().all(|u| u.size == (128, 128)));
}

#[test]
fn resize_keeps_atlas_and_skips_empty_surface() {
    let mut renderer = renderer(200, 100);
    renderer.insert_text("abc");
    renderer.draw(());
    let atlas_len = renderer.atlas().len();

    renderer.resize(0, 0);
    assert_eq!(renderer.draw(()), FrameStatus::Skipped);
    assert!(renderer.needs_redraw());

    renderer.resize(400, 300);
    assert!(matches!(renderer.draw(()), FrameStatus::Drawn { .. }));
    assert_eq!(renderer.presenter().last_frame().size, (400, 300));
    assert_eq!(renderer.atlas().len(), atlas_len);
    assert_eq!(renderer.presenter().uploads.iter().filter(|u| u.recreate).count(), 1);
}

#[test]
fn platform_keys_edit_the_buffer() {
    let mut renderer = renderer(200, 100);
    renderer.draw(());

    let typed = NsKey {
        code: 7,
        modifiers: Modifiers::NONE,
        chars: Some("x"),
    };
    assert_eq!(renderer.handle_platform_keydown(&typed), KeyAction::Insert("x".into()));
    let enter = NsKey {
        code: 36,
        modifiers: Modifiers::NONE,
        chars: Some("\r"),
    };
    renderer.handle_platform_keydown(&enter);
    renderer.handle_platform_keydown(&typed);
    assert_eq!(renderer.buffer().text(), "x\nx");
    assert!(renderer.needs_redraw());

    let backspace = NsKey {
        code: 51,
        modifiers: Modifiers::META,
        chars: Some("\u{7f}"),
    };
    assert_eq!(renderer.handle_platform_keydown(&backspace), KeyAction::DeleteToLineStart);
    assert_eq!(renderer.buffer().text(), "x\n");

    renderer.draw(());
    let escape = KeyEvent::named(NamedKey::Escape, Modifiers::NONE);
    assert_eq!(renderer.handle_keydown(&escape), KeyAction::Ignored);
    assert!(!renderer.needs_redraw());

    let unknown = KeyEvent::new(Key::Unidentified(200), Modifiers::NONE, None);
    assert_eq!(renderer.handle_keydown(&unknown), KeyAction::Ignored);
    assert_eq!(renderer.draw(()), FrameStatus::Skipped);
}

#[test]
fn scroll_gesture_overscrolls_then_snaps_back() {
    let mut renderer = renderer(200, 100);
    let text = (0..20).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
    renderer.insert_text(&text);
    renderer.handle_keydown(&KeyEvent::named(NamedKey::ArrowUp, Modifiers::META));
    assert_eq!(renderer.buffer().scroll_offset().y, 0.0);
    renderer.draw(());

    // 20 lines x 16px in a 92px viewport.
    let max = renderer.buffer().max_scroll().y;
    assert_eq!(max, 228.0);

    renderer.handle_scroll(0.0, 100.0, ScrollPhase::Began);
    assert!(renderer.buffer().scroll_offset().y < 0.0);
    assert!(renderer.needs_redraw());
    assert!(matches!(renderer.draw(()), FrameStatus::Drawn { .. }));

    renderer.handle_scroll(0.0, 0.0, ScrollPhase::Ended);
    assert_eq!(renderer.buffer().scroll_offset().y, 0.0);

    renderer.handle_scroll(0.0, -1000.0, ScrollPhase::None);
    assert_eq!(renderer.buffer().scroll_offset().y, max);
    renderer.draw(());

    // Only the lines in view are drawn: the last line is at the bottom.
    let frame = renderer.presenter().last_frame();
    let bottom = frame
        .instances
        .iter()
        .map(|i| i.pos[1] + i.size[1])
        .fold(f32::MIN, f32::max);
    assert!(bottom <= 100.0);
    assert!(frame.instances.len() < text.chars().count());
}

#[test]
fn accumulated_scroll_applies_on_draw() {
    let mut renderer = renderer(200, 100);
    renderer.insert_text(&"x\n".repeat(30));
    renderer.handle_keydown(&KeyEvent::named(NamedKey::ArrowUp, Modifiers::META));
    renderer.draw(());

    renderer.accumulate_scroll(0.0, -10.0, ScrollPhase::Began);
    renderer.accumulate_scroll(0.0, -15.0, ScrollPhase::Changed);
    assert_eq!(renderer.buffer().scroll_offset().y, 0.0);
    assert!(renderer.needs_redraw());

    assert!(matches!(renderer.draw(()), FrameStatus::Drawn { .. }));
    assert_eq!(renderer.buffer().scroll_offset().y, 25.0);
}

#[test]
fn failed_presentation_keeps_redraw_pending() {
    let mut renderer = renderer(200, 100);
    renderer.insert_text("abc");
    renderer.presenter_mut().fail_present = true;

    assert_eq!(renderer.draw(()), FrameStatus::Failed);
    assert!(renderer.needs_redraw());
    assert_eq!(renderer.get_val(), 0);
    assert_eq!(renderer.stats().frames_failed, 1);

    renderer.presenter_mut().fail_present = false;
    assert_eq!(renderer.draw(()), FrameStatus::Drawn { instances: 4 });
    assert_eq!(renderer.get_val(), 1);
}

#[test]
fn first_frame_prewarms_ascii() {
    let mut config = test_config();
    config.prewarm_ascii = true;
    let mut renderer =
        Renderer::create(RecordingPresenter::new(4096), FakeShaper, config, 200, 100).unwrap();
    assert!(renderer.atlas().is_empty());

    renderer.draw(());
    assert_eq!(renderer.atlas().len(), 95);

    renderer.insert_text("hello");
    let misses = renderer.stats().atlas.misses;
    renderer.draw(());
    assert_eq!(renderer.stats().atlas.misses, misses);
}

#[test]
fn atlas_image_matches_atlas_size() {
    let mut renderer = renderer(200, 100);
    renderer.insert_text("abc");
    renderer.draw(());
    let image = renderer.atlas_image();
    assert_eq!(image.dimensions(), renderer.atlas().size());
}
