//! Text shaping boundary.
//!
//! The renderer never talks to a font library directly. It asks a
//! [`TextShaper`] for glyph ids, advances, line metrics and coverage bitmaps.
//! [`FontdueShaper`] is the bundled implementation.

use fontdue::{Font, FontSettings};

use crate::error::RendererError;

/// Identifies a font registered with a shaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(pub u16);

/// Atlas cache key: one entry per (font, glyph, rendered size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    pub font: FontId,
    pub glyph: u16,
    /// Size quantized to 0.5px (see [`size_key`]).
    pub size: u16,
}

impl GlyphKey {
    pub fn new(font: FontId, glyph: u16, font_size: f32) -> Self {
        Self {
            font,
            glyph,
            size: size_key(font_size),
        }
    }

    /// Rendered size in pixels.
    #[inline]
    pub fn size_px(&self) -> f32 {
        self.size as f32 / 2.0
    }
}

/// Quantize a font size to 0.5px granularity to bound cache entries.
#[inline]
pub fn size_key(font_size: f32) -> u16 {
    (font_size * 2.0).round() as u16
}

/// Glyph id plus horizontal advance for one character.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapedGlyph {
    pub glyph: u16,
    pub advance: f32,
}

/// Vertical font metrics plus the monospace cell width, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    pub ascent: f32,
    /// Negative below the baseline, as font tables report it.
    pub descent: f32,
    pub line_height: f32,
    pub cell_width: f32,
}

/// An alpha coverage bitmap for one glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphBitmap {
    pub width: u32,
    pub height: u32,
    /// Horizontal bearing: pen position to the bitmap's left edge.
    pub left: i32,
    /// Vertical bearing: baseline up to the bitmap's top edge.
    pub top: i32,
    pub advance: f32,
    /// `width * height` coverage bytes, row-major.
    pub coverage: Vec<u8>,
}

/// The shaping service the renderer consumes.
pub trait TextShaper {
    /// The font the renderer lays text out with.
    fn primary_font(&self) -> FontId;

    /// Map a character to a glyph at `font_size`.
    fn shape(&mut self, font: FontId, ch: char, font_size: f32) -> ShapedGlyph;

    /// Rasterize a glyph. Glyphs with no ink (space and friends) come back
    /// as a zero-sized bitmap that still carries their metrics; `None` means
    /// the font is unknown.
    fn rasterize(&mut self, key: GlyphKey) -> Option<GlyphBitmap>;

    fn line_metrics(&mut self, font: FontId, font_size: f32) -> LineMetrics;
}

/// [`TextShaper`] backed by fontdue.
///
/// Fonts are parsed from bytes supplied by the host; the first font added is
/// the primary font.
pub struct FontdueShaper {
    fonts: Vec<Font>,
}

impl FontdueShaper {
    /// Create a shaper with a single primary font.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RendererError> {
        let mut shaper = Self { fonts: Vec::new() };
        shaper.add_font(bytes)?;
        Ok(shaper)
    }

    /// Register another font and return its id.
    pub fn add_font(&mut self, bytes: &[u8]) -> Result<FontId, RendererError> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| RendererError::Font(e.to_string()))?;
        let id = FontId(self.fonts.len() as u16);
        self.fonts.push(font);
        Ok(id)
    }

    fn font(&self, id: FontId) -> Option<&Font> {
        self.fonts.get(id.0 as usize)
    }
}

impl TextShaper for FontdueShaper {
    fn primary_font(&self) -> FontId {
        FontId(0)
    }

    fn shape(&mut self, font: FontId, ch: char, font_size: f32) -> ShapedGlyph {
        let Some(font) = self.font(font) else {
            return ShapedGlyph { glyph: 0, advance: 0.0 };
        };
        let glyph = font.lookup_glyph_index(ch);
        let metrics = font.metrics_indexed(glyph, font_size);
        ShapedGlyph {
            glyph,
            advance: metrics.advance_width,
        }
    }

    fn rasterize(&mut self, key: GlyphKey) -> Option<GlyphBitmap> {
        let font = self.font(key.font)?;
        let (metrics, coverage) = font.rasterize_indexed(key.glyph, key.size_px());
        if metrics.width == 0 || metrics.height == 0 {
            return Some(GlyphBitmap {
                width: 0,
                height: 0,
                left: 0,
                top: 0,
                advance: metrics.advance_width,
                coverage: Vec::new(),
            });
        }
        Some(GlyphBitmap {
            width: metrics.width as u32,
            height: metrics.height as u32,
            left: metrics.xmin,
            // fontdue's ymin is the bitmap bottom relative to the baseline.
            top: metrics.ymin + metrics.height as i32,
            advance: metrics.advance_width,
            coverage,
        })
    }

    fn line_metrics(&mut self, font: FontId, font_size: f32) -> LineMetrics {
        let fallback = LineMetrics {
            ascent: font_size * 0.8,
            descent: -font_size * 0.2,
            line_height: font_size * 1.2,
            cell_width: font_size * 0.6,
        };
        let Some(font) = self.font(font) else {
            return fallback;
        };
        let cell_width = font.metrics('M', font_size).advance_width;
        match font.horizontal_line_metrics(font_size) {
            Some(lm) => LineMetrics {
                ascent: lm.ascent,
                descent: lm.descent,
                line_height: lm.new_line_size,
                cell_width,
            },
            None => LineMetrics {
                cell_width,
                ..fallback
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_key_quantizes_to_half_pixels() {
        assert_eq!(size_key(12.0), 24);
        assert_eq!(size_key(12.26), 25);
        assert_eq!(size_key(12.24), 24);
        assert_eq!(GlyphKey::new(FontId(0), 5, 12.5).size_px(), 12.5);
    }

    #[test]
    fn keys_differ_by_size() {
        let a = GlyphKey::new(FontId(1), 5, 12.0);
        let b = GlyphKey::new(FontId(1), 5, 24.0);
        assert_ne!(a, b);
        assert_eq!(a, GlyphKey::new(FontId(1), 5, 12.0));
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        let err = FontdueShaper::from_bytes(b"not a font").err();
        assert!(matches!(err, Some(RendererError::Font(_))));
    }
}
