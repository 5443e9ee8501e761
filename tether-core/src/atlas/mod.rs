//! Glyph Atlas for GPU text rendering.
//!
//! Lazily rasterizes glyphs through the [`TextShaper`] and packs them into a
//! single RGBA texture (white RGB, coverage in alpha). The CPU copy is the
//! source of truth; writes accumulate into a dirty rectangle that the
//! renderer hands to the presenter once per frame.
//!
//! When packing fails the atlas doubles (existing glyphs keep their texel
//! coordinates). At maximum size it evicts least-recently-resolved glyphs,
//! skipping anything resolved during the current frame.

mod shelf;

use std::collections::HashMap;

use image::RgbaImage;
use lru::LruCache;

use crate::error::RendererError;
use crate::shaping::{GlyphBitmap, GlyphKey, TextShaper};

pub use shelf::{AtlasRect, ShelfPacker};

/// A packed glyph: where it lives in the atlas and how to place it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasSlot {
    pub rect: AtlasRect,
    /// Pen position to the bitmap's left edge.
    pub left: i32,
    /// Baseline up to the bitmap's top edge.
    pub top: i32,
    pub advance: f32,
}

impl AtlasSlot {
    /// Glyphs without ink (space) have no texels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rect.is_empty()
    }

    /// Top-left texel coordinate.
    #[inline]
    pub fn uv_tl(&self) -> [f32; 2] {
        [self.rect.x as f32, self.rect.y as f32]
    }

    /// Bottom-right texel coordinate.
    #[inline]
    pub fn uv_br(&self) -> [f32; 2] {
        [self.rect.right() as f32, self.rect.bottom() as f32]
    }
}

/// Size of the fallback glyph drawn for glyphs that cannot be packed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceholderGlyph {
    pub width: u32,
    pub height: u32,
    pub advance: f32,
}

/// Texture contents the presenter should push to the GPU.
#[derive(Debug)]
pub struct AtlasUpload<'a> {
    pub width: u32,
    pub height: u32,
    /// Full RGBA8 atlas, `width * height * 4` bytes.
    pub data: &'a [u8],
    /// Region that changed since the last upload.
    pub region: AtlasRect,
    /// The texture must be (re)created at `width` x `height`.
    pub recreate: bool,
}

/// Running cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AtlasStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub growths: u32,
}

#[derive(Debug, Clone, Copy)]
struct AtlasEntry {
    slot: AtlasSlot,
    /// Frame of the most recent resolve.
    frame: u64,
}

/// Glyph atlas that lazily rasterizes and packs glyphs at any size.
pub struct GlyphAtlas {
    /// Recency-ordered cache: least recently resolved at the LRU end.
    entries: LruCache<GlyphKey, AtlasEntry>,
    /// Keys whose bitmaps can never fit, with their bitmap dimensions.
    oversized: HashMap<GlyphKey, (u32, u32)>,
    packer: ShelfPacker,
    /// Atlas texture data (RGBA).
    data: Vec<u8>,
    width: u32,
    height: u32,
    max_size: u32,
    padding: u32,
    white: AtlasRect,
    placeholder: AtlasSlot,
    /// Bounding box of all writes since the last upload.
    dirty: Option<AtlasRect>,
    resized: bool,
    frame: u64,
    stats: AtlasStats,
}

impl GlyphAtlas {
    /// Create a `size` x `size` atlas that may grow to `max_size`.
    ///
    /// Reserves a white texel for solid quads and draws the placeholder glyph.
    pub fn new(size: u32, max_size: u32, padding: u32, placeholder: PlaceholderGlyph) -> Self {
        let size = size.max(1);
        let max_size = max_size.max(size);
        let mut atlas = Self {
            entries: LruCache::unbounded(),
            oversized: HashMap::new(),
            packer: ShelfPacker::new(size, size, padding),
            data: vec![0u8; (size * size * 4) as usize],
            width: size,
            height: size,
            max_size,
            padding,
            white: AtlasRect::default(),
            placeholder: AtlasSlot {
                rect: AtlasRect::default(),
                left: 0,
                top: 0,
                advance: placeholder.advance,
            },
            dirty: None,
            resized: true,
            frame: 0,
            stats: AtlasStats::default(),
        };

        if let Some(white) = atlas.packer.allocate(1, 1) {
            atlas.fill_rect(white, |_, _| 255);
            atlas.white = white;
        }

        let (w, h) = (placeholder.width.max(3), placeholder.height.max(3));
        if let Some(rect) = atlas.packer.allocate(w, h) {
            // Hollow box, one texel thick.
            atlas.fill_rect(rect, |x, y| {
                if x == 0 || y == 0 || x == w - 1 || y == h - 1 { 255 } else { 0 }
            });
            atlas.placeholder.rect = rect;
            atlas.placeholder.left = 1;
            atlas.placeholder.top = h as i32;
        }

        atlas
    }

    /// Start a new frame. Glyphs resolved from now on are protected from
    /// eviction until the next call.
    pub fn begin_frame(&mut self) {
        self.frame += 1;
    }

    /// Look up a glyph, rasterizing and packing it on a miss.
    pub fn resolve<S: TextShaper + ?Sized>(
        &mut self,
        key: GlyphKey,
        shaper: &mut S,
    ) -> Result<AtlasSlot, RendererError> {
        let frame = self.frame;
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.frame = frame;
            self.stats.hits += 1;
            return Ok(entry.slot);
        }
        if let Some(&(width, height)) = self.oversized.get(&key) {
            return Err(RendererError::OversizedGlyph {
                width,
                height,
                max: self.max_size,
            });
        }

        self.stats.misses += 1;
        let slot = match shaper.rasterize(key) {
            Some(bitmap) if bitmap.width > 0 && bitmap.height > 0 => self.pack(key, &bitmap)?,
            // No ink: keep the glyph's own metrics without texels.
            Some(bitmap) => AtlasSlot {
                rect: AtlasRect::default(),
                left: bitmap.left,
                top: bitmap.top,
                advance: bitmap.advance,
            },
            None => AtlasSlot {
                rect: AtlasRect::default(),
                left: 0,
                top: 0,
                advance: 0.0,
            },
        };
        self.entries.put(key, AtlasEntry { slot, frame });
        Ok(slot)
    }

    /// Resolve a batch of keys ahead of use. Returns how many were packed.
    pub fn precache<S, I>(&mut self, keys: I, shaper: &mut S) -> usize
    where
        S: TextShaper + ?Sized,
        I: IntoIterator<Item = GlyphKey>,
    {
        keys.into_iter()
            .filter(|key| self.resolve(*key, shaper).is_ok())
            .count()
    }

    fn pack(&mut self, key: GlyphKey, bitmap: &GlyphBitmap) -> Result<AtlasSlot, RendererError> {
        let (width, height) = (bitmap.width, bitmap.height);
        if width + self.padding > self.max_size || height + self.padding > self.max_size {
            self.oversized.insert(key, (width, height));
            return Err(RendererError::OversizedGlyph {
                width,
                height,
                max: self.max_size,
            });
        }

        let rect = self.allocate(width, height)?;
        self.fill_rect(rect, |x, y| {
            bitmap
                .coverage
                .get((y * width + x) as usize)
                .copied()
                .unwrap_or(0)
        });

        Ok(AtlasSlot {
            rect,
            left: bitmap.left,
            top: bitmap.top,
            advance: bitmap.advance,
        })
    }

    /// Find room for a glyph: pack, else grow, else evict.
    fn allocate(&mut self, width: u32, height: u32) -> Result<AtlasRect, RendererError> {
        loop {
            if let Some(rect) = self.packer.allocate(width, height) {
                return Ok(rect);
            }
            if self.grow() {
                continue;
            }
            if !self.evict_lru() {
                return Err(RendererError::AtlasFull { width, height });
            }
        }
    }

    /// Double the atlas, keeping every glyph where it is.
    fn grow(&mut self) -> bool {
        let new_width = self.width * 2;
        let new_height = self.height * 2;
        if new_width > self.max_size || new_height > self.max_size {
            return false;
        }

        let mut data = vec![0u8; (new_width * new_height * 4) as usize];
        let old_row = (self.width * 4) as usize;
        let new_row = (new_width * 4) as usize;
        for (src, dst) in self.data.chunks_exact(old_row).zip(data.chunks_exact_mut(new_row)) {
            dst[..old_row].copy_from_slice(src);
        }

        tracing::info!(
            "Glyph atlas grew {}x{} -> {}x{}",
            self.width,
            self.height,
            new_width,
            new_height
        );
        self.data = data;
        self.width = new_width;
        self.height = new_height;
        self.packer.grow(new_width, new_height);
        self.resized = true;
        self.dirty = Some(AtlasRect::new(0, 0, new_width, new_height));
        self.stats.growths += 1;
        true
    }

    /// Evict the least recently resolved glyph unless it was used this frame.
    fn evict_lru(&mut self) -> bool {
        match self.entries.peek_lru() {
            Some((_, entry)) if entry.frame < self.frame => {}
            _ => return false,
        }
        let Some((key, entry)) = self.entries.pop_lru() else {
            return false;
        };
        if !entry.slot.is_empty() {
            let rect = entry.slot.rect;
            self.packer.deallocate(rect);
            // Clear the glyph and its padding so neighbours never sample stale ink.
            let cleared = AtlasRect::new(
                rect.x,
                rect.y,
                (rect.width + self.padding).min(self.width - rect.x),
                (rect.height + self.padding).min(self.height - rect.y),
            );
            self.fill_rect(cleared, |_, _| 0);
        }
        self.stats.evictions += 1;
        tracing::debug!("Evicted glyph {:?} (last used frame {})", key, entry.frame);
        true
    }

    /// Write white texels with per-texel alpha into `rect`.
    fn fill_rect(&mut self, rect: AtlasRect, alpha: impl Fn(u32, u32) -> u8) {
        for y in 0..rect.height {
            for x in 0..rect.width {
                let dst = (((rect.y + y) * self.width + rect.x + x) * 4) as usize;
                let a = alpha(x, y);
                let rgb = if a == 0 { 0 } else { 255 };
                self.data[dst] = rgb; // R
                self.data[dst + 1] = rgb; // G
                self.data[dst + 2] = rgb; // B
                self.data[dst + 3] = a; // A
            }
        }
        self.mark_dirty(rect);
    }

    fn mark_dirty(&mut self, rect: AtlasRect) {
        if rect.is_empty() {
            return;
        }
        self.dirty = Some(match self.dirty {
            Some(d) => d.union(&rect),
            None => rect,
        });
    }

    /// Take pending texture changes, if any. Resets to clean.
    pub fn take_upload(&mut self) -> Option<AtlasUpload<'_>> {
        let recreate = std::mem::take(&mut self.resized);
        let region = if recreate {
            self.dirty = None;
            AtlasRect::new(0, 0, self.width, self.height)
        } else {
            self.dirty.take()?
        };
        Some(AtlasUpload {
            width: self.width,
            height: self.height,
            data: &self.data,
            region,
            recreate,
        })
    }

    /// Force the next upload to recreate the texture (e.g. after a failed upload).
    pub fn invalidate_texture(&mut self) {
        self.resized = true;
    }

    /// Slot for the 1x1 white texel used by solid quads.
    ///
    /// The UV rectangle is collapsed onto the texel centre so every fragment
    /// samples exactly that texel regardless of quad size.
    pub fn white_texel(&self) -> AtlasSlot {
        AtlasSlot {
            rect: self.white,
            left: 0,
            top: 0,
            advance: 0.0,
        }
    }

    /// Centre of the white texel, in texel units.
    pub fn white_uv(&self) -> [f32; 2] {
        [self.white.x as f32 + 0.5, self.white.y as f32 + 0.5]
    }

    /// The fallback glyph. Never evicted.
    pub fn placeholder(&self) -> AtlasSlot {
        self.placeholder
    }

    pub fn contains(&self, key: &GlyphKey) -> bool {
        self.entries.contains(key)
    }

    /// Number of cached glyphs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub fn stats(&self) -> AtlasStats {
        self.stats
    }

    /// Get the atlas texture data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copy the atlas into an image for inspection.
    pub fn image(&self) -> RgbaImage {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }
}
