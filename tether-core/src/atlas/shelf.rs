//! Shelf packer for the glyph atlas.
//!
//! Space is carved into horizontal shelves stacked top to bottom. Each shelf
//! fills left to right from a cursor; regions returned by eviction go into a
//! per-shelf free list and are reused before the cursor advances. A shelf
//! with no live regions is rewound, and empty shelves at the bottom are
//! popped so their height can be handed out again.

/// A rectangle of texels inside the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AtlasRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AtlasRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &AtlasRect) -> AtlasRect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        AtlasRect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    pub fn intersects(&self, other: &AtlasRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    x: u32,
    width: u32,
}

#[derive(Debug)]
struct Shelf {
    y: u32,
    /// Padded height.
    height: u32,
    /// Next unused x.
    cursor: u32,
    /// Reclaimed spans left of `cursor`, sorted by x, never adjacent.
    free: Vec<Span>,
    live: u32,
}

impl Shelf {
    fn new(y: u32, height: u32) -> Self {
        Self {
            y,
            height,
            cursor: 0,
            free: Vec::new(),
            live: 0,
        }
    }

    /// Find an x for a padded width, preferring reclaimed spans.
    fn take(&mut self, width: u32, atlas_width: u32) -> Option<u32> {
        if let Some(i) = self.free.iter().position(|s| s.width >= width) {
            let span = &mut self.free[i];
            let x = span.x;
            span.x += width;
            span.width -= width;
            if span.width == 0 {
                self.free.remove(i);
            }
            return Some(x);
        }
        if self.cursor + width <= atlas_width {
            let x = self.cursor;
            self.cursor += width;
            return Some(x);
        }
        None
    }

    fn release(&mut self, x: u32, width: u32) {
        self.live = self.live.saturating_sub(1);
        if self.live == 0 {
            self.cursor = 0;
            self.free.clear();
            return;
        }

        let at = self.free.partition_point(|s| s.x < x);
        self.free.insert(at, Span { x, width });

        // Merge with the right neighbour, then the left one.
        if at + 1 < self.free.len() && self.free[at].x + self.free[at].width == self.free[at + 1].x {
            self.free[at].width += self.free[at + 1].width;
            self.free.remove(at + 1);
        }
        let mut at = at;
        if at > 0 && self.free[at - 1].x + self.free[at - 1].width == self.free[at].x {
            self.free[at - 1].width += self.free[at].width;
            self.free.remove(at);
            at -= 1;
        }

        // A span touching the cursor goes back to the tail.
        if self.free[at].x + self.free[at].width == self.cursor {
            self.cursor = self.free[at].x;
            self.free.remove(at);
        }
    }

    fn is_empty(&self) -> bool {
        self.live == 0
    }
}

/// Shelf allocator over a `width` x `height` texture.
#[derive(Debug)]
pub struct ShelfPacker {
    width: u32,
    height: u32,
    padding: u32,
    shelves: Vec<Shelf>,
}

impl ShelfPacker {
    pub fn new(width: u32, height: u32, padding: u32) -> Self {
        Self {
            width,
            height,
            padding,
            shelves: Vec::new(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bottom edge of the lowest shelf.
    fn used_height(&self) -> u32 {
        self.shelves.last().map(|s| s.y + s.height).unwrap_or(0)
    }

    /// Reserve a `width` x `height` region. Padding is added on the right and
    /// bottom edges and is not part of the returned rectangle.
    pub fn allocate(&mut self, width: u32, height: u32) -> Option<AtlasRect> {
        let padded_w = width + self.padding;
        let padded_h = height + self.padding;
        if padded_w > self.width || padded_h > self.height {
            return None;
        }

        // Best fit by height among shelves that can take the width.
        let atlas_width = self.width;
        let mut best: Option<(usize, u32)> = None;
        for (i, shelf) in self.shelves.iter().enumerate() {
            if shelf.height < padded_h {
                continue;
            }
            let fits = shelf.free.iter().any(|s| s.width >= padded_w)
                || shelf.cursor + padded_w <= atlas_width;
            if !fits {
                continue;
            }
            let waste = shelf.height - padded_h;
            if best.is_none_or(|(_, w)| waste < w) {
                best = Some((i, waste));
                if waste == 0 {
                    break;
                }
            }
        }

        // Don't bury small glyphs in much taller shelves while there is
        // room to open a snug one.
        let can_open = self.used_height() + padded_h <= self.height;
        let index = match best {
            Some((i, waste)) if !can_open || waste <= padded_h / 2 => i,
            _ if can_open => {
                let y = self.used_height();
                self.shelves.push(Shelf::new(y, padded_h));
                self.shelves.len() - 1
            }
            _ => self.reclaim_empty_run(padded_h)?,
        };

        let shelf = &mut self.shelves[index];
        let x = shelf.take(padded_w, atlas_width)?;
        shelf.live += 1;
        Some(AtlasRect::new(x, shelf.y, width, height))
    }

    /// Merge the first run of adjacent empty shelves tall enough for
    /// `padded_h` into one shelf of exactly that height. Leftover height
    /// stays behind as an empty shelf.
    fn reclaim_empty_run(&mut self, padded_h: u32) -> Option<usize> {
        let mut i = 0;
        while i < self.shelves.len() {
            if !self.shelves[i].is_empty() {
                i += 1;
                continue;
            }
            let start = i;
            let mut total = 0;
            while i < self.shelves.len() && self.shelves[i].is_empty() && total < padded_h {
                total += self.shelves[i].height;
                i += 1;
            }
            if total < padded_h {
                continue;
            }

            let y = self.shelves[start].y;
            let mut merged = vec![Shelf::new(y, padded_h)];
            if total > padded_h {
                merged.push(Shelf::new(y + padded_h, total - padded_h));
            }
            self.shelves.splice(start..i, merged);
            return Some(start);
        }
        None
    }

    /// Return a region handed out by [`allocate`](Self::allocate).
    pub fn deallocate(&mut self, rect: AtlasRect) {
        let Ok(index) = self.shelves.binary_search_by_key(&rect.y, |s| s.y) else {
            return;
        };
        self.shelves[index].release(rect.x, rect.width + self.padding);

        while self.shelves.last().is_some_and(Shelf::is_empty) {
            self.shelves.pop();
        }
    }

    /// Enlarge the packing area. Existing regions keep their coordinates.
    pub fn grow(&mut self, width: u32, height: u32) {
        self.width = self.width.max(width);
        self.height = self.height.max(height);
    }

    /// Forget every region.
    pub fn clear(&mut self) {
        self.shelves.clear();
    }

    pub fn shelf_count(&self) -> usize {
        self.shelves.len()
    }
}
