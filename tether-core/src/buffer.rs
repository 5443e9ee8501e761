//! Text Buffer
//!
//! Editor contents as a list of lines plus a cursor and a scroll offset.
//! Columns count chars; display columns (for layout) use unicode widths with
//! tabs expanded to `tab_width` cells.
//!
//! Scrolling follows native trackpad semantics: during an interactive gesture
//! the offset may run past either bound with resistance, and snaps back into
//! range when the gesture ends.

use std::ops::Range;

use unicode_width::UnicodeWidthChar;

use crate::config::ScrollConfig;
use crate::input::ScrollPhase;
use crate::primitives::{Point, Size};

/// A cursor location: zero-based line and char column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// A cursor movement. Every motion clamps to the buffer bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMotion {
    /// Chars to the left, wrapping to the previous line end.
    Left(usize),
    /// Chars to the right, wrapping to the next line start.
    Right(usize),
    /// Lines up, keeping the preferred column.
    Up(usize),
    /// Lines down, keeping the preferred column.
    Down(usize),
    WordLeft,
    WordRight,
    LineStart,
    LineEnd,
    BufferStart,
    BufferEnd,
    To(Position),
}

/// Display columns a char occupies.
pub fn char_columns(ch: char, tab_width: usize) -> usize {
    if ch == '\t' {
        tab_width
    } else {
        UnicodeWidthChar::width(ch).unwrap_or(0)
    }
}

/// Editable text with cursor and scroll state.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    /// Never empty; an empty buffer is one empty line.
    lines: Vec<String>,
    cursor: Position,
    /// Column Up/Down try to return to.
    preferred_col: Option<usize>,
    scroll: Point,
    viewport: Size,
    cell_width: f32,
    line_height: f32,
    tab_width: usize,
    scroll_config: ScrollConfig,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new(4, ScrollConfig::default())
    }
}

impl TextBuffer {
    pub fn new(tab_width: usize, scroll_config: ScrollConfig) -> Self {
        Self {
            lines: vec![String::new()],
            cursor: Position::default(),
            preferred_col: None,
            scroll: Point::ORIGIN,
            viewport: Size::ZERO,
            cell_width: 0.0,
            line_height: 0.0,
            tab_width: tab_width.max(1),
            scroll_config,
        }
    }

    /// Create a buffer holding `text`, cursor at the start.
    pub fn with_text(text: &str) -> Self {
        let mut buffer = Self::default();
        buffer.insert(text);
        buffer.cursor = Position::default();
        buffer
    }

    // =====================================================================
    // Queries
    // =====================================================================

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Total chars, counting one per line break.
    pub fn char_count(&self) -> usize {
        self.lines.iter().map(|l| l.chars().count()).sum::<usize>() + self.lines.len() - 1
    }

    pub fn cursor(&self) -> Position {
        self.cursor
    }

    pub fn scroll_offset(&self) -> Point {
        self.scroll
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn tab_width(&self) -> usize {
        self.tab_width
    }

    fn line_len(&self, line: usize) -> usize {
        self.lines[line].chars().count()
    }

    /// Char offset of a position (line breaks count as one char).
    pub fn offset_of(&self, pos: Position) -> usize {
        let pos = self.clamp_position(pos);
        self.lines[..pos.line]
            .iter()
            .map(|l| l.chars().count() + 1)
            .sum::<usize>()
            + pos.col
    }

    /// Position of a char offset, clamped to the buffer end.
    pub fn position_of(&self, offset: usize) -> Position {
        let mut remaining = offset;
        for (line, text) in self.lines.iter().enumerate() {
            let len = text.chars().count();
            if remaining <= len {
                return Position::new(line, remaining);
            }
            remaining -= len + 1;
        }
        let last = self.lines.len() - 1;
        Position::new(last, self.line_len(last))
    }

    fn clamp_position(&self, pos: Position) -> Position {
        let line = pos.line.min(self.lines.len() - 1);
        Position::new(line, pos.col.min(self.line_len(line)))
    }

    /// Display columns from the line start to the cursor.
    pub fn cursor_display_col(&self) -> usize {
        self.lines[self.cursor.line]
            .chars()
            .take(self.cursor.col)
            .map(|ch| char_columns(ch, self.tab_width))
            .sum()
    }

    fn line_display_width(&self, line: &str) -> usize {
        line.chars().map(|ch| char_columns(ch, self.tab_width)).sum()
    }

    // =====================================================================
    // Editing
    // =====================================================================

    /// Insert text at the cursor. The cursor ends after the inserted text.
    pub fn insert(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let text = text.replace("\r\n", "\n").replace('\r', "\n");

        let Position { line, col } = self.cursor;
        let byte = char_to_byte(&self.lines[line], col);
        let tail = self.lines[line].split_off(byte);

        let mut segments = text.split('\n');
        if let Some(first) = segments.next() {
            self.lines[line].push_str(first);
        }
        let mut current = line;
        for segment in segments {
            current += 1;
            self.lines.insert(current, segment.to_string());
        }

        let col = self.line_len(current);
        self.lines[current].push_str(&tail);
        self.cursor = Position::new(current, col);
        self.preferred_col = None;
    }

    /// Split the line at the cursor.
    pub fn insert_newline(&mut self) {
        self.insert("\n");
    }

    /// Delete up to `count` chars before the cursor. Stops silently at the
    /// buffer start. Returns how many were deleted.
    pub fn delete_backward(&mut self, count: usize) -> usize {
        let mut deleted = 0;
        while deleted < count {
            let Position { line, col } = self.cursor;
            if col > 0 {
                let byte = char_to_byte(&self.lines[line], col - 1);
                self.lines[line].remove(byte);
                self.cursor.col -= 1;
            } else if line > 0 {
                let removed = self.lines.remove(line);
                let prev_len = self.line_len(line - 1);
                self.lines[line - 1].push_str(&removed);
                self.cursor = Position::new(line - 1, prev_len);
            } else {
                break;
            }
            deleted += 1;
        }
        self.preferred_col = None;
        deleted
    }

    /// Delete up to `count` chars after the cursor. Stops silently at the
    /// buffer end. Returns how many were deleted.
    pub fn delete_forward(&mut self, count: usize) -> usize {
        let mut deleted = 0;
        while deleted < count {
            let Position { line, col } = self.cursor;
            if col < self.line_len(line) {
                let byte = char_to_byte(&self.lines[line], col);
                self.lines[line].remove(byte);
            } else if line + 1 < self.lines.len() {
                let next = self.lines.remove(line + 1);
                self.lines[line].push_str(&next);
            } else {
                break;
            }
            deleted += 1;
        }
        self.preferred_col = None;
        deleted
    }

    /// Delete back to the previous word boundary (Alt+Backspace).
    pub fn delete_word_backward(&mut self) -> usize {
        let offset = self.offset_of(self.cursor);
        let chars: Vec<char> = self.text().chars().collect();
        let target = word_boundary_left(&chars, offset);
        self.delete_backward(offset - target)
    }

    /// Delete from the line start to the cursor (Cmd+Backspace).
    pub fn delete_to_line_start(&mut self) -> usize {
        self.delete_backward(self.cursor.col)
    }

    // =====================================================================
    // Cursor movement
    // =====================================================================

    pub fn move_cursor(&mut self, motion: CursorMotion) {
        match motion {
            CursorMotion::Up(n) => return self.move_vertical(-(n as isize)),
            CursorMotion::Down(n) => return self.move_vertical(n as isize),
            CursorMotion::Left(n) => {
                for _ in 0..n {
                    let Position { line, col } = self.cursor;
                    if col > 0 {
                        self.cursor.col -= 1;
                    } else if line > 0 {
                        self.cursor = Position::new(line - 1, self.line_len(line - 1));
                    } else {
                        break;
                    }
                }
            }
            CursorMotion::Right(n) => {
                for _ in 0..n {
                    let Position { line, col } = self.cursor;
                    if col < self.line_len(line) {
                        self.cursor.col += 1;
                    } else if line + 1 < self.lines.len() {
                        self.cursor = Position::new(line + 1, 0);
                    } else {
                        break;
                    }
                }
            }
            CursorMotion::WordLeft => {
                let chars: Vec<char> = self.text().chars().collect();
                let target = word_boundary_left(&chars, self.offset_of(self.cursor));
                self.cursor = self.position_of(target);
            }
            CursorMotion::WordRight => {
                let chars: Vec<char> = self.text().chars().collect();
                let target = word_boundary_right(&chars, self.offset_of(self.cursor));
                self.cursor = self.position_of(target);
            }
            CursorMotion::LineStart => self.cursor.col = 0,
            CursorMotion::LineEnd => self.cursor.col = self.line_len(self.cursor.line),
            CursorMotion::BufferStart => self.cursor = Position::default(),
            CursorMotion::BufferEnd => {
                let last = self.lines.len() - 1;
                self.cursor = Position::new(last, self.line_len(last));
            }
            CursorMotion::To(pos) => self.cursor = self.clamp_position(pos),
        }
        self.preferred_col = None;
    }

    fn move_vertical(&mut self, delta: isize) {
        let Position { line, col } = self.cursor;
        let last = self.lines.len() - 1;
        // Moving up from the first line or down from the last jumps to its edge.
        if delta < 0 && line == 0 {
            self.cursor.col = 0;
            self.preferred_col = None;
            return;
        }
        if delta > 0 && line == last {
            self.cursor.col = self.line_len(last);
            self.preferred_col = None;
            return;
        }

        let preferred = *self.preferred_col.get_or_insert(col);
        let target = line.saturating_add_signed(delta).min(last);
        self.cursor = Position::new(target, preferred.min(self.line_len(target)));
    }

    // =====================================================================
    // Geometry and scrolling
    // =====================================================================

    /// Set the monospace cell size used for extents.
    pub fn set_cell_metrics(&mut self, cell_width: f32, line_height: f32) {
        self.cell_width = cell_width.max(0.0);
        self.line_height = line_height.max(0.0);
        self.snap_back();
    }

    pub fn cell_metrics(&self) -> (f32, f32) {
        (self.cell_width, self.line_height)
    }

    /// Set the visible text area and re-clamp the scroll offset.
    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = Size::new(viewport.width.max(0.0), viewport.height.max(0.0));
        self.snap_back();
    }

    /// Size of the laid-out text in pixels.
    pub fn content_extent(&self) -> Size {
        let widest = self
            .lines
            .iter()
            .map(|l| self.line_display_width(l))
            .max()
            .unwrap_or(0);
        Size::new(
            widest as f32 * self.cell_width,
            self.lines.len() as f32 * self.line_height,
        )
    }

    /// Largest in-range scroll offset on each axis.
    pub fn max_scroll(&self) -> Point {
        let content = self.content_extent();
        Point::new(
            (content.width - self.viewport.width).max(0.0),
            (content.height - self.viewport.height).max(0.0),
        )
    }

    /// Apply a scroll delta. Negative `dy` moves content up (offset grows).
    ///
    /// Interactive phases allow damped overscroll; discrete and terminating
    /// phases clamp into range.
    pub fn scroll(&mut self, dx: f32, dy: f32, phase: ScrollPhase) {
        let max = self.max_scroll();
        let config = self.scroll_config;
        match phase {
            ScrollPhase::MayBegin => {}
            ScrollPhase::Began | ScrollPhase::Changed => {
                self.scroll.x = rubber_band(self.scroll.x, -dx, max.x, &config);
                self.scroll.y = rubber_band(self.scroll.y, -dy, max.y, &config);
            }
            ScrollPhase::Ended | ScrollPhase::Cancelled | ScrollPhase::None => {
                self.scroll.x = (self.scroll.x - dx).clamp(0.0, max.x);
                self.scroll.y = (self.scroll.y - dy).clamp(0.0, max.y);
            }
        }
    }

    /// Scroll by whole viewports (PageUp/PageDown). Positive pages move down.
    pub fn scroll_pages(&mut self, pages: f32) {
        let max = self.max_scroll();
        self.scroll.y = (self.scroll.y + pages * self.viewport.height).clamp(0.0, max.y);
    }

    /// Clamp the offset into range (rubber-band release).
    pub fn snap_back(&mut self) {
        let max = self.max_scroll();
        self.scroll.x = self.scroll.x.clamp(0.0, max.x);
        self.scroll.y = self.scroll.y.clamp(0.0, max.y);
    }

    /// True while the offset sits outside the valid range.
    pub fn is_overscrolled(&self) -> bool {
        let max = self.max_scroll();
        self.scroll.x < 0.0 || self.scroll.y < 0.0 || self.scroll.x > max.x || self.scroll.y > max.y
    }

    /// Move the offset the minimum needed for the cursor cell to be visible.
    pub fn scroll_cursor_into_view(&mut self) {
        if self.viewport.is_empty() {
            return;
        }
        let x = self.cursor_display_col() as f32 * self.cell_width;
        let y = self.cursor.line as f32 * self.line_height;

        if y < self.scroll.y {
            self.scroll.y = y;
        } else if y + self.line_height > self.scroll.y + self.viewport.height {
            self.scroll.y = y + self.line_height - self.viewport.height;
        }
        if x < self.scroll.x {
            self.scroll.x = x;
        } else if x + self.cell_width > self.scroll.x + self.viewport.width {
            self.scroll.x = x + self.cell_width - self.viewport.width;
        }
        self.snap_back();
    }

    /// Lines intersecting the viewport at the current offset.
    pub fn visible_lines(&self) -> Range<usize> {
        if self.line_height <= 0.0 || self.viewport.is_empty() {
            return 0..0;
        }
        let count = self.lines.len();
        let top = self.scroll.y.max(0.0);
        let bottom = self.scroll.y + self.viewport.height;
        if bottom <= 0.0 {
            return 0..0;
        }
        let first = ((top / self.line_height).floor() as usize).min(count);
        let last = ((bottom / self.line_height).ceil() as usize).min(count);
        first..last.max(first)
    }
}

/// Offset after moving by `delta` with overscroll resistance.
///
/// Movement further out of range is damped; movement back towards the range
/// is applied in full. The result never exceeds `max_overscroll` past a bound.
fn rubber_band(offset: f32, delta: f32, max: f32, config: &ScrollConfig) -> f32 {
    let resistance = config.overscroll_resistance;
    let next = if offset < 0.0 {
        if delta < 0.0 { offset + delta * resistance } else { offset + delta }
    } else if offset > max {
        if delta > 0.0 { offset + delta * resistance } else { offset + delta }
    } else {
        let target = offset + delta;
        if target > max {
            max + (target - max) * resistance
        } else if target < 0.0 {
            target * resistance
        } else {
            target
        }
    };
    next.clamp(-config.max_overscroll, max + config.max_overscroll)
}

/// Convert a char offset to a byte offset in the string.
fn char_to_byte(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Skip non-word chars, then word chars, moving left.
fn word_boundary_left(chars: &[char], pos: usize) -> usize {
    let mut i = pos.min(chars.len());
    while i > 0 && !is_word_char(chars[i - 1]) {
        i -= 1;
    }
    while i > 0 && is_word_char(chars[i - 1]) {
        i -= 1;
    }
    i
}

/// Skip word chars, then non-word chars, moving right.
fn word_boundary_right(chars: &[char], pos: usize) -> usize {
    let len = chars.len();
    let mut i = pos.min(len);
    while i < len && is_word_char(chars[i]) {
        i += 1;
    }
    while i < len && !is_word_char(chars[i]) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 10x10 px cells.
    fn sized(text: &str, viewport: Size) -> TextBuffer {
        let mut buffer = TextBuffer::with_text(text);
        buffer.set_cell_metrics(10.0, 10.0);
        buffer.set_viewport(viewport);
        buffer
    }

    #[test]
    fn insert_hello_into_empty_buffer() {
        let mut buffer = TextBuffer::default();
        buffer.insert("hello");
        assert_eq!(buffer.text(), "hello");
        assert_eq!(buffer.cursor(), Position::new(0, 5));
    }

    #[test]
    fn insert_splits_lines_and_normalizes_breaks() {
        let mut buffer = TextBuffer::with_text("ab");
        buffer.move_cursor(CursorMotion::Right(1));
        buffer.insert("1\r\n2\r3");
        assert_eq!(buffer.text(), "a1\n2\n3b");
        assert_eq!(buffer.line_count(), 3);
        assert_eq!(buffer.cursor(), Position::new(2, 1));
    }

    #[test]
    fn delete_backward_joins_lines_and_stops_at_start() {
        let mut buffer = TextBuffer::default();
        buffer.insert("ab\ncd");
        buffer.move_cursor(CursorMotion::To(Position::new(1, 0)));
        assert_eq!(buffer.delete_backward(1), 1);
        assert_eq!(buffer.text(), "abcd");
        assert_eq!(buffer.cursor(), Position::new(0, 2));

        assert_eq!(buffer.delete_backward(10), 2);
        assert_eq!(buffer.text(), "cd");
        assert_eq!(buffer.cursor(), Position::new(0, 0));
        assert_eq!(buffer.delete_backward(1), 0);
    }

    #[test]
    fn delete_forward_joins_lines_and_stops_at_end() {
        let mut buffer = TextBuffer::with_text("ab\ncd");
        buffer.move_cursor(CursorMotion::LineEnd);
        assert_eq!(buffer.delete_forward(2), 2);
        assert_eq!(buffer.text(), "abd");
        buffer.move_cursor(CursorMotion::BufferEnd);
        assert_eq!(buffer.delete_forward(1), 0);
    }

    #[test]
    fn multibyte_chars_edit_by_char() {
        let mut buffer = TextBuffer::default();
        buffer.insert("héllo→");
        assert_eq!(buffer.cursor(), Position::new(0, 6));
        buffer.delete_backward(1);
        buffer.move_cursor(CursorMotion::Left(3));
        buffer.delete_backward(1);
        assert_eq!(buffer.text(), "hllo");
    }

    #[test]
    fn left_right_wrap_across_lines() {
        let mut buffer = TextBuffer::with_text("ab\ncd");
        buffer.move_cursor(CursorMotion::Right(3));
        assert_eq!(buffer.cursor(), Position::new(1, 0));
        buffer.move_cursor(CursorMotion::Left(2));
        assert_eq!(buffer.cursor(), Position::new(0, 1));
        buffer.move_cursor(CursorMotion::Left(10));
        assert_eq!(buffer.cursor(), Position::new(0, 0));
        buffer.move_cursor(CursorMotion::Right(100));
        assert_eq!(buffer.cursor(), Position::new(1, 2));
    }

    #[test]
    fn vertical_motion_keeps_preferred_column() {
        let mut buffer = TextBuffer::with_text("hello\nhi\nworld");
        buffer.move_cursor(CursorMotion::To(Position::new(0, 4)));
        buffer.move_cursor(CursorMotion::Down(1));
        assert_eq!(buffer.cursor(), Position::new(1, 2));
        buffer.move_cursor(CursorMotion::Down(1));
        assert_eq!(buffer.cursor(), Position::new(2, 4));
        buffer.move_cursor(CursorMotion::Down(1));
        assert_eq!(buffer.cursor(), Position::new(2, 5));
        buffer.move_cursor(CursorMotion::Up(5));
        assert_eq!(buffer.cursor(), Position::new(0, 5));
        buffer.move_cursor(CursorMotion::Up(1));
        assert_eq!(buffer.cursor(), Position::new(0, 0));
    }

    #[test]
    fn word_motion_and_deletion() {
        let mut buffer = TextBuffer::with_text("foo_bar baz.qux");
        buffer.move_cursor(CursorMotion::WordRight);
        assert_eq!(buffer.cursor(), Position::new(0, 8));
        buffer.move_cursor(CursorMotion::BufferEnd);
        buffer.move_cursor(CursorMotion::WordLeft);
        assert_eq!(buffer.cursor(), Position::new(0, 12));

        buffer.move_cursor(CursorMotion::LineEnd);
        buffer.delete_word_backward();
        assert_eq!(buffer.text(), "foo_bar baz.");
        buffer.delete_to_line_start();
        assert_eq!(buffer.text(), "");
    }

    #[test]
    fn offsets_round_trip_through_positions() {
        let buffer = TextBuffer::with_text("ab\n\ncde");
        assert_eq!(buffer.char_count(), 7);
        assert_eq!(buffer.offset_of(Position::new(2, 1)), 5);
        assert_eq!(buffer.position_of(5), Position::new(2, 1));
        assert_eq!(buffer.position_of(3), Position::new(1, 0));
        assert_eq!(buffer.position_of(100), Position::new(2, 3));
        assert_eq!(buffer.offset_of(Position::new(9, 9)), 7);
    }

    /// Replays random inserts and deletes against a plain `String` model.
    #[test]
    fn edits_match_plain_text_model() {
        const ALPHABET: &[&str] = &["a", "b", "é", " ", "\n", "xy", "\n\n", "→z"];
        let mut seed = 0x9e37_79b9_u64;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as usize
        };

        for _ in 0..20 {
            let mut buffer = TextBuffer::default();
            let mut model: Vec<char> = Vec::new();
            let mut cursor = 0usize;

            for _ in 0..200 {
                match next() % 4 {
                    0 | 1 => {
                        let s = ALPHABET[next() % ALPHABET.len()];
                        buffer.insert(s);
                        for (i, ch) in s.chars().enumerate() {
                            model.insert(cursor + i, ch);
                        }
                        cursor += s.chars().count();
                    }
                    2 => {
                        let n = next() % 4;
                        buffer.delete_backward(n);
                        let n = n.min(cursor);
                        model.drain(cursor - n..cursor);
                        cursor -= n;
                    }
                    _ => {
                        let target = next() % (model.len() + 1);
                        buffer.move_cursor(CursorMotion::To(buffer.position_of(target)));
                        cursor = target;
                    }
                }
                assert_eq!(buffer.text(), model.iter().collect::<String>());
                assert_eq!(buffer.offset_of(buffer.cursor()), cursor);
            }
        }
    }

    #[test]
    fn content_extent_counts_display_columns() {
        let buffer = sized("ab\tc\n中文", Size::new(100.0, 100.0));
        // "ab" + tab(4) + "c" = 7 columns; "中文" = 4 columns.
        assert_eq!(buffer.content_extent(), Size::new(70.0, 20.0));
    }

    #[test]
    fn scroll_began_then_ended_snaps_back() {
        let text = (0..10).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let mut buffer = sized(&text, Size::new(80.0, 80.0));
        assert_eq!(buffer.content_extent().height, 100.0);

        buffer.scroll(0.0, -50.0, ScrollPhase::Began);
        assert!(buffer.is_overscrolled());
        assert!(buffer.scroll_offset().y > 20.0);

        buffer.scroll(0.0, 0.0, ScrollPhase::Ended);
        assert_eq!(buffer.scroll_offset().y, 20.0);
    }

    #[test]
    fn overscroll_is_damped_and_capped() {
        let mut buffer = sized("a\nb", Size::new(80.0, 80.0));
        buffer.scroll(0.0, 40.0, ScrollPhase::Began);
        assert_eq!(buffer.scroll_offset().y, -20.0);
        buffer.scroll(0.0, 10_000.0, ScrollPhase::Changed);
        assert_eq!(buffer.scroll_offset().y, -120.0);
        // Moving back in is undamped.
        buffer.scroll(0.0, -100.0, ScrollPhase::Changed);
        assert_eq!(buffer.scroll_offset().y, -20.0);
        buffer.scroll(0.0, 0.0, ScrollPhase::Cancelled);
        assert_eq!(buffer.scroll_offset().y, 0.0);
    }

    #[test]
    fn ended_phase_always_lands_in_range() {
        let text = "line\n".repeat(40);
        let mut seed = 7u32;
        for _ in 0..50 {
            let mut buffer = sized(&text, Size::new(30.0, 80.0));
            buffer.scroll(0.0, 0.0, ScrollPhase::Began);
            for _ in 0..20 {
                seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
                let dy = ((seed >> 16) % 400) as f32 - 200.0;
                let dx = ((seed >> 8) % 60) as f32 - 30.0;
                buffer.scroll(dx, dy, ScrollPhase::Changed);
            }
            buffer.scroll(0.0, 0.0, ScrollPhase::Ended);
            let max = buffer.max_scroll();
            let offset = buffer.scroll_offset();
            assert!((0.0..=max.y).contains(&offset.y), "{offset:?} vs {max:?}");
            assert!((0.0..=max.x).contains(&offset.x), "{offset:?} vs {max:?}");
        }
    }

    #[test]
    fn discrete_scroll_clamps_immediately() {
        let text = "x\n".repeat(20);
        let mut buffer = sized(&text, Size::new(50.0, 50.0));
        buffer.scroll(0.0, -1000.0, ScrollPhase::None);
        assert_eq!(buffer.scroll_offset().y, buffer.max_scroll().y);
        buffer.scroll(0.0, 1000.0, ScrollPhase::None);
        assert_eq!(buffer.scroll_offset().y, 0.0);
        buffer.scroll(0.0, -30.0, ScrollPhase::MayBegin);
        assert_eq!(buffer.scroll_offset().y, 0.0);
    }

    #[test]
    fn visible_lines_follow_offset() {
        let text = "x\n".repeat(20);
        let mut buffer = sized(&text, Size::new(50.0, 45.0));
        assert_eq!(buffer.visible_lines(), 0..5);
        buffer.scroll(0.0, -25.0, ScrollPhase::None);
        assert_eq!(buffer.visible_lines(), 2..7);
        buffer.set_viewport(Size::ZERO);
        assert_eq!(buffer.visible_lines(), 0..0);
    }

    #[test]
    fn cursor_is_scrolled_into_view() {
        let text = "0123456789\n".repeat(20);
        let mut buffer = sized(&text, Size::new(50.0, 50.0));
        buffer.move_cursor(CursorMotion::To(Position::new(12, 8)));
        buffer.scroll_cursor_into_view();
        assert_eq!(buffer.scroll_offset(), Point::new(40.0, 80.0));

        buffer.move_cursor(CursorMotion::BufferStart);
        buffer.scroll_cursor_into_view();
        assert_eq!(buffer.scroll_offset(), Point::ORIGIN);
    }

    #[test]
    fn shrinking_content_reclamps_on_viewport_change() {
        let text = "x\n".repeat(20);
        let mut buffer = sized(&text, Size::new(50.0, 50.0));
        buffer.scroll(0.0, -1000.0, ScrollPhase::None);
        buffer.set_viewport(Size::new(50.0, 500.0));
        assert_eq!(buffer.scroll_offset().y, 0.0);
    }

    #[test]
    fn page_scroll_moves_one_viewport() {
        let text = "x\n".repeat(40);
        let mut buffer = sized(&text, Size::new(50.0, 100.0));
        buffer.scroll_pages(1.0);
        assert_eq!(buffer.scroll_offset().y, 100.0);
        buffer.scroll_pages(-3.0);
        assert_eq!(buffer.scroll_offset().y, 0.0);
    }
}
