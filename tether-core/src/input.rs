//! Input State Machine
//!
//! Translates host keyboard and scroll events into buffer edits, cursor
//! motion and scroll updates, and tracks whether a new frame is needed.
//!
//! States: `Idle` and `ScrollInProgress`. A `Began` scroll phase enters
//! `ScrollInProgress`, `Changed` updates the offset (overscroll allowed), and
//! `Ended`/`Cancelled` return to `Idle` with the offset snapped back into
//! range. Key events are handled the same way in either state.

use crate::buffer::{CursorMotion, TextBuffer};

/// Phase of a scroll event, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollPhase {
    /// Discrete wheel event with no gesture.
    #[default]
    None,
    /// Fingers touched the trackpad; a gesture may follow.
    MayBegin,
    Began,
    Changed,
    Ended,
    Cancelled,
}

impl ScrollPhase {
    /// Decode an `NSEventPhase` bitmask.
    pub fn from_ns_event_phase(bits: u64) -> Self {
        const BEGAN: u64 = 1 << 0;
        const STATIONARY: u64 = 1 << 1;
        const CHANGED: u64 = 1 << 2;
        const ENDED: u64 = 1 << 3;
        const CANCELLED: u64 = 1 << 4;
        const MAY_BEGIN: u64 = 1 << 5;

        if bits & BEGAN != 0 {
            Self::Began
        } else if bits & (CHANGED | STATIONARY) != 0 {
            Self::Changed
        } else if bits & ENDED != 0 {
            Self::Ended
        } else if bits & CANCELLED != 0 {
            Self::Cancelled
        } else if bits & MAY_BEGIN != 0 {
            Self::MayBegin
        } else {
            Self::None
        }
    }

    /// Whether the phase closes a gesture.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Cancelled)
    }
}

/// Scroll gesture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputState {
    #[default]
    Idle,
    ScrollInProgress,
}

/// Keyboard modifier keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool, // Command on macOS
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Self = Self {
        shift: true,
        ..Self::NONE
    };

    pub const CTRL: Self = Self {
        ctrl: true,
        ..Self::NONE
    };

    pub const ALT: Self = Self {
        alt: true,
        ..Self::NONE
    };

    pub const META: Self = Self {
        meta: true,
        ..Self::NONE
    };
}

/// Keys with no text of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    PageUp,
    PageDown,
    Backspace,
    Delete,
    Enter,
    Tab,
    Escape,
    Space,
}

/// A keyboard key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Named(NamedKey),
    /// A character key, by its unmodified character.
    Character(String),
    /// A key the translator does not know, by platform key code.
    Unidentified(u16),
}

/// A key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
    /// The text produced by the key press (OS-level, handles shift/compose/dead keys).
    pub text: Option<String>,
}

/// Read-only view of a host key event.
///
/// Hosts wrap their native event object in a type implementing this trait;
/// the renderer never retains it.
pub trait PlatformKeyEvent {
    /// Hardware key code (macOS virtual key code).
    fn key_code(&self) -> u16;

    fn modifiers(&self) -> Modifiers;

    /// Text produced with modifiers applied.
    fn characters(&self) -> Option<&str>;

    /// Text produced ignoring modifiers other than shift.
    fn characters_ignoring_modifiers(&self) -> Option<&str> {
        self.characters()
    }
}

/// macOS virtual key codes.
mod keycode {
    pub const RETURN: u16 = 36;
    pub const TAB: u16 = 48;
    pub const SPACE: u16 = 49;
    pub const DELETE: u16 = 51;
    pub const ESCAPE: u16 = 53;
    pub const KEYPAD_ENTER: u16 = 76;
    pub const HOME: u16 = 115;
    pub const PAGE_UP: u16 = 116;
    pub const FORWARD_DELETE: u16 = 117;
    pub const END: u16 = 119;
    pub const PAGE_DOWN: u16 = 121;
    pub const LEFT: u16 = 123;
    pub const RIGHT: u16 = 124;
    pub const DOWN: u16 = 125;
    pub const UP: u16 = 126;
}

impl KeyEvent {
    pub fn new(key: Key, modifiers: Modifiers, text: Option<String>) -> Self {
        Self {
            key,
            modifiers,
            text,
        }
    }

    /// A named key press with no text.
    pub fn named(key: NamedKey, modifiers: Modifiers) -> Self {
        Self::new(Key::Named(key), modifiers, None)
    }

    /// A character key press producing the same text.
    pub fn character(text: &str, modifiers: Modifiers) -> Self {
        Self::new(
            Key::Character(text.to_string()),
            modifiers,
            Some(text.to_string()),
        )
    }

    /// Translate a host event.
    pub fn from_platform<E: PlatformKeyEvent + ?Sized>(event: &E) -> Self {
        let named = match event.key_code() {
            keycode::RETURN | keycode::KEYPAD_ENTER => Some(NamedKey::Enter),
            keycode::TAB => Some(NamedKey::Tab),
            keycode::SPACE => Some(NamedKey::Space),
            keycode::DELETE => Some(NamedKey::Backspace),
            keycode::FORWARD_DELETE => Some(NamedKey::Delete),
            keycode::ESCAPE => Some(NamedKey::Escape),
            keycode::HOME => Some(NamedKey::Home),
            keycode::END => Some(NamedKey::End),
            keycode::PAGE_UP => Some(NamedKey::PageUp),
            keycode::PAGE_DOWN => Some(NamedKey::PageDown),
            keycode::LEFT => Some(NamedKey::ArrowLeft),
            keycode::RIGHT => Some(NamedKey::ArrowRight),
            keycode::DOWN => Some(NamedKey::ArrowDown),
            keycode::UP => Some(NamedKey::ArrowUp),
            _ => None,
        };

        let key = match named {
            Some(named) => Key::Named(named),
            None => match event.characters_ignoring_modifiers() {
                Some(chars) if !chars.is_empty() => Key::Character(chars.to_lowercase()),
                _ => Key::Unidentified(event.key_code()),
            },
        };

        Self {
            key,
            modifiers: event.modifiers(),
            text: event.characters().map(str::to_string),
        }
    }
}

/// What a key press does to the buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyAction {
    Insert(String),
    DeleteBackward,
    DeleteForward,
    DeleteWordBackward,
    DeleteToLineStart,
    Move(CursorMotion),
    /// Scroll by whole viewports; positive moves down.
    ScrollPage(f32),
    Ignored,
}

impl KeyAction {
    /// Map a key press to an action. Unknown keys map to `Ignored`.
    pub fn from_event(event: &KeyEvent) -> Self {
        let KeyEvent {
            key,
            modifiers,
            text,
        } = event;
        let cmd = modifiers.meta;
        let ctrl = modifiers.ctrl;
        let alt = modifiers.alt;

        // Ctrl+key: readline line navigation
        if ctrl && !cmd {
            match key {
                Key::Character(c) if c == "a" => return Self::Move(CursorMotion::LineStart),
                Key::Character(c) if c == "e" => return Self::Move(CursorMotion::LineEnd),
                _ => {}
            }
        }

        // Alt+key: word-level navigation and deletion
        if alt && !cmd && !ctrl {
            match key {
                Key::Named(NamedKey::Backspace) => return Self::DeleteWordBackward,
                Key::Named(NamedKey::ArrowLeft) => return Self::Move(CursorMotion::WordLeft),
                Key::Named(NamedKey::ArrowRight) => return Self::Move(CursorMotion::WordRight),
                _ => {}
            }
        }

        // Cmd+Arrow: macOS line/document jump
        if cmd && !ctrl {
            match key {
                Key::Named(NamedKey::ArrowLeft) => return Self::Move(CursorMotion::LineStart),
                Key::Named(NamedKey::ArrowRight) => return Self::Move(CursorMotion::LineEnd),
                Key::Named(NamedKey::ArrowUp) => return Self::Move(CursorMotion::BufferStart),
                Key::Named(NamedKey::ArrowDown) => return Self::Move(CursorMotion::BufferEnd),
                Key::Named(NamedKey::Backspace) => return Self::DeleteToLineStart,
                _ => {}
            }
        }

        let cmd_or_ctrl = cmd || ctrl;

        match (key, cmd_or_ctrl) {
            (Key::Named(NamedKey::Escape), _) => Self::Ignored,
            (Key::Named(NamedKey::Enter), false) => Self::Insert("\n".into()),
            (Key::Named(NamedKey::Tab), false) => Self::Insert("\t".into()),
            (Key::Named(NamedKey::Backspace), false) => Self::DeleteBackward,
            (Key::Named(NamedKey::Delete), false) => Self::DeleteForward,
            (Key::Named(NamedKey::ArrowLeft), _) => Self::Move(CursorMotion::Left(1)),
            (Key::Named(NamedKey::ArrowRight), _) => Self::Move(CursorMotion::Right(1)),
            (Key::Named(NamedKey::ArrowUp), _) => Self::Move(CursorMotion::Up(1)),
            (Key::Named(NamedKey::ArrowDown), _) => Self::Move(CursorMotion::Down(1)),
            (Key::Named(NamedKey::Home), _) => Self::Move(CursorMotion::LineStart),
            (Key::Named(NamedKey::End), _) => Self::Move(CursorMotion::LineEnd),
            (Key::Named(NamedKey::PageUp), _) => Self::ScrollPage(-1.0),
            (Key::Named(NamedKey::PageDown), _) => Self::ScrollPage(1.0),
            // Use OS-provided text for insertion (handles shift, compose, dead keys)
            (Key::Character(_), false) | (Key::Named(NamedKey::Space), false) => {
                let produced = match (text.as_deref(), key) {
                    (Some(t), _) if !t.is_empty() => t,
                    (_, Key::Character(c)) => c.as_str(),
                    _ => " ",
                };
                if produced.chars().any(char::is_control) || produced.chars().any(is_private_use) {
                    Self::Ignored
                } else {
                    Self::Insert(produced.to_string())
                }
            }
            _ => Self::Ignored,
        }
    }
}

/// AppKit reports function keys as private-use characters.
fn is_private_use(ch: char) -> bool {
    ('\u{E000}'..='\u{F8FF}').contains(&ch)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingScroll {
    dx: f32,
    dy: f32,
    phase: ScrollPhase,
}

/// Routes input to the buffer and owns the redraw flag.
#[derive(Debug, Clone)]
pub struct InputStateMachine {
    state: InputState,
    needs_redraw: bool,
    /// Coalesced deltas, one entry per gesture segment, oldest first.
    pending: Vec<PendingScroll>,
    /// Pixels per line for line-based wheel deltas.
    line_height_px: f32,
}

impl Default for InputStateMachine {
    fn default() -> Self {
        Self::new(40.0)
    }
}

impl InputStateMachine {
    pub fn new(line_height_px: f32) -> Self {
        Self {
            state: InputState::Idle,
            // The first frame is always drawn.
            needs_redraw: true,
            pending: Vec::new(),
            line_height_px,
        }
    }

    pub fn state(&self) -> InputState {
        self.state
    }

    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    pub fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }

    /// Read and clear the redraw flag.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    /// Apply a key press to the buffer. Returns the action taken.
    pub fn handle_keydown(&mut self, event: &KeyEvent, buffer: &mut TextBuffer) -> KeyAction {
        let action = KeyAction::from_event(event);
        if action == KeyAction::Ignored {
            tracing::trace!("Ignored key {:?}", event.key);
            return action;
        }
        match &action {
            KeyAction::Insert(text) => buffer.insert(text),
            KeyAction::DeleteBackward => {
                buffer.delete_backward(1);
            }
            KeyAction::DeleteForward => {
                buffer.delete_forward(1);
            }
            KeyAction::DeleteWordBackward => {
                buffer.delete_word_backward();
            }
            KeyAction::DeleteToLineStart => {
                buffer.delete_to_line_start();
            }
            KeyAction::Move(motion) => buffer.move_cursor(*motion),
            KeyAction::ScrollPage(pages) => buffer.scroll_pages(*pages),
            KeyAction::Ignored => {}
        }
        if !matches!(action, KeyAction::ScrollPage(_)) {
            buffer.scroll_cursor_into_view();
        }
        self.needs_redraw = true;
        action
    }

    /// Apply a pixel scroll delta immediately.
    pub fn handle_scroll(&mut self, dx: f32, dy: f32, phase: ScrollPhase, buffer: &mut TextBuffer) {
        match phase {
            ScrollPhase::MayBegin => return,
            ScrollPhase::Began => {
                self.state = InputState::ScrollInProgress;
            }
            ScrollPhase::Changed => {
                if self.state == InputState::Idle {
                    tracing::debug!("Scroll changed without began; starting gesture");
                    self.state = InputState::ScrollInProgress;
                }
            }
            ScrollPhase::Ended | ScrollPhase::Cancelled => {
                self.state = InputState::Idle;
            }
            ScrollPhase::None => {}
        }
        buffer.scroll(dx, dy, phase);
        self.needs_redraw = true;
    }

    /// Apply a wheel delta measured in lines.
    pub fn handle_scroll_lines(&mut self, dx: f32, dy: f32, buffer: &mut TextBuffer) {
        let scale = self.line_height_px;
        self.handle_scroll(dx * scale, dy * scale, ScrollPhase::None, buffer);
    }

    /// Queue a scroll delta to apply on the next frame.
    ///
    /// Deltas are summed and the most recent phase wins, except that a
    /// gesture end is never overwritten: a gesture starting after a queued
    /// `Ended`/`Cancelled` is queued separately, and `MayBegin` is dropped.
    pub fn accumulate_scroll(&mut self, dx: f32, dy: f32, phase: ScrollPhase) {
        if phase == ScrollPhase::MayBegin {
            return;
        }
        let same_gesture = self
            .pending
            .last()
            .is_some_and(|last| !last.phase.is_terminal() || phase.is_terminal());
        match self.pending.last_mut() {
            Some(last) if same_gesture => {
                last.dx += dx;
                last.dy += dy;
                last.phase = phase;
            }
            _ => self.pending.push(PendingScroll { dx, dy, phase }),
        }
        self.needs_redraw = true;
    }

    /// Apply queued scroll deltas in order. Returns whether anything was
    /// pending.
    pub fn flush_scroll(&mut self, buffer: &mut TextBuffer) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let mut pending = std::mem::take(&mut self.pending);
        for PendingScroll { dx, dy, phase } in pending.drain(..) {
            self.handle_scroll(dx, dy, phase, buffer);
        }
        self.pending = pending;
        true
    }
}
