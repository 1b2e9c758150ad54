//! Editor state — cursor position inside the viewport.
//!
//! The cursor lives in screen coordinates: `cx` is the column, `cy` the row,
//! both 0-indexed. Every motion clamps, so `cx < cols` and `cy < rows` hold
//! after any sequence of keys. The viewport never changes after the session
//! resolves it.

use tilde_term::geometry::Size;
use tilde_term::input::KeyEvent;

/// Cursor and viewport for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorState {
    cx: u16,
    cy: u16,
    size: Size,
}

impl EditorState {
    /// Cursor at the origin of a `size` viewport.
    ///
    /// `size` must have at least one row and one column; the geometry
    /// resolver never produces anything smaller.
    #[must_use]
    pub fn new(size: Size) -> Self {
        debug_assert!(size.rows > 0 && size.cols > 0, "empty viewport {size:?}");
        Self { cx: 0, cy: 0, size }
    }

    /// Cursor column.
    #[inline]
    #[must_use]
    pub const fn cx(&self) -> u16 {
        self.cx
    }

    /// Cursor row.
    #[inline]
    #[must_use]
    pub const fn cy(&self) -> u16 {
        self.cy
    }

    /// Viewport height.
    #[inline]
    #[must_use]
    pub const fn rows(&self) -> u16 {
        self.size.rows
    }

    /// Viewport width.
    #[inline]
    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.size.cols
    }

    const fn last_row(&self) -> u16 {
        self.size.rows.saturating_sub(1)
    }

    const fn last_col(&self) -> u16 {
        self.size.cols.saturating_sub(1)
    }

    /// Move `count` columns left, stopping at column 0.
    pub const fn move_left(&mut self, count: u16) {
        self.cx = self.cx.saturating_sub(count);
    }

    /// Move `count` columns right, stopping at the last column.
    pub fn move_right(&mut self, count: u16) {
        self.cx = self.cx.saturating_add(count).min(self.last_col());
    }

    /// Move `count` rows up, stopping at row 0.
    pub const fn move_up(&mut self, count: u16) {
        self.cy = self.cy.saturating_sub(count);
    }

    /// Move `count` rows down, stopping at the last row.
    pub fn move_down(&mut self, count: u16) {
        self.cy = self.cy.saturating_add(count).min(self.last_row());
    }

    /// Apply a navigation key. Page keys move a full screen height.
    ///
    /// Returns `false` (and leaves the cursor alone) for keys that are not
    /// cursor motions.
    pub fn move_cursor(&mut self, key: KeyEvent) -> bool {
        match key {
            KeyEvent::ArrowLeft => self.move_left(1),
            KeyEvent::ArrowRight => self.move_right(1),
            KeyEvent::ArrowUp => self.move_up(1),
            KeyEvent::ArrowDown => self.move_down(1),
            KeyEvent::PageUp => self.move_up(self.size.rows),
            KeyEvent::PageDown => self.move_down(self.size.rows),
            KeyEvent::Home => self.cx = 0,
            KeyEvent::End => self.cx = self.last_col(),
            KeyEvent::PlainByte(_) | KeyEvent::Delete | KeyEvent::Escape => return false,
        }
        true
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
