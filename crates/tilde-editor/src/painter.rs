//! Screen painter — composes one frame into a `RenderBuffer`.
//!
//! Frame layout, in output order:
//!
//! 1. hide cursor, cursor home
//! 2. one line per viewport row: the row marker (or the centered banner on
//!    row `rows / 3`), erase to end of line, `\r\n` between rows
//! 3. cursor to `(cx, cy)`, show cursor
//!
//! Hiding the cursor while drawing keeps it from flickering across the
//! screen; every row is erased after drawing so nothing from an older frame
//! survives. Output post-processing is off in raw mode, hence the explicit
//! `\r\n`.

use tilde_term::ansi;
use tilde_term::output::RenderBuffer;

use crate::config::EditorConfig;
use crate::state::EditorState;

/// Draws the placeholder view.
#[derive(Debug, Clone)]
pub struct Painter {
    banner: String,
    row_marker: u8,
}

impl Painter {
    #[must_use]
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            banner: config.banner(),
            row_marker: config.row_marker,
        }
    }

    /// Replace the contents of `buf` with a full frame for `state`.
    pub fn paint(&self, state: &EditorState, buf: &mut RenderBuffer) {
        buf.reset();
        ansi::cursor_hide(buf).ok();
        ansi::cursor_home(buf).ok();

        self.draw_rows(state, buf);

        ansi::cursor_to(buf, state.cx(), state.cy()).ok();
        ansi::cursor_show(buf).ok();
    }

    fn draw_rows(&self, state: &EditorState, buf: &mut RenderBuffer) {
        let rows = state.rows();
        let banner_row = rows / 3;

        for y in 0..rows {
            if y == banner_row {
                self.draw_banner(usize::from(state.cols()), buf);
            } else {
                buf.append(&[self.row_marker]);
            }

            ansi::clear_line(buf).ok();
            if y + 1 < rows {
                buf.append(b"\r\n");
            }
        }
    }

    /// The banner, cut to `cols` bytes and centered. The left padding starts
    /// with the row marker so the marker column stays unbroken.
    fn draw_banner(&self, cols: usize, buf: &mut RenderBuffer) {
        let banner = self.banner.as_bytes();
        let banner = &banner[..banner.len().min(cols)];

        let mut padding = (cols - banner.len()) / 2;
        if padding > 0 {
            buf.append(&[self.row_marker]);
            padding -= 1;
        }
        buf.append(&b" ".repeat(padding));
        buf.append(banner);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
