//! Session loop — paint, read one key, dispatch, repeat.
//!
//! A `Session` owns everything one editing session needs: the cursor
//! state, the painter, the frame buffer, and the input and output streams.
//! Nothing is global, so tests can run any number of sessions over scripted
//! input and in-memory output.
//!
//! ```text
//!   start ──► Running ──(quit key)──► Terminating ──► Ok(())
//!                │                        ▲
//!                └──(fatal error)─────────┘ (caller clears the screen)
//! ```
//!
//! Raw mode is not the session's business: the caller acquires it before
//! [`Session::start`] and releases it after [`Session::run`] returns.

use std::io::{self, Write};

use tracing::{debug, info};

use tilde_term::ansi;
use tilde_term::error::{Error, Result};
use tilde_term::geometry::{self, Size};
use tilde_term::input::{ByteSource, KeyDecoder, KeyEvent};
use tilde_term::output::RenderBuffer;

use crate::config::EditorConfig;
use crate::painter::Painter;
use crate::state::EditorState;

/// What the session does after handling a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Keep running.
    Continue,
    /// Leave the loop.
    Quit,
}

/// Write the teardown sequence: clear the screen and home the cursor.
///
/// Used on quit and, by the caller, on the fatal-error path.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_teardown(out: &mut impl Write) -> io::Result<()> {
    let mut buf = RenderBuffer::new();
    ansi::clear_screen(&mut buf).ok();
    ansi::cursor_home(&mut buf).ok();
    buf.flush_to(out).map(|_| ())
}

/// One editing session over an input source and an output stream.
pub struct Session<I, W> {
    config: EditorConfig,
    state: EditorState,
    painter: Painter,
    decoder: KeyDecoder,
    frame: RenderBuffer,
    input: I,
    output: W,
}

impl<I: ByteSource, W: Write> Session<I, W> {
    /// Resolve the window size and set up a session with the cursor at the
    /// origin.
    ///
    /// `query` is the direct window-size query; when it yields nothing the
    /// cursor probe runs over `output` and `input`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Geometry`] if the size cannot be determined.
    pub fn start<Q>(config: EditorConfig, query: Q, mut input: I, mut output: W) -> Result<Self>
    where
        Q: FnOnce() -> Option<Size>,
    {
        let size = geometry::resolve(query, &mut output, &mut input)?;
        info!(rows = size.rows, cols = size.cols, "session started");

        Ok(Self {
            painter: Painter::new(&config),
            config,
            state: EditorState::new(size),
            decoder: KeyDecoder::new(),
            frame: RenderBuffer::new(),
            input,
            output,
        })
    }

    /// Current cursor and viewport.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> &EditorState {
        &self.state
    }

    /// The output stream.
    #[inline]
    #[must_use]
    pub const fn output(&self) -> &W {
        &self.output
    }

    /// Run until the quit key, then clear the screen.
    ///
    /// # Errors
    ///
    /// Any read, write, or decode failure ends the loop with that error.
    /// The screen is left as-is; clearing it is the caller's job then.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.refresh_screen()?;
            if self.process_keypress()? == Action::Quit {
                break;
            }
        }

        info!("quit requested");
        write_teardown(&mut self.output).map_err(Error::Output)
    }

    /// Paint one frame and write it in a single operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Output`] if the write fails.
    pub fn refresh_screen(&mut self) -> Result<()> {
        self.painter.paint(&self.state, &mut self.frame);
        self.frame.flush_to(&mut self.output).map_err(Error::Output)?;
        Ok(())
    }

    /// Block for one key and handle it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] on a read failure.
    pub fn process_keypress(&mut self) -> Result<Action> {
        let key = self.decoder.next_key(&mut self.input)?;
        Ok(self.dispatch(key))
    }

    /// Handle one decoded key.
    pub fn dispatch(&mut self, key: KeyEvent) -> Action {
        match key {
            KeyEvent::PlainByte(b) if b == self.config.quit_key => Action::Quit,
            _ => {
                if self.state.move_cursor(key) {
                    debug!(cx = self.state.cx(), cy = self.state.cy(), "cursor moved");
                }
                Action::Continue
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
