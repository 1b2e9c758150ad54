// SPDX-License-Identifier: MIT
//
// tilde-term — Terminal engine for tilde.
//
// Everything that touches the terminal device lives here: raw mode via
// termios, byte-at-a-time key decoding, window geometry, and the frame
// buffer that turns a whole repaint into a single write. The editor crate
// above only ever sees `KeyEvent`s, a `Size`, and a `RenderBuffer`.
//
// Like the rest of the workspace, this crate talks to the terminal with
// literal ANSI sequences and raw termios. No TUI framework sits in between.

pub mod ansi;
pub mod error;
pub mod geometry;
pub mod input;
pub mod output;

#[cfg(unix)]
pub mod terminal;

pub use error::{Error, GeometryError, Result};
