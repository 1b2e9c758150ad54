// SPDX-License-Identifier: MIT
//
// Error taxonomy for terminal operations.
//
// Every variant is fatal to a session: the caller clears the screen,
// restores the terminal, and exits nonzero. Read timeouts are not errors
// and never show up here; the key decoder consumes them.
//
// Messages name only the failing step. The underlying error is the
// `source`, so chain printers such as `{:#}` show it exactly once.

use std::io;

use thiserror::Error;

/// Failure of a terminal operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Capturing the terminal attributes (`tcgetattr`) failed.
    #[error("tcgetattr")]
    TerminalQuery(#[source] io::Error),

    /// Applying or restoring terminal attributes (`tcsetattr`) failed.
    #[error("tcsetattr")]
    TerminalConfig(#[source] io::Error),

    /// Raw mode is already held by another guard in this process.
    #[error("raw mode is already active in this process")]
    RawModeActive,

    /// A genuine read failure on the input stream.
    #[error("read")]
    Input(#[source] io::Error),

    /// Neither the window-size query nor the cursor probe produced a size.
    #[error("window size")]
    Geometry(#[from] GeometryError),

    /// Writing a frame or control sequence failed.
    #[error("write")]
    Output(#[source] io::Error),
}

/// Why the cursor-position probe could not determine the window size.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("cursor probe write failed")]
    ProbeWrite(#[source] io::Error),

    #[error("cursor probe read failed")]
    ProbeRead(#[source] io::Error),

    #[error("no cursor position report before the read timeout")]
    NoReport,

    #[error("cursor position report longer than {0} bytes")]
    ReportTooLong(usize),

    #[error("malformed cursor position report")]
    Malformed,

    #[error("terminal reported a zero-sized window")]
    ZeroSize,
}

pub type Result<T> = std::result::Result<T, Error>;
