// SPDX-License-Identifier: MIT
//
// tilde — a minimal full-screen terminal editor.
//
// This binary wires the two crates together and owns the process-level
// concerns:
//
//   tilde-term   → raw mode, key decoding, geometry, frame output
//   tilde-editor → cursor state, painter, session loop
//
// Lifetime of a run:
//
//   enable raw mode ─► start session (geometry) ─► run ─► teardown
//         │                    │                    │        │
//         └──── fatal ─────────┴──── fatal ─────────┘        │
//                                                            ▼
//             clear screen, home cursor, restore terminal, exit status
//
// Teardown happens on every path, including a failure to enter raw mode.
// On a quit the session has already cleared the screen; a failed terminal
// restore is then an error of its own. On a fatal error we clear the
// screen here, restore the terminal on a best-effort basis, and print the
// diagnostic last so it lands on a usable shell.
//
// Logging goes to the file named by `TILDE_LOG` (never to the terminal,
// which is in raw mode), filtered by `TILDE_LOG_LEVEL`.

use std::io::Write;
use std::process::ExitCode;

#[cfg(unix)]
use anyhow::Context;
use tracing::info;
#[cfg(unix)]
use tracing::warn;

#[cfg(unix)]
use tilde_editor::config::EditorConfig;
#[cfg(unix)]
use tilde_editor::session::{self, Session};
#[cfg(unix)]
use tilde_term::geometry::{self, Size};
#[cfg(unix)]
use tilde_term::input::{ByteSource, TtyInput};
#[cfg(unix)]
use tilde_term::output::TtyOutput;
#[cfg(unix)]
use tilde_term::terminal::{RawMode, is_tty};

// ─── Logging ────────────────────────────────────────────────────────────────

/// Install a file-backed tracing subscriber if `TILDE_LOG` names a file.
fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let Some(path) = std::env::var_os("TILDE_LOG") else {
        return;
    };
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    else {
        return;
    };

    let filter =
        EnvFilter::try_from_env("TILDE_LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

// ─── Run ────────────────────────────────────────────────────────────────────

/// Run one session with raw mode held on `tty`, then tear down.
///
/// Every error path clears the screen and homes the cursor on `output`
/// before returning; raw mode is released before the caller sees the error.
#[cfg(unix)]
fn run<Q, I, W>(
    config: EditorConfig,
    tty: std::os::unix::io::RawFd,
    query: Q,
    input: I,
    output: &mut W,
) -> anyhow::Result<()>
where
    Q: FnOnce() -> Option<Size>,
    I: ByteSource,
    W: Write,
{
    let mut raw = match RawMode::enable(tty, config.raw_config()) {
        Ok(raw) => raw,
        Err(e) => {
            fatal_teardown(output);
            let what = if is_tty(tty) {
                "enableRawMode"
            } else {
                "enableRawMode: standard input is not a terminal"
            };
            return Err(e).context(what);
        }
    };

    match run_session(config, query, input, &mut *output) {
        Ok(()) => {
            raw.disable().context("disableRawMode")?;
            info!("tilde exiting");
            Ok(())
        }
        Err(e) => {
            fatal_teardown(output);
            if let Err(restore) = raw.disable() {
                warn!(error = ?restore, "failed to restore terminal during fatal teardown");
            }
            Err(e)
        }
    }
}

#[cfg(unix)]
fn run_session<Q, I, W>(config: EditorConfig, query: Q, input: I, output: W) -> anyhow::Result<()>
where
    Q: FnOnce() -> Option<Size>,
    I: ByteSource,
    W: Write,
{
    let mut session = Session::start(config, query, input, output).context("getWindowSize")?;
    session.run().context("session")
}

#[cfg(unix)]
fn fatal_teardown(output: &mut impl Write) {
    if let Err(e) = session::write_teardown(output) {
        warn!(error = %e, "failed to clear screen during fatal teardown");
    }
}

/// Print the diagnostic for a failed run to `err` and pick the exit status.
fn report(result: &anyhow::Result<()>, err: &mut impl Write) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            let _ = writeln!(err, "tilde: {e:#}");
            1
        }
    }
}

#[cfg(unix)]
fn main() -> ExitCode {
    init_logging();
    info!(version = env!("CARGO_PKG_VERSION"), "tilde starting");

    let result = run(
        EditorConfig::default(),
        libc::STDIN_FILENO,
        || geometry::query_window_size(libc::STDOUT_FILENO),
        TtyInput::stdin(),
        &mut TtyOutput::stdout(),
    );
    ExitCode::from(report(&result, &mut std::io::stderr()))
}

#[cfg(not(unix))]
fn main() -> ExitCode {
    init_logging();
    info!("unsupported platform");
    let result = Err(anyhow::anyhow!("raw terminal mode requires a Unix terminal"));
    ExitCode::from(report(&result, &mut std::io::stderr()))
}

// ─── Tests ──────────────────────────────────────────────────────────────────
