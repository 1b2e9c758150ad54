// SPDX-License-Identifier: MIT
//
// Terminal mode control — raw mode with scoped, exactly-once restore.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), isatty, atexit, and raw fd writes. These are the standard
// POSIX interfaces for terminal control and there is no safe alternative.
// Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// The attributes captured before entering raw mode live in exactly one
// place: the process-wide `ACTIVE` slot. Every restore path takes the
// snapshot out of that slot before applying it:
//
//   - `RawMode::disable` (normal teardown, also called from `Drop`)
//   - the panic hook (panics that unwind past the session, or abort)
//   - the `atexit` hook (`process::exit` skips destructors)
//
// Whichever path runs first restores the terminal; the others find the
// slot empty and do nothing. That gives us an idempotent, exactly-once
// restore without the guard needing to know how the process is ending.
//
// The hooks use `try_lock` so a panic raised while the slot is locked can
// never deadlock inside the hook.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::{Mutex, MutexGuard, Once, PoisonError, TryLockError};

use tracing::{debug, warn};

use crate::error::{Error, Result};

// ─── Raw Configuration ──────────────────────────────────────────────────────

/// Read timing applied in raw mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawConfig {
    /// `VTIME`: how long a read waits for the first byte, in deciseconds.
    pub read_timeout_ds: u8,
    /// `VMIN`: minimum bytes before a read returns. Zero makes reads return
    /// empty once the timeout elapses.
    pub min_bytes: u8,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            read_timeout_ds: 1,
            min_bytes: 0,
        }
    }
}

/// Derive raw-mode attributes from the terminal's current ones.
///
/// Input: no break interrupt, no CR→NL, no parity check, no 8th-bit strip,
/// no software flow control. Output: no post-processing (so `\n` does not
/// become `\r\n`). Local: no canonical mode, echo, extended input, or
/// signal characters. Characters are 8 bits wide.
#[must_use]
pub fn make_raw(original: &libc::termios, config: RawConfig) -> libc::termios {
    let mut raw = *original;
    raw.c_iflag &= !(libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON);
    raw.c_oflag &= !libc::OPOST;
    raw.c_cflag |= libc::CS8;
    raw.c_lflag &= !(libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG);
    raw.c_cc[libc::VMIN] = config.min_bytes;
    raw.c_cc[libc::VTIME] = config.read_timeout_ds;
    raw
}

/// Check whether `fd` is connected to a terminal.
#[must_use]
pub fn is_tty(fd: RawFd) -> bool {
    unsafe { libc::isatty(fd) != 0 }
}

fn get_attrs(fd: RawFd) -> io::Result<libc::termios> {
    let mut termios: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &raw mut termios) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(termios)
}

fn set_attrs(fd: RawFd, termios: &libc::termios) -> io::Result<()> {
    if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, termios) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// ─── Snapshot Slot ──────────────────────────────────────────────────────────

/// Terminal attributes captured before raw mode was applied.
#[derive(Clone, Copy)]
struct TerminalSnapshot {
    fd: RawFd,
    termios: libc::termios,
}

/// The one snapshot that still needs restoring, if any.
static ACTIVE: Mutex<Option<TerminalSnapshot>> = Mutex::new(None);

fn active_slot() -> MutexGuard<'static, Option<TerminalSnapshot>> {
    ACTIVE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Take the pending snapshot and apply it.
///
/// Returns `Ok(false)` when there was nothing to restore.
fn restore_active() -> io::Result<bool> {
    let Some(snapshot) = active_slot().take() else {
        return Ok(false);
    };
    set_attrs(snapshot.fd, &snapshot.termios)?;
    Ok(true)
}

/// Hook-side restore: never blocks, never fails loudly.
fn restore_from_hook() -> bool {
    let taken = match ACTIVE.try_lock() {
        Ok(mut guard) => guard.take(),
        Err(TryLockError::Poisoned(p)) => p.into_inner().take(),
        Err(TryLockError::WouldBlock) => None,
    };
    let Some(snapshot) = taken else {
        return false;
    };
    emergency_write();
    let _ = set_attrs(snapshot.fd, &snapshot.termios);
    true
}

// ─── Exit & Panic Hooks ─────────────────────────────────────────────────────

/// Clear the screen, home and show the cursor.
///
/// Written before the original panic message so it lands on a clean,
/// usable screen.
const EMERGENCY_RESTORE: &[u8] = b"\x1b[2J\x1b[H\x1b[?25h";

static HOOKS_INSTALLED: Once = Once::new();

/// Install the panic hook and the `atexit` handler, once per process.
fn install_exit_hooks() {
    HOOKS_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_from_hook();
            original(info);
        }));

        if unsafe { libc::atexit(restore_at_exit) } != 0 {
            warn!("atexit registration failed; relying on scoped restore only");
        }
    });
}

extern "C" fn restore_at_exit() {
    let _ = restore_from_hook();
}

/// Write [`EMERGENCY_RESTORE`] straight to fd 1.
///
/// Bypasses `io::stdout()` so a panic raised while the stdout lock is held
/// cannot deadlock here.
fn emergency_write() {
    unsafe {
        let _ = libc::write(
            libc::STDOUT_FILENO,
            EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
            EMERGENCY_RESTORE.len(),
        );
    }
}

// ─── RawMode ────────────────────────────────────────────────────────────────

/// Scoped raw-mode acquisition.
///
/// [`enable`](Self::enable) captures the terminal's attributes and applies
/// raw mode; the original attributes come back on [`disable`](Self::disable)
/// or when the guard is dropped. Only one guard may be alive per process.
///
/// ```no_run
/// use tilde_term::terminal::{RawConfig, RawMode};
///
/// let mut raw = RawMode::enable(libc::STDIN_FILENO, RawConfig::default())?;
/// // ... run the session ...
/// raw.disable()?;
/// # Ok::<(), tilde_term::Error>(())
/// ```
pub struct RawMode {
    fd: RawFd,
    active: bool,
}

impl RawMode {
    /// Enter raw mode on `fd`.
    ///
    /// # Errors
    ///
    /// - [`Error::RawModeActive`] if another guard is alive.
    /// - [`Error::TerminalQuery`] if the attributes cannot be read.
    /// - [`Error::TerminalConfig`] if raw attributes cannot be applied. The
    ///   captured snapshot is released in that case.
    pub fn enable(fd: RawFd, config: RawConfig) -> Result<Self> {
        let mut slot = active_slot();
        if slot.is_some() {
            return Err(Error::RawModeActive);
        }

        let termios = get_attrs(fd).map_err(Error::TerminalQuery)?;
        *slot = Some(TerminalSnapshot { fd, termios });
        install_exit_hooks();

        let raw = make_raw(&termios, config);
        if let Err(e) = set_attrs(fd, &raw) {
            *slot = None;
            return Err(Error::TerminalConfig(e));
        }

        debug!(fd, timeout_ds = config.read_timeout_ds, "raw mode enabled");
        Ok(Self { fd, active: true })
    }

    /// Restore the attributes captured by [`enable`](Self::enable).
    ///
    /// Idempotent. Also a no-op if an exit or panic hook already restored
    /// the terminal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TerminalConfig`] if `tcsetattr` fails. The snapshot
    /// is consumed either way, so a failed restore is not retried.
    pub fn disable(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        if restore_active().map_err(Error::TerminalConfig)? {
            debug!(fd = self.fd, "raw mode disabled");
        }
        Ok(())
    }

    /// Whether this guard still holds raw mode.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = self.disable() {
            warn!(error = ?e, "failed to restore terminal on drop");
        }
    }
}

// ─── Test Support ───────────────────────────────────────────────────────────

/// Open a pseudo-terminal pair, optionally with an initial window size.
///
/// Returns `(master, slave)`; both close on drop.
#[cfg(test)]
pub(crate) fn open_pty(
    size: Option<crate::geometry::Size>,
) -> (std::os::fd::OwnedFd, std::os::fd::OwnedFd) {
    use std::os::fd::FromRawFd;

    let ws = size.map(|s| libc::winsize {
        ws_row: s.rows,
        ws_col: s.cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    });
    let winp = ws.as_ref().map_or(std::ptr::null(), std::ptr::from_ref);

    let mut master: libc::c_int = -1;
    let mut slave: libc::c_int = -1;
    let rc = unsafe {
        libc::openpty(
            &raw mut master,
            &raw mut slave,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            winp.cast_mut(),
        )
    };
    assert_eq!(rc, 0, "openpty failed: {}", io::Error::last_os_error());
    unsafe {
        (
            std::os::fd::OwnedFd::from_raw_fd(master),
            std::os::fd::OwnedFd::from_raw_fd(slave),
        )
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;

    /// Tests that take the process-wide raw-mode slot run one at a time.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn serial() -> MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn assert_same_attrs(a: &libc::termios, b: &libc::termios) {
        assert_eq!(a.c_iflag, b.c_iflag, "c_iflag");
        assert_eq!(a.c_oflag, b.c_oflag, "c_oflag");
        assert_eq!(a.c_cflag, b.c_cflag, "c_cflag");
        assert_eq!(a.c_lflag, b.c_lflag, "c_lflag");
        assert_eq!(a.c_cc, b.c_cc, "c_cc");
        unsafe {
            assert_eq!(libc::cfgetispeed(a), libc::cfgetispeed(b), "ispeed");
            assert_eq!(libc::cfgetospeed(a), libc::cfgetospeed(b), "ospeed");
        }
    }

    // ── make_raw ────────────────────────────────────────────────────

    #[test]
    fn make_raw_clears_input_flags() {
        let mut original: libc::termios = unsafe { std::mem::zeroed() };
        original.c_iflag = libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON;
        let raw = make_raw(&original, RawConfig::default());
        assert_eq!(raw.c_iflag, 0);
    }

    #[test]
    fn make_raw_keeps_unrelated_flags() {
        let mut original: libc::termios = unsafe { std::mem::zeroed() };
        original.c_iflag = libc::IXON | libc::IGNPAR;
        original.c_lflag = libc::ECHO | libc::ECHOE;
        let raw = make_raw(&original, RawConfig::default());
        assert_eq!(raw.c_iflag, libc::IGNPAR);
        assert_eq!(raw.c_lflag, libc::ECHOE);
    }

    #[test]
    fn make_raw_disables_output_processing_and_line_discipline() {
        let mut original: libc::termios = unsafe { std::mem::zeroed() };
        original.c_oflag = libc::OPOST;
        original.c_lflag = libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG;
        let raw = make_raw(&original, RawConfig::default());
        assert_eq!(raw.c_oflag & libc::OPOST, 0);
        assert_eq!(raw.c_lflag, 0);
    }

    #[test]
    fn make_raw_sets_eight_bit_chars() {
        let original: libc::termios = unsafe { std::mem::zeroed() };
        let raw = make_raw(&original, RawConfig::default());
        assert_eq!(raw.c_cflag & libc::CS8, libc::CS8);
    }

    #[test]
    fn make_raw_sets_read_timing() {
        let original: libc::termios = unsafe { std::mem::zeroed() };
        let raw = make_raw(
            &original,
            RawConfig {
                read_timeout_ds: 3,
                min_bytes: 0,
            },
        );
        assert_eq!(raw.c_cc[libc::VTIME], 3);
        assert_eq!(raw.c_cc[libc::VMIN], 0);
    }

    #[test]
    fn default_config_is_one_decisecond_nonblocking() {
        let c = RawConfig::default();
        assert_eq!(c.read_timeout_ds, 1);
        assert_eq!(c.min_bytes, 0);
    }

    // ── RawMode on a pseudo-terminal ────────────────────────────────

    #[test]
    fn enable_then_disable_restores_every_field() {
        let _serial = serial();
        let (_master, slave) = open_pty(None);
        let fd = slave.as_raw_fd();
        let before = get_attrs(fd).unwrap();

        let mut raw = RawMode::enable(fd, RawConfig::default()).unwrap();
        let during = get_attrs(fd).unwrap();
        assert_eq!(during.c_lflag & libc::ICANON, 0);
        assert_eq!(during.c_lflag & libc::ECHO, 0);
        assert_eq!(during.c_cc[libc::VTIME], 1);

        raw.disable().unwrap();
        assert_same_attrs(&before, &get_attrs(fd).unwrap());
    }

    #[test]
    fn drop_restores() {
        let _serial = serial();
        let (_master, slave) = open_pty(None);
        let fd = slave.as_raw_fd();
        let before = get_attrs(fd).unwrap();

        let raw = RawMode::enable(fd, RawConfig::default()).unwrap();
        drop(raw);
        assert_same_attrs(&before, &get_attrs(fd).unwrap());
    }

    #[test]
    fn disable_is_idempotent() {
        let _serial = serial();
        let (_master, slave) = open_pty(None);
        let mut raw = RawMode::enable(slave.as_raw_fd(), RawConfig::default()).unwrap();
        raw.disable().unwrap();
        raw.disable().unwrap();
        assert!(!raw.is_active());
    }

    #[test]
    fn second_guard_is_rejected() {
        let _serial = serial();
        let (_master, slave) = open_pty(None);
        let fd = slave.as_raw_fd();
        let mut first = RawMode::enable(fd, RawConfig::default()).unwrap();
        assert!(matches!(
            RawMode::enable(fd, RawConfig::default()),
            Err(Error::RawModeActive)
        ));
        first.disable().unwrap();

        // Released: a new guard is allowed again.
        let mut again = RawMode::enable(fd, RawConfig::default()).unwrap();
        again.disable().unwrap();
    }

    #[test]
    fn hook_restore_makes_disable_a_no_op() {
        let _serial = serial();
        let (_master, slave) = open_pty(None);
        let fd = slave.as_raw_fd();
        let before = get_attrs(fd).unwrap();

        let mut raw = RawMode::enable(fd, RawConfig::default()).unwrap();
        assert!(restore_active().unwrap());
        assert_same_attrs(&before, &get_attrs(fd).unwrap());

        // The snapshot was consumed; the guard has nothing left to do.
        raw.disable().unwrap();
        assert!(!restore_active().unwrap());
    }

    #[test]
    fn enable_on_non_terminal_fails_with_query_error() {
        let _serial = serial();
        let file = std::fs::File::open("/dev/null").unwrap();
        let result = RawMode::enable(file.as_raw_fd(), RawConfig::default());
        assert!(matches!(result, Err(Error::TerminalQuery(_))));
        // Nothing was left behind in the slot.
        assert!(active_slot().is_none());
    }

    #[test]
    fn is_tty_distinguishes_pty_from_file() {
        let (_master, slave) = open_pty(None);
        assert!(is_tty(slave.as_raw_fd()));
        let file = std::fs::File::open("/dev/null").unwrap();
        assert!(!is_tty(file.as_raw_fd()));
    }

    #[test]
    fn emergency_restore_shows_cursor_last() {
        let s = std::str::from_utf8(EMERGENCY_RESTORE).unwrap();
        assert!(s.starts_with("\x1b[2J"));
        assert!(s.ends_with("\x1b[?25h"));
    }
}
