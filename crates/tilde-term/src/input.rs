// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Key decoder.
//
// Turns raw terminal bytes into logical key events, one event per call.
// Escape sequences are resolved by a small finite-state machine whose
// transition function is pure: it takes the current state and either the
// next byte or "the read timed out", and returns the next state or an
// event. The blocking part (pulling bytes off the terminal) is kept
// separate, behind the `ByteSource` trait, so the machine can be driven
// from a script in tests.
//
// # Escape vs escape-sequence ambiguity
//
// A bare ESC byte (0x1B) is either the Escape key or the first byte of a
// sequence such as `ESC [ A`. Terminals send a whole sequence in one burst,
// so if the next byte does not arrive within one read timeout (100ms in
// raw mode), the ESC is reported as a lone Escape keypress. The same rule
// applies at every step of a sequence: a timeout mid-sequence yields
// Escape, and so does any byte the machine does not recognize.
//
// Recognized sequences:
//
// | Bytes                      | Event                |
// |----------------------------|----------------------|
// | `ESC [ A` / `B` / `C` / `D` | Up / Down / Right / Left |
// | `ESC [ H`, `ESC O H`, `ESC [ 1 ~`, `ESC [ 7 ~` | Home |
// | `ESC [ F`, `ESC O F`, `ESC [ 4 ~`, `ESC [ 8 ~` | End  |
// | `ESC [ 3 ~`                | Delete               |
// | `ESC [ 5 ~` / `ESC [ 6 ~`  | `PageUp` / `PageDown` |

use std::io::{self, Read};

use tracing::trace;

use crate::error::{Error, Result};

const ESC: u8 = 0x1b;

// ─── Key Events ─────────────────────────────────────────────────────────────

/// A decoded key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// Any byte that is not part of an escape sequence, including control
    /// bytes such as Ctrl-Q (0x11).
    PlainByte(u8),
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    PageUp,
    PageDown,
    Home,
    End,
    Delete,
    /// A lone ESC, a timed-out sequence, or an unrecognized one.
    Escape,
}

/// The byte a Ctrl chord produces: the letter with the top three bits cleared.
#[inline]
#[must_use]
pub const fn ctrl(key: u8) -> u8 {
    key & 0x1f
}

// ─── State Machine ──────────────────────────────────────────────────────────

/// Decoder state between bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeState {
    /// Waiting for the first byte of a key.
    #[default]
    Normal,
    /// Saw ESC.
    SawEscape,
    /// Saw `ESC [`.
    SawBracket,
    /// Saw `ESC [ <digit>`; waiting for `~`.
    SawDigit(u8),
    /// Saw `ESC O` (SS3).
    SawSs3,
}

/// Result of feeding one input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// No event yet; continue in this state.
    Pending(DecodeState),
    /// A key was decoded; the machine is back in [`DecodeState::Normal`].
    Emit(KeyEvent),
}

impl DecodeState {
    /// Advance the machine by one input.
    ///
    /// `None` means the read timed out without a byte.
    #[must_use]
    pub const fn step(self, input: Option<u8>) -> Step {
        use KeyEvent as K;

        match (self, input) {
            (Self::Normal, None) => Step::Pending(Self::Normal),
            (Self::Normal, Some(ESC)) => Step::Pending(Self::SawEscape),
            (Self::Normal, Some(b)) => Step::Emit(K::PlainByte(b)),

            (Self::SawEscape, Some(b'[')) => Step::Pending(Self::SawBracket),
            (Self::SawEscape, Some(b'O')) => Step::Pending(Self::SawSs3),

            (Self::SawBracket, Some(b'A')) => Step::Emit(K::ArrowUp),
            (Self::SawBracket, Some(b'B')) => Step::Emit(K::ArrowDown),
            (Self::SawBracket, Some(b'C')) => Step::Emit(K::ArrowRight),
            (Self::SawBracket, Some(b'D')) => Step::Emit(K::ArrowLeft),
            (Self::SawBracket | Self::SawSs3, Some(b'H')) => Step::Emit(K::Home),
            (Self::SawBracket | Self::SawSs3, Some(b'F')) => Step::Emit(K::End),
            (Self::SawBracket, Some(d @ b'0'..=b'9')) => Step::Pending(Self::SawDigit(d)),

            (Self::SawDigit(d), Some(b'~')) => Step::Emit(match d {
                b'1' | b'7' => K::Home,
                b'3' => K::Delete,
                b'4' | b'8' => K::End,
                b'5' => K::PageUp,
                b'6' => K::PageDown,
                _ => K::Escape,
            }),

            // Timeout or unrecognized byte anywhere inside a sequence.
            (Self::SawEscape | Self::SawBracket | Self::SawDigit(_) | Self::SawSs3, _) => {
                Step::Emit(K::Escape)
            }
        }
    }
}

// ─── Byte Sources ───────────────────────────────────────────────────────────

/// Something the decoder can pull bytes from, one at a time.
pub trait ByteSource {
    /// Read one byte.
    ///
    /// Returns `Ok(None)` if the read timed out with no input.
    ///
    /// # Errors
    ///
    /// Returns the underlying error for genuine read failures.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }
}

/// Raw reads from a terminal file descriptor in raw mode.
///
/// With `VMIN = 0, VTIME = 1` a `read()` returns 0 bytes after 100ms of
/// silence; that, `EAGAIN`, and `EINTR` are all reported as timeouts.
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
pub struct TtyInput {
    fd: std::os::unix::io::RawFd,
}

#[cfg(unix)]
impl TtyInput {
    #[must_use]
    pub const fn new(fd: std::os::unix::io::RawFd) -> Self {
        Self { fd }
    }

    /// Standard input.
    #[must_use]
    pub const fn stdin() -> Self {
        Self::new(libc::STDIN_FILENO)
    }
}

#[cfg(unix)]
impl ByteSource for TtyInput {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = 0u8;
        let n = unsafe { libc::read(self.fd, (&raw mut byte).cast::<libc::c_void>(), 1) };
        match n {
            1 => Ok(Some(byte)),
            0 => Ok(None),
            _ => {
                let err = io::Error::last_os_error();
                match err.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(None),
                    _ => Err(err),
                }
            }
        }
    }
}

/// Adapts any [`Read`] into a [`ByteSource`].
///
/// A zero-byte read counts as a timeout, matching raw-mode terminal
/// semantics. Useful for pipes and scripted input.
#[derive(Debug)]
pub struct ReaderSource<R> {
    inner: R,
}

impl<R: Read> ReaderSource<R> {
    pub const fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

// ─── Decoder ────────────────────────────────────────────────────────────────

/// Blocking key decoder over a [`ByteSource`].
///
/// Each call to [`next_key`](Self::next_key) reads as many bytes as it
/// takes to determine one event. The machine always finishes a call back in
/// [`DecodeState::Normal`], so the decoder itself carries no state between
/// events.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDecoder;

impl KeyDecoder {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Block until one key event is decoded.
    ///
    /// In the `Normal` state timeouts are ignored and reading continues.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] on a genuine read failure.
    pub fn next_key(&self, source: &mut impl ByteSource) -> Result<KeyEvent> {
        let mut state = DecodeState::Normal;
        loop {
            let input = source.read_byte().map_err(Error::Input)?;
            match state.step(input) {
                Step::Pending(next) => state = next,
                Step::Emit(key) => {
                    trace!(?key, "decoded key");
                    return Ok(key);
                }
            }
        }
    }

    /// An endless iterator of key events from `source`.
    ///
    /// Yields `Err` once on a read failure and ends there.
    pub const fn keys<S: ByteSource>(self, source: S) -> Keys<S> {
        Keys {
            decoder: self,
            source,
            failed: false,
        }
    }
}

/// Iterator returned by [`KeyDecoder::keys`].
#[derive(Debug)]
pub struct Keys<S> {
    decoder: KeyDecoder,
    source: S,
    failed: bool,
}

impl<S: ByteSource> Iterator for Keys<S> {
    type Item = Result<KeyEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.decoder.next_key(&mut self.source);
        self.failed = item.is_err();
        Some(item)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
