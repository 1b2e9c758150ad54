// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Frame output buffering.
//
// A repaint is dozens of small pieces: cursor hide, home, one fragment per
// row, line clears, the final cursor position. Writing each to the terminal
// separately makes the terminal draw half-finished frames (flicker). The
// `RenderBuffer` collects a whole frame in memory and hands it to the
// terminal in a single `write_all`.
//
// Growth goes through `Vec::try_reserve`. If an append cannot allocate, that
// fragment is dropped and the frame is marked torn; earlier fragments stay
// intact. A torn frame is never written: `flush` discards it and resets the
// buffer, so the terminal only ever receives whole frames, and the next
// frame repaints the full screen anyway.
//
// `TtyOutput` is the other half: an unbuffered writer over a raw fd. Going
// through `io::stdout()` would put a `LineWriter` in the way, which splits
// a frame at its last newline into two writes.

use std::io::{self, Write};

use tracing::warn;

/// Default capacity: enough for a full frame of a large terminal window
/// without reallocation.
const DEFAULT_CAPACITY: usize = 16_384;

/// Append-only byte accumulator for one frame.
#[derive(Debug)]
pub struct RenderBuffer {
    buf: Vec<u8>,
    /// Fragments dropped in the current frame because growth failed.
    dropped: usize,
}

impl RenderBuffer {
    /// Create an empty buffer with default capacity (16 KB).
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
            dropped: 0,
        }
    }

    /// Append `bytes` after everything appended so far.
    ///
    /// On allocation failure the fragment is dropped and counted; existing
    /// content is left exactly as it was.
    pub fn append(&mut self, bytes: &[u8]) {
        if self.reserve(bytes.len()) {
            self.buf.extend_from_slice(bytes);
        }
    }

    /// Make room for `additional` bytes, recording a dropped fragment if
    /// the allocation fails.
    fn reserve(&mut self, additional: usize) -> bool {
        match self.buf.try_reserve(additional) {
            Ok(()) => true,
            Err(e) => {
                self.dropped += 1;
                warn!(len = additional, error = %e, "render buffer growth failed, fragment dropped");
                false
            }
        }
    }

    /// Number of bytes accumulated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Fragments dropped since the last reset.
    #[inline]
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// Start a new frame. Keeps the allocation.
    #[inline]
    pub fn reset(&mut self) {
        self.buf.clear();
        self.dropped = 0;
    }

    /// Write the frame to `w` in one operation and reset.
    ///
    /// A frame that lost a fragment is discarded instead of written.
    /// Returns whether the frame was written.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to or flushing `w` fails. The buffer is
    /// reset either way.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<bool> {
        if self.dropped > 0 {
            warn!(dropped = self.dropped, "discarding torn frame");
            self.reset();
            return Ok(false);
        }

        let result = if self.buf.is_empty() {
            Ok(())
        } else {
            w.write_all(&self.buf).and_then(|()| w.flush())
        };
        self.reset();
        result.map(|()| true)
    }
}

impl Write for RenderBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Intentionally a no-op. Real output goes through flush_to().
        Ok(())
    }
}

impl Default for RenderBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── TtyOutput ───────────────────────────────────────────────────────────────

/// Unbuffered writer over a terminal file descriptor.
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
pub struct TtyOutput {
    fd: std::os::unix::io::RawFd,
}

#[cfg(unix)]
impl TtyOutput {
    #[must_use]
    pub const fn new(fd: std::os::unix::io::RawFd) -> Self {
        Self { fd }
    }

    /// Standard output.
    #[must_use]
    pub const fn stdout() -> Self {
        Self::new(libc::STDOUT_FILENO)
    }
}

#[cfg(unix)]
impl Write for TtyOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = unsafe { libc::write(self.fd, buf.as_ptr().cast::<libc::c_void>(), buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        #[allow(clippy::cast_sign_loss)] // n >= 0 checked above.
        Ok(n as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
