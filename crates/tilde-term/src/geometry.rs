// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Window geometry.
//
// Two strategies, composed by `resolve`:
//
//   1. Ask the kernel (`ioctl(TIOCGWINSZ)`). Fast and side-effect free, but
//      unavailable on some terminals and pipes, and a few report 0 columns.
//   2. Ask the terminal. Push the cursor to the far bottom-right corner
//      (CUF/CUD clamp at the edge), request a cursor position report, and
//      read `ESC [ rows ; cols R` back from the input stream. This moves
//      the cursor, which is fine because the next frame repositions it.

use std::io::Write;

use tracing::debug;

use crate::ansi;
use crate::error::GeometryError;
use crate::input::ByteSource;

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Number of rows (height in character cells).
    pub rows: u16,
    /// Number of columns (width in character cells).
    pub cols: u16,
}

/// Longest cursor position report we accept, terminator included.
pub const REPORT_LIMIT: usize = 32;

// ─── Strategy 1: ioctl ──────────────────────────────────────────────────────

/// Query the window size of `fd` via `ioctl(TIOCGWINSZ)`.
///
/// Returns `None` if the query fails or reports a zero dimension.
#[cfg(unix)]
#[must_use]
pub fn query_window_size(fd: std::os::unix::io::RawFd) -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &raw mut ws) };

    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some(Size {
            rows: ws.ws_row,
            cols: ws.ws_col,
        })
    } else {
        None
    }
}

#[cfg(not(unix))]
#[must_use]
pub const fn query_window_size(_fd: i32) -> Option<Size> {
    None
}

// ─── Strategy 2: cursor probe ───────────────────────────────────────────────

/// Parse a cursor position report with its `R` terminator already removed.
///
/// # Errors
///
/// [`GeometryError::Malformed`] unless the input is exactly
/// `ESC [ <rows> ; <cols>`; [`GeometryError::ZeroSize`] if either is 0.
pub fn parse_cursor_report(report: &[u8]) -> Result<Size, GeometryError> {
    let body = report
        .strip_prefix(b"\x1b[")
        .ok_or(GeometryError::Malformed)?;
    let text = std::str::from_utf8(body).map_err(|_| GeometryError::Malformed)?;
    let (rows, cols) = text.split_once(';').ok_or(GeometryError::Malformed)?;

    let number = |s: &str| {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(GeometryError::Malformed);
        }
        s.parse::<u16>().map_err(|_| GeometryError::Malformed)
    };
    let size = Size {
        rows: number(rows)?,
        cols: number(cols)?,
    };

    if size.rows == 0 || size.cols == 0 {
        return Err(GeometryError::ZeroSize);
    }
    Ok(size)
}

/// Find the window size by moving the cursor to the bottom-right corner
/// and asking the terminal where it ended up.
///
/// Reads the report one byte at a time until `R`.
///
/// # Errors
///
/// Fails if the probe cannot be written, the input fails or goes quiet
/// before `R`, the report exceeds [`REPORT_LIMIT`], or it does not parse.
pub fn probe_cursor_position(
    out: &mut impl Write,
    input: &mut impl ByteSource,
) -> Result<Size, GeometryError> {
    ansi::cursor_to_far_corner(out)
        .and_then(|()| ansi::request_cursor_position(out))
        .and_then(|()| out.flush())
        .map_err(GeometryError::ProbeWrite)?;

    let mut report = Vec::with_capacity(REPORT_LIMIT);
    loop {
        match input.read_byte().map_err(GeometryError::ProbeRead)? {
            None => return Err(GeometryError::NoReport),
            Some(b'R') => break,
            Some(byte) => {
                if report.len() + 1 >= REPORT_LIMIT {
                    return Err(GeometryError::ReportTooLong(REPORT_LIMIT));
                }
                report.push(byte);
            }
        }
    }

    parse_cursor_report(&report)
}

// ─── Fallback policy ────────────────────────────────────────────────────────

/// Resolve the window size: `query` first, the cursor probe if it yields
/// nothing.
///
/// # Errors
///
/// Returns the probe's error when both strategies fail.
pub fn resolve<Q, W, S>(query: Q, out: &mut W, input: &mut S) -> Result<Size, GeometryError>
where
    Q: FnOnce() -> Option<Size>,
    W: Write,
    S: ByteSource,
{
    if let Some(size) = query() {
        debug!(rows = size.rows, cols = size.cols, "window size from ioctl");
        return Ok(size);
    }

    debug!("window size query unavailable, probing cursor position");
    let size = probe_cursor_position(out, input)?;
    debug!(rows = size.rows, cols = size.cols, "window size from cursor report");
    Ok(size)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ReaderSource;
    use pretty_assertions::assert_eq;
    use std::io;

    fn probe(response: &[u8]) -> (Result<Size, GeometryError>, Vec<u8>) {
        let mut out = Vec::new();
        let mut input = ReaderSource::new(response);
        let result = probe_cursor_position(&mut out, &mut input);
        (result, out)
    }

    // ── parse_cursor_report ─────────────────────────────────────────────

    #[test]
    fn parse_report() {
        assert_eq!(
            parse_cursor_report(b"\x1b[40;120").unwrap(),
            Size { rows: 40, cols: 120 }
        );
    }

    #[test]
    fn parse_report_single_digits() {
        assert_eq!(
            parse_cursor_report(b"\x1b[1;1").unwrap(),
            Size { rows: 1, cols: 1 }
        );
    }

    #[test]
    fn parse_rejects_missing_prefix() {
        assert!(matches!(
            parse_cursor_report(b"40;120"),
            Err(GeometryError::Malformed)
        ));
        assert!(matches!(
            parse_cursor_report(b"\x1b40;120"),
            Err(GeometryError::Malformed)
        ));
    }

    #[test]
    fn parse_rejects_bad_numbers() {
        let bad_reports: [&[u8]; 6] = [
            b"\x1b[40",
            b"\x1b[;120",
            b"\x1b[40;",
            b"\x1b[4x;120",
            b"\x1b[+4;12",
            b"\x1b[99999;1",
        ];
        for bad in bad_reports {
            assert!(
                matches!(parse_cursor_report(bad), Err(GeometryError::Malformed)),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn parse_rejects_zero() {
        assert!(matches!(
            parse_cursor_report(b"\x1b[0;80"),
            Err(GeometryError::ZeroSize)
        ));
        assert!(matches!(
            parse_cursor_report(b"\x1b[24;0"),
            Err(GeometryError::ZeroSize)
        ));
    }

    // ── probe_cursor_position ───────────────────────────────────────────

    #[test]
    fn probe_writes_move_then_request() {
        let (_, out) = probe(b"\x1b[24;80R");
        assert_eq!(out, b"\x1b[999C\x1b[999B\x1b[6n");
    }

    #[test]
    fn probe_parses_report() {
        let (size, _) = probe(b"\x1b[40;120R");
        assert_eq!(size.unwrap(), Size { rows: 40, cols: 120 });
    }

    #[test]
    fn probe_stops_at_terminator() {
        let mut out = Vec::new();
        let mut input = ReaderSource::new(&b"\x1b[24;80Rq"[..]);
        probe_cursor_position(&mut out, &mut input).unwrap();
        assert_eq!(input.read_byte().unwrap(), Some(b'q'));
    }

    #[test]
    fn probe_without_report_times_out() {
        let (size, _) = probe(b"");
        assert!(matches!(size, Err(GeometryError::NoReport)));
    }

    #[test]
    fn probe_truncated_report_times_out() {
        let (size, _) = probe(b"\x1b[24;8");
        assert!(matches!(size, Err(GeometryError::NoReport)));
    }

    #[test]
    fn probe_rejects_overlong_report() {
        let mut long = b"\x1b[".to_vec();
        long.extend(std::iter::repeat_n(b'1', 40));
        long.push(b'R');
        let (size, _) = probe(&long);
        assert!(matches!(size, Err(GeometryError::ReportTooLong(REPORT_LIMIT))));
    }

    #[test]
    fn probe_accepts_report_at_limit() {
        // 31 bytes before `R` is the longest accepted report.
        let mut report = b"\x1b[".to_vec();
        report.extend(std::iter::repeat_n(b'0', 24));
        report.extend(b"24;80");
        assert_eq!(report.len(), REPORT_LIMIT - 1);
        report.push(b'R');
        let (size, _) = probe(&report);
        assert_eq!(size.unwrap(), Size { rows: 24, cols: 80 });
    }

    #[test]
    fn probe_write_failure() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut input = ReaderSource::new(&b"\x1b[24;80R"[..]);
        assert!(matches!(
            probe_cursor_position(&mut Broken, &mut input),
            Err(GeometryError::ProbeWrite(_))
        ));
    }

    // ── resolve ─────────────────────────────────────────────────────────

    #[test]
    fn resolve_prefers_query_and_writes_nothing() {
        let mut out = Vec::new();
        let mut input = ReaderSource::new(&b""[..]);
        let size = resolve(|| Some(Size { rows: 24, cols: 80 }), &mut out, &mut input).unwrap();
        assert_eq!(size, Size { rows: 24, cols: 80 });
        assert!(out.is_empty());
    }

    #[test]
    fn resolve_falls_back_to_probe() {
        let mut out = Vec::new();
        let mut input = ReaderSource::new(&b"\x1b[40;120R"[..]);
        let size = resolve(|| None, &mut out, &mut input).unwrap();
        assert_eq!(size, Size { rows: 40, cols: 120 });
        assert_eq!(out, b"\x1b[999C\x1b[999B\x1b[6n");
    }

    #[test]
    fn resolve_fails_when_both_fail() {
        let mut out = Vec::new();
        let mut input = ReaderSource::new(&b"garbageR"[..]);
        assert!(matches!(
            resolve(|| None, &mut out, &mut input),
            Err(GeometryError::Malformed)
        ));
    }

    // ── query_window_size ───────────────────────────────────────────────

    #[cfg(unix)]
    #[test]
    fn query_reads_pty_size() {
        use std::os::fd::AsRawFd;
        let size = Size { rows: 33, cols: 101 };
        let (_master, slave) = crate::terminal::open_pty(Some(size));
        assert_eq!(query_window_size(slave.as_raw_fd()), Some(size));
    }

    #[cfg(unix)]
    #[test]
    fn query_treats_zero_columns_as_unavailable() {
        use std::os::fd::AsRawFd;
        let (_master, slave) = crate::terminal::open_pty(Some(Size { rows: 24, cols: 0 }));
        assert_eq!(query_window_size(slave.as_raw_fd()), None);
    }

    #[cfg(unix)]
    #[test]
    fn query_fails_on_non_terminal() {
        use std::os::fd::AsRawFd;
        let file = std::fs::File::open("/dev/null").unwrap();
        assert_eq!(query_window_size(file.as_raw_fd()), None);
    }
}
