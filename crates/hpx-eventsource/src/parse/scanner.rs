//! Line splitting for `text/event-stream` bodies.
//!
//! A line ends at the first CR, LF or CRLF. The scanner buffers partial
//! lines across chunk boundaries and hands out complete lines with the
//! terminator stripped.

use core::fmt::{self, Display, Formatter};

use bytes::{Buf, Bytes, BytesMut};

use super::constants::{CR, LF};

/// A single line grew past the scanner's fixed capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTooLong {
    /// The configured maximum line length in bytes.
    pub limit: usize,
}

impl Display for LineTooLong {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "line exceeds the maximum length of {} bytes", self.limit)
    }
}

impl core::error::Error for LineTooLong {}

/// Incremental line splitter.
///
/// Feed it chunks with [`push`](Self::push) and drain lines with
/// [`next_line`](Self::next_line). Once the source is exhausted call
/// [`finish`](Self::finish) so a trailing CR or an unterminated tail is
/// reported as a final line. A finished scanner is not reusable; a new
/// stream needs a new scanner.
#[derive(Debug, Default)]
pub struct LineScanner {
    buffer: BytesMut,
    /// Bytes at the front of `buffer` already known to contain no terminator.
    scanned: usize,
    max_line: Option<usize>,
    finished: bool,
}

impl LineScanner {
    /// Create a scanner whose buffer grows as needed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scanner that rejects any line longer than `limit` bytes.
    pub fn with_max_line(limit: usize) -> Self {
        Self {
            max_line: Some(limit),
            ..Self::default()
        }
    }

    /// The configured line limit, if any.
    pub fn max_line(&self) -> Option<usize> {
        self.max_line
    }

    /// Append a chunk of raw bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Mark the end of the underlying stream.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Whether [`finish`](Self::finish) has been called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes received but not yet returned as part of a line.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop `n` bytes from the front of the buffer.
    pub(crate) fn discard(&mut self, n: usize) {
        self.buffer.advance(n.min(self.buffer.len()));
        self.scanned = 0;
    }

    /// Consume the scanner, returning unparsed leftovers.
    pub fn into_buffer(self) -> BytesMut {
        self.buffer
    }

    /// Return the next complete line, or `Ok(None)` if more input is needed.
    ///
    /// # Errors
    ///
    /// Returns [`LineTooLong`] when a limit is configured and the current
    /// line exceeds it, whether or not its terminator has arrived yet.
    pub fn next_line(&mut self) -> Result<Option<Bytes>, LineTooLong> {
        match find_eol(&self.buffer, self.scanned, self.finished) {
            Some((line_end, rest_start)) => {
                self.check_len(line_end)?;
                let line = self.buffer.split_to(line_end).freeze();
                self.buffer.advance(rest_start - line_end);
                self.scanned = 0;
                Ok(Some(line))
            }
            None if self.finished && !self.buffer.is_empty() => {
                self.check_len(self.buffer.len())?;
                self.scanned = 0;
                Ok(Some(self.buffer.split().freeze()))
            }
            None => {
                // A pending CR may still turn out to be half of a CRLF, so
                // it is rescanned on the next call.
                self.scanned = match self.buffer.last() {
                    Some(&CR) => self.buffer.len() - 1,
                    _ => self.buffer.len(),
                };
                self.check_len(self.scanned)?;
                Ok(None)
            }
        }
    }

    fn check_len(&self, len: usize) -> Result<(), LineTooLong> {
        match self.max_line {
            Some(limit) if len > limit => Err(LineTooLong { limit }),
            _ => Ok(()),
        }
    }
}

/// Locate the next terminator at or after `from`.
///
/// Returns `(line_end, rest_start)`. A CR in the final byte is only a
/// terminator once the stream is known to be finished.
fn find_eol(bytes: &[u8], from: usize, finished: bool) -> Option<(usize, usize)> {
    let pos = from + memchr::memchr2(CR, LF, &bytes[from..])?;

    match bytes[pos] {
        LF => Some((pos, pos + 1)),
        _ => match bytes.get(pos + 1) {
            Some(&LF) => Some((pos, pos + 2)),
            Some(_) => Some((pos, pos + 1)),
            None if finished => Some((pos, pos + 1)),
            None => None,
        },
    }
}
