//! [`Stream`] adapter turning byte chunks into [`Event`]s.

use core::{
    mem,
    pin::Pin,
    task::{Context, Poll, ready},
    time::Duration,
};

use bytes::{Bytes, BytesMut};
use bytes_utils::Str;
use futures_core::Stream;

use super::{
    constants::{BOM, DEFAULT_RETRY, EMPTY_STR, LF},
    errors::DecodeError,
    event::Event,
    line::{FieldName, Line},
    scanner::LineScanner,
};

// ---------------------------------------------------------------------------
// Pending record
// ---------------------------------------------------------------------------

/// Field state of the record currently being read.
///
/// `id` survives dispatch; `name` and the data accumulator are reset at
/// every blank line.
#[derive(Debug)]
struct PendingRecord {
    id: Str,
    name: Str,
    data: BytesMut,
    has_data: bool,
}

impl PendingRecord {
    fn new(id: Str) -> Self {
        Self {
            id,
            name: EMPTY_STR,
            data: BytesMut::new(),
            has_data: false,
        }
    }

    fn apply(&mut self, name: FieldName, value: Str, retry: &mut Duration) {
        match name {
            FieldName::Data => {
                if self.has_data {
                    self.data.extend_from_slice(&[LF]);
                }
                self.data.extend_from_slice(value.as_bytes());
                self.has_data = true;
            }
            // Copied out: `value` is a slice of the scanner's buffer.
            FieldName::Event => self.name = Str::from(&*value),
            // An id containing NUL is ignored, it could never be replayed
            // in a `Last-Event-ID` header.
            FieldName::Id if memchr::memchr(0, value.as_bytes()).is_none() => {
                self.id = Str::from(&*value);
            }
            FieldName::Retry => {
                if let Some(millis) = parse_retry(&value) {
                    *retry = Duration::from_millis(millis);
                }
            }
            FieldName::Id | FieldName::Ignored => {}
        }
    }

    /// Close the record at a blank line.
    fn dispatch(&mut self) -> Option<Event> {
        let name = mem::replace(&mut self.name, EMPTY_STR);
        if !mem::take(&mut self.has_data) {
            return None;
        }

        let data = Bytes::copy_from_slice(&self.data);
        self.data.clear();
        // Safety: UTF-8 values joined by LF.
        let data = unsafe { Str::from_inner_unchecked(data) };
        Some(Event::from_parts(self.id.clone(), name, data))
    }
}

/// `retry` accepts ASCII digits only; anything else leaves the interval alone.
fn parse_retry(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Waiting for enough bytes to rule a BOM in or out.
    NotStarted,
    Started,
    /// A decode or transport error ended the stream.
    Failed,
}

pin_project_lite::pin_project! {
    /// Decodes a `text/event-stream` body.
    ///
    /// Yields one [`Event`] per record that carried at least one `data`
    /// field. A record left open when the body ends is discarded. The
    /// stream ends after the first error.
    #[derive(Debug)]
    pub struct Decoder<S> {
        #[pin]
        stream: S,
        scanner: LineScanner,
        record: PendingRecord,
        retry: Duration,
        last_event_id: Str,
        state: DecoderState,
    }
}

/// Shorthand for [`Decoder::new`].
pub fn decode<S>(stream: S) -> Decoder<S> {
    Decoder::new(stream)
}

impl<S> Decoder<S> {
    /// Decode `stream` with an unbounded line buffer.
    pub fn new(stream: S) -> Self {
        Self::with_scanner(stream, LineScanner::new())
    }

    /// Decode `stream` using a preconfigured scanner, e.g. one built with
    /// [`LineScanner::with_max_line`].
    pub fn with_scanner(stream: S, scanner: LineScanner) -> Self {
        Self {
            stream,
            scanner,
            record: PendingRecord::new(EMPTY_STR),
            retry: DEFAULT_RETRY,
            last_event_id: EMPTY_STR,
            state: DecoderState::NotStarted,
        }
    }

    /// Resume from an earlier stream: events without an `id` field will
    /// carry `id`.
    #[must_use]
    pub fn resume_from(mut self, id: impl Into<Str>) -> Self {
        let id = id.into();
        self.record.id = id.clone();
        self.last_event_id = id;
        self
    }

    /// Start from a retry interval other than [`DEFAULT_RETRY`].
    #[must_use]
    pub fn retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    /// The reconnection interval, as last set by a `retry` field.
    pub fn retry_interval(&self) -> Duration {
        self.retry
    }

    /// The id of the most recently yielded event.
    pub fn last_event_id(&self) -> &str {
        &self.last_event_id
    }

    /// Consume the decoder, returning bytes not yet split into lines.
    pub fn into_buffer(self) -> BytesMut {
        self.scanner.into_buffer()
    }
}

/// Run buffered lines through the record until one dispatches.
fn next_event<E>(
    scanner: &mut LineScanner,
    record: &mut PendingRecord,
    retry: &mut Duration,
) -> Result<Option<Event>, DecodeError<E>> {
    while let Some(line) = scanner.next_line()? {
        match Line::parse(line)? {
            Line::Empty => {
                if let Some(event) = record.dispatch() {
                    return Ok(Some(event));
                }
            }
            Line::Comment => {}
            Line::Field { name, value } => record.apply(name, value, retry),
        }
    }
    Ok(None)
}

/// `Some(true)` / `Some(false)` once decidable, `None` while `buf` is a
/// strict prefix of the BOM.
fn starts_with_bom(buf: &[u8]) -> Option<bool> {
    let n = buf.len().min(BOM.len());
    if buf[..n] != BOM[..n] {
        Some(false)
    } else if n == BOM.len() {
        Some(true)
    } else {
        None
    }
}

impl<S, E, B> Stream for Decoder<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    type Item = Result<Event, DecodeError<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            match *this.state {
                DecoderState::Failed => return Poll::Ready(None),
                DecoderState::Started => {
                    match next_event(this.scanner, this.record, this.retry) {
                        Ok(Some(event)) => {
                            *this.last_event_id = event.id.clone();
                            return Poll::Ready(Some(Ok(event)));
                        }
                        Ok(None) => {}
                        Err(e) => {
                            *this.state = DecoderState::Failed;
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                    if this.scanner.is_finished() {
                        return Poll::Ready(None);
                    }
                }
                DecoderState::NotStarted => {}
            }

            match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    let chunk = chunk.as_ref();
                    if chunk.is_empty() {
                        continue;
                    }
                    this.scanner.push(chunk);
                    if *this.state == DecoderState::NotStarted {
                        match starts_with_bom(this.scanner.buffered()) {
                            Some(true) => {
                                this.scanner.discard(BOM.len());
                                *this.state = DecoderState::Started;
                            }
                            Some(false) => *this.state = DecoderState::Started,
                            None => {}
                        }
                    }
                }
                Some(Err(e)) => {
                    *this.state = DecoderState::Failed;
                    return Poll::Ready(Some(Err(DecodeError::Transport(e))));
                }
                None => {
                    this.scanner.finish();
                    *this.state = DecoderState::Started;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
