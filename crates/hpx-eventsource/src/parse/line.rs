//! Field grammar for a single scanned line.

use core::str::Utf8Error;

use bytes::Bytes;
use bytes_utils::Str;

use super::constants::{COLON, EMPTY_STR};

/// Recognised field names; anything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldName {
    Event,
    Data,
    Id,
    Retry,
    Ignored,
}

impl FieldName {
    fn from_bytes(name: &[u8]) -> Self {
        match name {
            b"event" => Self::Event,
            b"data" => Self::Data,
            b"id" => Self::Id,
            b"retry" => Self::Retry,
            _ => Self::Ignored,
        }
    }
}

/// One classified line of an event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Line {
    /// Blank line: dispatch boundary.
    Empty,
    /// Starts with `:`.
    Comment,
    /// `name: value`, or a bare `name` which carries an empty value.
    Field { name: FieldName, value: Str },
}

impl Line {
    /// Classify `line`, which must already have its terminator stripped.
    ///
    /// Only the value of a recognised field is UTF-8 validated; comments and
    /// unknown fields are skipped without inspection.
    pub(crate) fn parse(line: Bytes) -> Result<Self, Utf8Error> {
        if line.is_empty() {
            return Ok(Self::Empty);
        }

        let (name, value) = match memchr::memchr(COLON, &line) {
            Some(0) => return Ok(Self::Comment),
            Some(colon) => {
                let start = match line.get(colon + 1) {
                    Some(b' ') => colon + 2,
                    _ => colon + 1,
                };
                (FieldName::from_bytes(&line[..colon]), line.slice(start..))
            }
            None => (FieldName::from_bytes(&line), Bytes::new()),
        };

        if name == FieldName::Ignored {
            return Ok(Self::Field {
                name,
                value: EMPTY_STR,
            });
        }

        Ok(Self::Field {
            name,
            value: validate_utf8(value)?,
        })
    }
}

fn validate_utf8(bytes: Bytes) -> Result<Str, Utf8Error> {
    core::str::from_utf8(&bytes)?;
    // Safety: the bytes were validated as UTF-8 just above.
    Ok(unsafe { Str::from_inner_unchecked(bytes) })
}
