//! Errors produced while decoding an event stream.

use core::{
    fmt::{Display, Formatter},
    str::Utf8Error,
};

use super::scanner::LineTooLong;

/// Failure of a [`Decoder`](super::decoder::Decoder).
///
/// Every variant ends the current stream; the event source treats all of
/// them as a dropped connection.
#[derive(Debug, PartialEq)]
pub enum DecodeError<E> {
    /// The underlying byte stream failed.
    Transport(E),
    /// A line was not valid UTF-8.
    Utf8(Utf8Error),
    /// A single line exceeded the configured capacity.
    LineTooLong(LineTooLong),
}

impl<E> From<Utf8Error> for DecodeError<E> {
    fn from(value: Utf8Error) -> Self {
        Self::Utf8(value)
    }
}

impl<E> From<LineTooLong> for DecodeError<E> {
    fn from(value: LineTooLong) -> Self {
        Self::LineTooLong(value)
    }
}

impl<E> Display for DecodeError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Utf8(e) => write!(f, "invalid UTF-8 in event stream: {e}"),
            Self::LineTooLong(e) => e.fmt(f),
        }
    }
}

impl<E> core::error::Error for DecodeError<E>
where
    E: core::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Utf8(e) => Some(e),
            Self::LineTooLong(e) => Some(e),
        }
    }
}
