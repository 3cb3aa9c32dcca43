//! Connection lifecycle states exposed to consumers.

use std::fmt;

/// The `readyState` of an [`EventSource`](crate::EventSource).
///
/// The numeric values are fixed by the EventSource interface and are safe
/// to log or compare across implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum ReadyState {
    /// Establishing, or re-establishing, the stream.
    Connecting = 0,
    /// Streaming events.
    Open = 1,
    /// [`close`](crate::EventSourceHandle::close) was called; teardown in progress.
    Closing = 2,
    /// Terminal. No further reconnection happens.
    Closed = 3,
}

impl ReadyState {
    /// The protocol-visible numeric value.
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns `true` while events are flowing.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` once the source is `Closing` or `Closed`.
    pub fn is_shutting_down(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }

    /// Returns `true` if the state is terminal.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl TryFrom<u16> for ReadyState {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Connecting),
            1 => Ok(Self::Open),
            2 => Ok(Self::Closing),
            3 => Ok(Self::Closed),
            other => Err(other),
        }
    }
}

impl From<ReadyState> for u16 {
    fn from(state: ReadyState) -> Self {
        state.as_u16()
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "Connecting",
            Self::Open => "Open",
            Self::Closing => "Closing",
            Self::Closed => "Closed",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_encoding_is_stable() {
        for (number, state) in [
            (0, ReadyState::Connecting),
            (1, ReadyState::Open),
            (2, ReadyState::Closing),
            (3, ReadyState::Closed),
        ] {
            assert_eq!(ReadyState::try_from(number), Ok(state));
            assert_eq!(state.as_u16(), number);
            assert_eq!(u16::from(state), number);
        }
        assert_eq!(ReadyState::try_from(4), Err(4));
    }

    #[test]
    fn display_uses_variant_names() {
        assert_eq!(ReadyState::Connecting.to_string(), "Connecting");
        assert_eq!(ReadyState::Open.to_string(), "Open");
        assert_eq!(ReadyState::Closing.to_string(), "Closing");
        assert_eq!(ReadyState::Closed.to_string(), "Closed");
    }

    #[test]
    fn predicates() {
        assert!(ReadyState::Open.is_open());
        assert!(!ReadyState::Connecting.is_open());
        assert!(!ReadyState::Open.is_shutting_down());
        assert!(ReadyState::Closing.is_shutting_down());
        assert!(ReadyState::Closed.is_shutting_down());
        assert!(ReadyState::Closed.is_closed());
        assert!(!ReadyState::Closing.is_closed());
    }
}
