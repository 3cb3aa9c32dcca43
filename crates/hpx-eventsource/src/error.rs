//! Error handling for the event source.

use std::time::Duration;

use thiserror::Error;

/// Boxed error used at the transport seam.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main result type of this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while opening or running an event source.
///
/// Use [`is_permanent`](Error::is_permanent) to tell rejections, which end
/// the source, from failures that only schedule a reconnect.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The response was not `text/event-stream`.
    #[error("Unexpected content type: {}", .content_type.as_deref().unwrap_or("<none>"))]
    ContentType { content_type: Option<String> },

    /// The server answered with something other than `200 OK`.
    #[error("Unexpected status: {status}")]
    Status { status: http::StatusCode },

    /// Connecting, or reading the body, failed.
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// No response headers arrived within the connect timeout.
    #[error("Connection timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// The source was closed before it connected, or was already started.
    #[error("Event source is closed")]
    Closed,
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a content-type rejection.
    pub fn content_type(content_type: Option<&str>) -> Self {
        Self::ContentType {
            content_type: content_type.map(str::to_owned),
        }
    }

    /// Create a status rejection.
    pub fn status(status: http::StatusCode) -> Self {
        Self::Status { status }
    }

    /// Wrap a transport failure.
    pub fn transport(error: impl Into<BoxError>) -> Self {
        Self::Transport(error.into())
    }

    /// Create a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Returns `true` for rejections that must not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::ContentType { .. } | Self::Status { .. } | Self::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("URL cannot be empty");
        assert!(matches!(err, Error::Config { .. }));

        let err = Error::timeout(Duration::from_secs(5));
        assert!(matches!(err, Error::Timeout { .. }));

        let err = Error::content_type(Some("text/plain"));
        assert_eq!(err.to_string(), "Unexpected content type: text/plain");

        let err = Error::content_type(None);
        assert_eq!(err.to_string(), "Unexpected content type: <none>");
    }

    #[test]
    fn test_permanent_classification() {
        assert!(Error::content_type(Some("application/json")).is_permanent());
        assert!(Error::status(http::StatusCode::NO_CONTENT).is_permanent());
        assert!(Error::Closed.is_permanent());

        assert!(!Error::transport("connection reset").is_permanent());
        assert!(!Error::timeout(Duration::from_millis(1)).is_permanent());
    }
}
