//! Event source configuration.

use std::time::Duration;

use crate::parse::DEFAULT_RETRY;

/// Configuration for an [`EventSource`](crate::EventSource).
///
/// Build with [`EventSourceConfig::new`] and the chainable setters; every
/// field not set keeps the default listed on its setter.
#[derive(Clone, Debug)]
pub struct EventSourceConfig {
    /// Stream URL. Must be absolute.
    pub url: String,
    /// Extra headers sent with every connection attempt.
    pub headers: http::HeaderMap,
    /// Upper bound on connecting and receiving response headers.
    pub connect_timeout: Duration,
    /// Reconnection delay until the server sends a `retry:` field.
    pub retry: Duration,
    /// Fail the current stream when a single line grows past this many bytes.
    pub max_line_length: Option<usize>,
    /// Events decoded ahead of the consumer before the reader blocks.
    pub event_channel_capacity: usize,
    /// Consecutive failed reconnect attempts tolerated (None = unlimited).
    pub reconnect_max_attempts: Option<u32>,
}

impl Default for EventSourceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            headers: http::HeaderMap::new(),
            connect_timeout: Duration::from_secs(10),
            retry: DEFAULT_RETRY,
            max_line_length: None,
            event_channel_capacity: 1,
            reconnect_max_attempts: None,
        }
    }
}

impl EventSourceConfig {
    /// Create a configuration for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set additional request headers.
    #[must_use]
    pub fn headers(mut self, headers: http::HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the connection timeout (default 10 s).
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the initial retry interval (default 3 s).
    #[must_use]
    pub fn retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    /// Cap the length of a single line (default unbounded).
    #[must_use]
    pub fn max_line_length(mut self, limit: Option<usize>) -> Self {
        self.max_line_length = limit;
        self
    }

    /// Set the event channel capacity (default 1).
    #[must_use]
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Limit consecutive failed reconnect attempts (default unlimited).
    #[must_use]
    pub fn reconnect_max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.reconnect_max_attempts = attempts;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message string if any field has an invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("URL cannot be empty".to_string());
        }
        let uri: http::Uri = self
            .url
            .parse()
            .map_err(|e| format!("Invalid URL {:?}: {e}", self.url))?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(format!("URL must be absolute: {:?}", self.url));
        }
        if self.connect_timeout.is_zero() {
            return Err("Connect timeout must be > 0".to_string());
        }
        if self.max_line_length == Some(0) {
            return Err("Max line length must be > 0".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err("Event channel capacity must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EventSourceConfig::default();
        assert!(config.url.is_empty());
        assert!(config.headers.is_empty());
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.retry, Duration::from_millis(3000));
        assert!(config.max_line_length.is_none());
        assert_eq!(config.event_channel_capacity, 1);
        assert!(config.reconnect_max_attempts.is_none());
    }

    #[test]
    fn test_all_builder_methods() {
        let mut headers = http::HeaderMap::new();
        headers.insert("Authorization", "Bearer t0k".parse().expect("valid header value"));

        let config = EventSourceConfig::new("http://127.0.0.1:8080/events")
            .headers(headers)
            .connect_timeout(Duration::from_secs(2))
            .retry(Duration::from_millis(250))
            .max_line_length(Some(64 * 1024))
            .event_channel_capacity(16)
            .reconnect_max_attempts(Some(3));

        assert_eq!(config.url, "http://127.0.0.1:8080/events");
        assert_eq!(
            config
                .headers
                .get("Authorization")
                .map(|v| v.to_str().expect("valid str")),
            Some("Bearer t0k")
        );
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.retry, Duration::from_millis(250));
        assert_eq!(config.max_line_length, Some(64 * 1024));
        assert_eq!(config.event_channel_capacity, 16);
        assert_eq!(config.reconnect_max_attempts, Some(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_empty_url() {
        let result = EventSourceConfig::default().validate();
        assert_eq!(result.expect_err("should fail"), "URL cannot be empty");
    }

    #[test]
    fn test_validation_relative_url() {
        let result = EventSourceConfig::new("/events").validate();
        assert!(result.expect_err("should fail").starts_with("URL must be absolute"));

        let result = EventSourceConfig::new("http://exa mple.com").validate();
        assert!(result.expect_err("should fail").starts_with("Invalid URL"));
    }

    #[test]
    fn test_validation_zero_values() {
        let base = EventSourceConfig::new("http://example.com/stream");

        let result = base.clone().connect_timeout(Duration::ZERO).validate();
        assert_eq!(result.expect_err("should fail"), "Connect timeout must be > 0");

        let result = base.clone().max_line_length(Some(0)).validate();
        assert_eq!(result.expect_err("should fail"), "Max line length must be > 0");

        let result = base.clone().event_channel_capacity(0).validate();
        assert_eq!(
            result.expect_err("should fail"),
            "Event channel capacity must be > 0"
        );

        // A zero retry interval is legal: reconnect immediately.
        assert!(base.retry(Duration::ZERO).validate().is_ok());
    }
}
