//! Error types for the fetch module.

use thiserror::Error;

/// Errors that can occur while fetching a page or an item.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (for 429 responses).
        retry_after: Option<String>,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The server answered with a short block or error page instead of content.
    #[error("blocked response fetching {url} ({bytes} bytes)")]
    Blocked {
        /// The URL that was blocked.
        url: String,
        /// Size of the returned body.
        bytes: usize,
    },

    /// The body was received but is not usable content.
    #[error("invalid content from {url}: {reason}")]
    InvalidContent {
        /// The URL whose content was rejected.
        url: String,
        /// Why the content was rejected.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {reason}")]
    ClientBuild {
        /// Builder failure message.
        reason: String,
    },

    /// A structured response could not be decoded.
    #[error("malformed response from {url}: {reason}")]
    Malformed {
        /// The URL whose response could not be decoded.
        url: String,
        /// Decoder message.
        reason: String,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a blocked-response error.
    pub fn blocked(url: impl Into<String>, bytes: usize) -> Self {
        Self::Blocked {
            url: url.into(),
            bytes,
        }
    }

    /// Creates an invalid-content error.
    pub fn invalid_content(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidContent {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a client construction error.
    pub fn client_build(reason: impl Into<String>) -> Self {
        Self::ClientBuild {
            reason: reason.into(),
        }
    }

    /// Creates a malformed-response error.
    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Returns the HTTP status for status errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw Retry-After value for status errors that carried one.
    #[must_use]
    pub fn retry_after(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }
}

// Constructors take the URL context explicitly; there is no
// `From<reqwest::Error>` because the source error does not carry it.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_http_status_display() {
        let error = FetchError::http_status("https://cdn.test/001.jpg", 403);
        let msg = error.to_string();
        assert!(msg.contains("403"), "Expected '403' in: {msg}");
        assert!(msg.contains("https://cdn.test/001.jpg"), "Expected URL in: {msg}");
        assert_eq!(error.status(), Some(403));
    }

    #[test]
    fn test_fetch_error_retry_after_accessor() {
        let error = FetchError::http_status_with_retry_after(
            "https://cdn.test/x.jpg",
            429,
            Some("5".to_string()),
        );
        assert_eq!(error.retry_after(), Some("5"));
        assert_eq!(FetchError::timeout("u").retry_after(), None);
    }

    #[test]
    fn test_fetch_error_blocked_display() {
        let msg = FetchError::blocked("https://cdn.test/x.jpg", 120).to_string();
        assert!(msg.contains("blocked"), "Expected 'blocked' in: {msg}");
        assert!(msg.contains("120 bytes"), "Expected size in: {msg}");
    }

    #[test]
    fn test_fetch_error_invalid_content_display() {
        let msg = FetchError::invalid_content("https://cdn.test/x.jpg", "not an image").to_string();
        assert!(msg.contains("not an image"), "Expected reason in: {msg}");
    }

    #[test]
    fn test_fetch_error_invalid_url_display() {
        let msg = FetchError::invalid_url("not-a-url").to_string();
        assert!(msg.contains("invalid URL"));
        assert!(msg.contains("not-a-url"));
    }
}
