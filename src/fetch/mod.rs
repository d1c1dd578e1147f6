//! HTTP fetching of pages and items.
//!
//! # Features
//!
//! - [`PageFetcher`] trait so discovery and acquisition can run against mocks
//! - [`HttpFetcher`]: one shared reqwest client (10 s connect, 30 s read)
//! - Browser-like [`HeaderProfile`]s rotated per item
//! - Per-host pacing ([`RateLimiter`]) and retry with backoff for page fetches
//! - Item validation (block pages, truncated or undecodable images)

mod client;
mod constants;
mod error;
mod profiles;
pub mod rate_limiter;
mod retry;
mod validate;

pub use client::HttpFetcher;
pub use constants::{
    CONNECT_TIMEOUT_SECS, MIN_ITEM_BYTES, PROFILE_ROTATION_DELAY, RATE_LIMITED_BACKOFF,
    READ_TIMEOUT_SECS,
};
pub use error::FetchError;
pub use profiles::{HeaderProfile, merge_headers};
pub use rate_limiter::{RateLimiter, extract_domain, parse_retry_after};
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error, fetch_with_retry,
};
pub use validate::validate_item;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// A successful (2xx) response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Content-Type header, if any.
    pub content_type: Option<String>,
    /// Raw body.
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Returns the body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Malformed`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_slice(&self.body).map_err(|e| FetchError::malformed(&self.url, e.to_string()))
    }
}

/// Fetches a URL with the given headers.
///
/// Implementations must treat non-2xx statuses as errors and must not retry
/// on their own; retry and profile rotation belong to callers.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Performs a GET request.
    async fn fetch(&self, url: &str, headers: &[(String, String)]) -> Result<FetchedPage, FetchError>;
}
