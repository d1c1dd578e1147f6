//! Retry with exponential backoff for page and listing fetches.
//!
//! Item fetches do not retry the same request: they rotate header profiles
//! instead (see the orchestrator). Page fetches (collection pages, member
//! pages, listing endpoints) retry transient failures here.
//!
//! # Example
//!
//! ```
//! use series_downloader::fetch::{FetchError, FailureType, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let error = FetchError::http_status("https://site.test/truyen-tranh/abc", 503);
//! assert_eq!(classify_error(&error), FailureType::Transient);
//! assert!(matches!(policy.should_retry(FailureType::Transient, 1), RetryDecision::Retry { .. }));
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument, warn};

use super::rate_limiter::parse_retry_after;
use super::{FetchError, FetchedPage, PageFetcher};

/// Default maximum attempts for page fetches (including the first).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(16);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry (timeouts, 5xx, connection resets).
    Transient,
    /// Failure that will not change on retry (404, invalid URL, undecodable content).
    Permanent,
    /// Access refused (401, 403); another header profile may still succeed.
    Refused,
    /// Server rate limiting (HTTP 429).
    RateLimited,
}

/// Decision on whether to retry a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the delay.
    Retry {
        /// How long to wait first.
        delay: Duration,
        /// The attempt number about to run (1-indexed).
        attempt: u32,
    },
    /// Give up.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Exponential backoff configuration.
///
/// `delay = min(base * multiplier^(attempt-1), max) + jitter`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with explicit settings.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Creates a policy with custom `max_attempts` and default backoff.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::with_max_attempts(1)
    }

    /// Returns the maximum number of attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides whether to retry after `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::Refused => {
                return RetryDecision::DoNotRetry {
                    reason: "access refused - repeating the same request would not help"
                        .to_string(),
                };
            }
            FailureType::Transient | FailureType::RateLimited => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);
        debug!(attempt, delay_ms = delay.as_millis(), "will retry");
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = (base_ms * self.backoff_multiplier.powf(exponent))
            .min(self.max_delay.as_millis() as f64);
        let jitter_ms = rand::thread_rng().gen_range(0..=MAX_JITTER.as_millis() as u64);
        Duration::from_millis(delay_ms as u64) + Duration::from_millis(jitter_ms)
    }
}

/// Classifies a fetch error for retry and rotation decisions.
///
/// | Error | Type |
/// |-------|------|
/// | 401, 403 | Refused |
/// | 408, 5xx | Transient |
/// | 429 | RateLimited |
/// | other 4xx | Permanent |
/// | Timeout, Network (non-TLS) | Transient |
/// | Blocked | Refused |
/// | InvalidUrl, InvalidContent, Malformed | Permanent |
#[must_use]
pub fn classify_error(error: &FetchError) -> FailureType {
    match error {
        FetchError::HttpStatus { status, .. } => classify_http_status(*status),
        FetchError::Timeout { .. } => FailureType::Transient,
        FetchError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        FetchError::Blocked { .. } => FailureType::Refused,
        FetchError::InvalidUrl { .. }
        | FetchError::ClientBuild { .. }
        | FetchError::InvalidContent { .. }
        | FetchError::Malformed { .. } => FailureType::Permanent,
    }
}

#[allow(clippy::match_same_arms)]
fn classify_http_status(status: u16) -> FailureType {
    match status {
        401 | 403 => FailureType::Refused,
        408 => FailureType::Transient,
        429 => FailureType::RateLimited,
        400..=499 => FailureType::Permanent,
        500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    let message = error.to_string().to_lowercase();
    message.contains("certificate") || message.contains("tls") || message.contains("ssl")
}

/// Fetches a page, retrying transient failures per the policy.
///
/// A 429 waits for the server's Retry-After when it sent one.
///
/// # Errors
///
/// Returns the last [`FetchError`] when attempts are exhausted or the failure
/// is not retryable.
#[instrument(skip(fetcher, headers, policy), fields(url = %url))]
pub async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    url: &str,
    headers: &[(String, String)],
    policy: &RetryPolicy,
) -> Result<FetchedPage, FetchError> {
    let mut attempt = 1;
    loop {
        match fetcher.fetch(url, headers).await {
            Ok(page) => return Ok(page),
            Err(error) => {
                let failure_type = classify_error(&error);
                match policy.should_retry(failure_type, attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next,
                    } => {
                        let delay = error
                            .retry_after()
                            .and_then(parse_retry_after)
                            .unwrap_or(delay);
                        warn!(
                            error = %error,
                            attempt,
                            delay_ms = delay.as_millis(),
                            "page fetch failed; retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt = next;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(error = %error, reason = %reason, "page fetch failed");
                        return Err(error);
                    }
                }
            }
        }
    }
}
