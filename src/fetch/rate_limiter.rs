//! Per-domain pacing of item requests.
//!
//! Items of one member usually come from one image host. The [`RateLimiter`]
//! spaces consecutive requests to the same host by the configured inter-item
//! delay, and lets a server-mandated pause (HTTP 429 with `Retry-After`)
//! push the next permitted request further out. Requests to different hosts
//! do not wait on each other, so concurrent members fetching from distinct
//! CDNs proceed in parallel.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use series_downloader::fetch::RateLimiter;
//!
//! # async fn example() {
//! let limiter = Arc::new(RateLimiter::new(Duration::from_millis(500)));
//!
//! // First request to a host proceeds immediately
//! limiter.acquire("https://cdn.example.com/001.jpg").await;
//!
//! // Second request to the same host waits out the remaining delay
//! limiter.acquire("https://cdn.example.com/002.jpg").await;
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::{CUMULATIVE_DELAY_WARNING_THRESHOLD, MAX_RETRY_AFTER};

/// Per-domain request pacing shared across member tasks.
///
/// Wrap in `Arc` and clone into every task that fetches items. Per-host state
/// lives in a `DashMap`; the map guard is released before awaiting on the
/// host's own `tokio::sync::Mutex`.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum spacing between requests to the same host.
    delay: Duration,

    /// Whether pacing is disabled (delay of zero).
    disabled: bool,

    hosts: DashMap<String, Arc<HostState>>,
}

#[derive(Debug)]
struct HostState {
    /// Earliest instant the next request may start. `None` until the first request.
    next_allowed: Mutex<Option<Instant>>,

    /// Total time spent waiting on this host, in milliseconds.
    waited_ms: AtomicU64,
}

impl HostState {
    fn new() -> Self {
        Self {
            next_allowed: Mutex::new(None),
            waited_ms: AtomicU64::new(0),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_wait(&self, wait: Duration) -> Duration {
        let wait_ms = wait.as_millis() as u64;
        let total = self.waited_ms.fetch_add(wait_ms, Ordering::SeqCst) + wait_ms;
        Duration::from_millis(total)
    }
}

impl RateLimiter {
    /// Creates a limiter that spaces same-host requests by `delay`.
    ///
    /// A zero delay yields a disabled limiter.
    #[must_use]
    #[instrument(skip_all, fields(delay_ms = delay.as_millis()))]
    pub fn new(delay: Duration) -> Self {
        if delay.is_zero() {
            return Self::disabled();
        }
        debug!("creating rate limiter");
        Self {
            delay,
            disabled: false,
            hosts: DashMap::new(),
        }
    }

    /// Creates a limiter that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            delay: Duration::ZERO,
            disabled: true,
            hosts: DashMap::new(),
        }
    }

    /// Returns whether pacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the configured spacing.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits until a request to the URL's host is permitted, then claims the slot.
    #[instrument(skip(self), fields(domain))]
    pub async fn acquire(&self, url: &str) {
        let domain = extract_domain(url);
        tracing::Span::current().record("domain", &domain);

        let state = self.host_state(&domain);
        let mut next_allowed = state.next_allowed.lock().await;

        if let Some(at) = *next_allowed {
            let now = Instant::now();
            if at > now {
                let wait = at - now;
                let total = state.add_wait(wait);
                debug!(
                    domain = %domain,
                    wait_ms = wait.as_millis(),
                    total_ms = total.as_millis(),
                    "pacing request"
                );
                if total >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
                    warn!(
                        domain = %domain,
                        total_wait_secs = total.as_secs(),
                        "long cumulative wait on host"
                    );
                }
                tokio::time::sleep(wait).await;
            }
        } else {
            debug!(domain = %domain, "first request to host");
        }

        if !self.disabled {
            *next_allowed = Some(Instant::now() + self.delay);
        }
    }

    /// Pushes the host's next permitted request out by a server-mandated pause.
    ///
    /// Applies even when pacing is disabled: a 429 is the server's decision.
    #[instrument(skip(self), fields(domain))]
    pub async fn record_rate_limit(&self, url: &str, pause: Duration) {
        let domain = extract_domain(url);
        tracing::Span::current().record("domain", &domain);

        let state = self.host_state(&domain);
        let mut next_allowed = state.next_allowed.lock().await;
        let candidate = Instant::now() + pause;
        if next_allowed.is_none_or(|at| at < candidate) {
            *next_allowed = Some(candidate);
        }
        debug!(domain = %domain, pause_ms = pause.as_millis(), "recorded server rate limit");
    }

    fn host_state(&self, domain: &str) -> Arc<HostState> {
        self.hosts
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(HostState::new()))
            .clone()
    }
}

/// Extracts the lowercase host from a URL, or `"unknown"` when unparseable.
///
/// # Examples
///
/// ```
/// use series_downloader::fetch::rate_limiter::extract_domain;
///
/// assert_eq!(extract_domain("https://CDN.example.com/a.jpg"), "cdn.example.com");
/// assert_eq!(extract_domain("not a url"), "unknown");
/// ```
#[must_use]
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a Retry-After header value (integer seconds or HTTP-date).
///
/// Returns `None` when unparseable or negative; caps values at one hour; past
/// dates yield zero.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use series_downloader::fetch::rate_limiter::parse_retry_after;
///
/// assert_eq!(parse_retry_after("3"), Some(Duration::from_secs(3)));
/// assert_eq!(parse_retry_after("soon"), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let seconds = u64::try_from(seconds).ok()?;
        return Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER));
    }

    let datetime = httpdate::parse_http_date(header_value).ok()?;
    let duration = datetime
        .duration_since(std::time::SystemTime::now())
        .unwrap_or(Duration::ZERO);
    if duration > MAX_RETRY_AFTER {
        warn!(
            delay_secs = duration.as_secs(),
            "Retry-After date exceeds maximum, capping at 1 hour"
        );
    }
    Some(duration.min(MAX_RETRY_AFTER))
}
