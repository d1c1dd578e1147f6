//! Constants for the fetch module (timeouts, rate limiting, validation).

use std::time::Duration;

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default HTTP read timeout (30 seconds).
pub const READ_TIMEOUT_SECS: u64 = 30;

/// Warning threshold for cumulative rate limit delay per domain (30 seconds).
pub const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Bodies smaller than this are suspected error pages rather than images.
pub const MIN_ITEM_BYTES: usize = 1000;

/// Pause before trying the next header profile for the same item.
pub const PROFILE_ROTATION_DELAY: Duration = Duration::from_secs(1);

/// Pause after an HTTP 429 when the server sent no usable Retry-After.
pub const RATE_LIMITED_BACKOFF: Duration = Duration::from_secs(2);
