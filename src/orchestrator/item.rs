//! Fetching one item with header-profile rotation.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::Run;
use crate::collection::ItemRef;
use crate::fetch::{FetchError, parse_retry_after, validate_item};

/// Fetches and validates an item, trying each header profile in order.
///
/// A profile is abandoned on any HTTP, network, timeout or validation
/// failure. After a 429 the next profile waits for the server's Retry-After
/// (or the rate-limited backoff); otherwise later profiles wait the rotation
/// delay.
///
/// # Errors
///
/// Returns a summary naming every profile's failure when all of them fail.
#[instrument(skip(run), fields(item = %item.filename, url = %item.address))]
pub(super) async fn fetch_item(run: &Run<'_>, item: &ItemRef, referer: &str) -> Result<Vec<u8>, String> {
    let inner = run.inner;
    let custom_headers = run.policy.custom_headers.as_slice();
    let mut failures = Vec::with_capacity(inner.profiles.len());
    let mut pause: Option<Duration> = None;

    for (position, profile) in inner.profiles.iter().enumerate() {
        if position > 0 {
            tokio::time::sleep(pause.take().unwrap_or(inner.profile_rotation_delay)).await;
        }
        run.limiter.acquire(&item.address).await;

        let headers = profile.materialize(referer, custom_headers);
        let outcome = match inner.fetcher.fetch(&item.address, &headers).await {
            Ok(page) => validate_item(&item.address, &page.body).map(|()| page.body),
            Err(error) => Err(error),
        };

        match outcome {
            Ok(bytes) => {
                debug!(profile = profile.name, bytes = bytes.len(), "item fetched");
                return Ok(bytes);
            }
            Err(error) => {
                if let Some(wait) = rate_limited_pause(&error, inner.rate_limited_backoff) {
                    run.limiter.record_rate_limit(&item.address, wait).await;
                    pause = Some(wait);
                }
                debug!(profile = profile.name, error = %error, "profile failed for item");
                failures.push(format!("{}: {error}", profile.name));
            }
        }
    }

    warn!(profiles = failures.len(), "all header profiles failed");
    Err(format!(
        "{}: all {} header profiles failed ({})",
        item.filename,
        failures.len(),
        failures.join("; ")
    ))
}

fn rate_limited_pause(error: &FetchError, fallback: Duration) -> Option<Duration> {
    (error.status() == Some(429)).then(|| {
        error
            .retry_after()
            .and_then(parse_retry_after)
            .unwrap_or(fallback)
    })
}
