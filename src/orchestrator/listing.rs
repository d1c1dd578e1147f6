//! Acquisition of every collection on a listing page.

use std::time::{Duration, Instant};

use futures_util::StreamExt;
use futures_util::stream;
use tracing::{debug, info, instrument, warn};

use super::{ListingPolicy, ListingResult, Orchestrator, derive_listing_status};
use crate::fetch::{HeaderProfile, RateLimiter, fetch_with_retry, merge_headers};

impl Orchestrator {
    /// Acquires the collections linked from a listing page.
    ///
    /// At most `collection_concurrency` collections run at once. Starts are
    /// staggered by `inter_collection_delay`: the first window opens one
    /// collection per delay, and each later collection waits one delay after
    /// taking a freed slot. All of them share one per-host rate limiter.
    /// Results keep listing order.
    #[instrument(skip(self, policy), fields(url = %url))]
    pub async fn acquire_listing(&self, url: &str, policy: &ListingPolicy) -> ListingResult {
        let started = Instant::now();
        if let Err(error) = policy.validate() {
            return failed_listing(url, error.to_string(), started);
        }

        let inner = self.inner.as_ref();
        let headers = merge_headers(HeaderProfile::html_page(url), &policy.collection.custom_headers);
        let html = match fetch_with_retry(inner.fetcher.as_ref(), url, &headers, &inner.page_retry).await {
            Ok(page) => page.text(),
            Err(error) => {
                warn!(error = %error, "listing page unavailable");
                return failed_listing(url, format!("Listing page {url}: {error}"), started);
            }
        };

        let mut links = inner.parser.extract_collection_links(&html, url);
        let total_collections_found = links.len();
        if links.is_empty() {
            warn!("no collections found on listing");
            return failed_listing(url, format!("No collections found on {url}"), started);
        }
        if let Some(limit) = policy.collection_limit() {
            links.truncate(limit);
        }
        info!(found = total_collections_found, selected = links.len(), "collections selected");

        let limiter = RateLimiter::new(policy.collection.inter_item_delay);
        let limiter = &limiter;
        let collections: Vec<_> = stream::iter(links.into_iter().enumerate())
            .map(move |(position, link)| async move {
                let wait = start_delay(position, policy.collection_concurrency, policy.inter_collection_delay);
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
                debug!(collection = %link.title, url = %link.url, "starting collection");
                self.acquire_with(&link.url, &policy.collection, limiter).await
            })
            .buffered(policy.collection_concurrency)
            .collect()
            .await;

        let errors = collections
            .iter()
            .flat_map(|result| {
                result
                    .errors
                    .iter()
                    .map(move |error| format!("Collection {}: {error}", result.collection.key))
            })
            .collect();
        let items_fetched = collections.iter().map(|result| result.items_fetched).sum();
        let status = derive_listing_status(&collections);
        info!(%status, items_fetched, collections = collections.len(), "listing finished");

        ListingResult {
            status,
            listing_url: url.to_string(),
            collections,
            errors,
            total_collections_found,
            items_fetched,
            elapsed: started.elapsed(),
        }
    }
}

/// Wait before the collection at `position` starts.
///
/// Collections in the first window all begin polling together, so their
/// waits grow with position. Later ones enter as slots free up and wait a
/// single delay.
fn start_delay(position: usize, concurrency: usize, delay: Duration) -> Duration {
    if position == 0 {
        Duration::ZERO
    } else if position < concurrency {
        delay.saturating_mul(u32::try_from(position).unwrap_or(u32::MAX))
    } else {
        delay
    }
}

fn failed_listing(url: &str, error: String, started: Instant) -> ListingResult {
    ListingResult {
        status: super::AcquisitionStatus::Failed,
        listing_url: url.to_string(),
        collections: Vec::new(),
        errors: vec![error],
        total_collections_found: 0,
        items_fetched: 0,
        elapsed: started.elapsed(),
    }
}
