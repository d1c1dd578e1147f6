//! Item discovery for one member page.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::DiscoveryError;
use crate::browser::{ScriptableBrowser, SettlePlan};
use crate::fetch::{HeaderProfile, PageFetcher, RetryPolicy, fetch_with_retry, merge_headers};
use crate::parser::PageParser;

/// Finds the item sources of a member page.
///
/// The plain page is parsed first; when it yields nothing (or cannot be
/// fetched) the page is settled in the browser, scrolling until lazy images
/// have loaded, and parsed again.
pub struct ItemResolver {
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn PageParser>,
    browser: Arc<dyn ScriptableBrowser>,
    retry: RetryPolicy,
    plan: SettlePlan,
}

impl ItemResolver {
    /// Creates the resolver.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        parser: Arc<dyn PageParser>,
        browser: Arc<dyn ScriptableBrowser>,
    ) -> Self {
        Self {
            fetcher,
            parser,
            browser,
            retry: RetryPolicy::default(),
            plan: SettlePlan::item_page(),
        }
    }

    /// Overrides the retry policy for the page fetch.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the ordered, de-duplicated item addresses of a member page.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NoItems`] when neither the page nor the
    /// browser yields items, or [`DiscoveryError::StrategyFailed`] when both
    /// could not load the page at all.
    #[instrument(skip(self, custom_headers), fields(url = %url))]
    pub async fn resolve(&self, url: &str, custom_headers: &[(String, String)]) -> Result<Vec<String>, DiscoveryError> {
        let headers = merge_headers(HeaderProfile::html_page(url), custom_headers);
        let page_error = match fetch_with_retry(self.fetcher.as_ref(), url, &headers, &self.retry).await {
            Ok(page) => {
                let sources = self.parser.extract_item_sources(&page.text(), url);
                if !sources.is_empty() {
                    debug!(items = sources.len(), "items found in page");
                    return Ok(sources);
                }
                debug!("page has no items; trying browser");
                None
            }
            Err(error) => {
                warn!(error = %error, "member page fetch failed; trying browser");
                Some(error)
            }
        };

        match self.browser.load_and_settle(url, &self.plan).await {
            Ok(html) => {
                let sources = self.parser.extract_item_sources(&html, url);
                if sources.is_empty() {
                    Err(DiscoveryError::no_items(url))
                } else {
                    info!(items = sources.len(), "items found after browser render");
                    Ok(sources)
                }
            }
            Err(browser_error) => match page_error {
                Some(page_error) => Err(DiscoveryError::strategy_failed(
                    "item-page",
                    url,
                    format!("{page_error}; browser fallback: {browser_error}"),
                )),
                None => {
                    debug!(error = %browser_error, "browser fallback unavailable");
                    Err(DiscoveryError::no_items(url))
                }
            },
        }
    }
}

impl std::fmt::Debug for ItemResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemResolver").finish_non_exhaustive()
    }
}
