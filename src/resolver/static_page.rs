//! Member discovery from the collection page's HTML.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{DiscoveryContext, DiscoveryError, DiscoveryStep, DiscoveryStrategy};
use crate::fetch::{HeaderProfile, PageFetcher, RetryPolicy, fetch_with_retry, merge_headers};
use crate::parser::PageParser;

const NAME: &str = "static-page";

/// Parses member links out of the collection page, reusing the caller's copy
/// of the page when it has one.
pub struct StaticPageStrategy {
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn PageParser>,
    retry: RetryPolicy,
}

impl StaticPageStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new(fetcher: Arc<dyn PageFetcher>, parser: Arc<dyn PageParser>) -> Self {
        Self {
            fetcher,
            parser,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl std::fmt::Debug for StaticPageStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticPageStrategy").finish_non_exhaustive()
    }
}

#[async_trait]
impl DiscoveryStrategy for StaticPageStrategy {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip(self, ctx), fields(strategy = NAME, reused = ctx.page_html.is_some()))]
    async fn discover(&self, url: &str, ctx: &DiscoveryContext) -> Result<DiscoveryStep, DiscoveryError> {
        let html = if let Some(html) = &ctx.page_html {
            html.clone()
        } else {
            let headers = merge_headers(HeaderProfile::html_page(url), &ctx.custom_headers);
            fetch_with_retry(self.fetcher.as_ref(), url, &headers, &self.retry)
                .await
                .map_err(|e| DiscoveryError::strategy_failed(NAME, url, e.to_string()))?
                .text()
        };

        let members = self.parser.extract_member_links(&html, url);
        debug!(members = members.len(), "member links parsed");
        if members.is_empty() {
            Ok(DiscoveryStep::Empty)
        } else {
            Ok(DiscoveryStep::Members(members))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, FetchedPage};
    use crate::parser::SelectorParser;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PAGE: &str = r#"<html><body><div class="list-chapter">
        <div class="row"><div class="chapter"><a href="/truyen-tranh/abc/chuong-2">Chapter 2</a></div></div>
        <div class="row"><div class="chapter"><a href="/truyen-tranh/abc/chuong-1">Chapter 1</a></div></div>
    </div></body></html>"#;

    struct CountingFetcher {
        body: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for CountingFetcher {
        async fn fetch(&self, url: &str, _headers: &[(String, String)]) -> Result<FetchedPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(FetchedPage {
                url: url.to_string(),
                status: 200,
                content_type: Some("text/html".into()),
                body: self.body.as_bytes().to_vec(),
            })
        }
    }

    fn strategy(fetcher: Arc<CountingFetcher>) -> StaticPageStrategy {
        StaticPageStrategy::new(fetcher, Arc::new(SelectorParser::with_defaults().unwrap()))
            .with_retry(RetryPolicy::no_retry())
    }

    #[tokio::test]
    async fn test_reuses_prefetched_page() {
        let fetcher = Arc::new(CountingFetcher {
            body: "",
            calls: AtomicUsize::new(0),
        });
        let ctx = DiscoveryContext::new().with_page_html(PAGE);
        let step = strategy(Arc::clone(&fetcher))
            .discover("https://site.test/truyen-tranh/abc", &ctx)
            .await
            .unwrap();
        let DiscoveryStep::Members(members) = step else {
            panic!("expected members");
        };
        assert_eq!(members.len(), 2);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetches_when_no_page_given() {
        let fetcher = Arc::new(CountingFetcher {
            body: PAGE,
            calls: AtomicUsize::new(0),
        });
        let step = strategy(Arc::clone(&fetcher))
            .discover("https://site.test/truyen-tranh/abc", &DiscoveryContext::new())
            .await
            .unwrap();
        assert!(matches!(step, DiscoveryStep::Members(ref m) if m.len() == 2));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_page_without_links_is_empty() {
        let fetcher = Arc::new(CountingFetcher {
            body: "<html><body><p>nothing</p></body></html>",
            calls: AtomicUsize::new(0),
        });
        let step = strategy(fetcher)
            .discover("https://site.test/truyen-tranh/abc", &DiscoveryContext::new())
            .await
            .unwrap();
        assert_eq!(step, DiscoveryStep::Empty);
    }
}
