//! Member and item discovery.
//!
//! Member lists come from a chain of strategies tried in priority order until
//! one yields members. The chain is uniform: every strategy returns a
//! [`DiscoveryStep`] or an error, and the resolver moves on from both
//! `Empty` and errors.
//!
//! # Architecture
//!
//! - [`DiscoveryStrategy`] - Async trait each strategy implements
//! - [`DiscoveryResolver`] - Ordered strategy chain plus normalization
//! - [`DirectQueryStrategy`] - JSON member-listing endpoint
//! - [`StaticPageStrategy`] - Member links in the fetched HTML
//! - [`InteractivePageStrategy`] - Member links after "load more" in a browser
//! - [`ItemResolver`] - Item sources of one member page, with browser fallback

mod direct;
mod error;
mod interactive;
mod items;
mod registry;
mod static_page;

pub use direct::{DEFAULT_ENDPOINT_TEMPLATE, DirectQueryStrategy};
pub use error::DiscoveryError;
pub use interactive::InteractivePageStrategy;
pub use items::ItemResolver;
pub use registry::DiscoveryResolver;
pub use static_page::StaticPageStrategy;

use std::sync::Arc;

use async_trait::async_trait;

use crate::browser::ScriptableBrowser;
use crate::collection::DiscoveredMember;
use crate::fetch::PageFetcher;
use crate::parser::PageParser;

/// Result of one strategy's attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryStep {
    /// Members found, in discovery order.
    Members(Vec<DiscoveredMember>),
    /// The strategy ran but found nothing.
    Empty,
}

/// Per-call inputs shared by all strategies.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryContext {
    /// HTML of the collection page when the caller already fetched it.
    pub page_html: Option<String>,
    /// Headers applied on top of every request.
    pub custom_headers: Vec<(String, String)>,
}

impl DiscoveryContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the already-fetched collection page.
    #[must_use]
    pub fn with_page_html(mut self, html: impl Into<String>) -> Self {
        self.page_html = Some(html.into());
        self
    }

    /// Attaches caller headers.
    #[must_use]
    pub fn with_custom_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.custom_headers = headers;
        self
    }
}

/// A way of listing a collection's members.
///
/// Uses `async_trait` so strategies can be held as `Box<dyn DiscoveryStrategy>`.
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    /// Short name for logs and errors.
    fn name(&self) -> &str;

    /// Attempts to list the members of the collection at `url`.
    async fn discover(&self, url: &str, ctx: &DiscoveryContext) -> Result<DiscoveryStep, DiscoveryError>;
}

/// Builds the default three-strategy chain.
///
/// `endpoint_template` overrides [`DEFAULT_ENDPOINT_TEMPLATE`] for the direct
/// query; `max_interactions` bounds "load more" clicks.
#[must_use]
pub fn build_default_discovery_resolver(
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn PageParser>,
    browser: Arc<dyn ScriptableBrowser>,
    endpoint_template: Option<&str>,
    max_interactions: usize,
) -> DiscoveryResolver {
    let mut resolver = DiscoveryResolver::new();
    resolver.register(Box::new(DirectQueryStrategy::new(
        Arc::clone(&fetcher),
        endpoint_template.unwrap_or(DEFAULT_ENDPOINT_TEMPLATE),
    )));
    resolver.register(Box::new(StaticPageStrategy::new(fetcher, Arc::clone(&parser))));
    resolver.register(Box::new(InteractivePageStrategy::new(browser, parser, max_interactions)));
    resolver
}
