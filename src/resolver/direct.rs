//! Member discovery through a JSON member-listing endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{DiscoveryContext, DiscoveryError, DiscoveryStep, DiscoveryStrategy};
use crate::collection::DiscoveredMember;
use crate::fetch::{HeaderProfile, PageFetcher, RetryPolicy, fetch_with_retry, merge_headers};

/// Endpoint used when none is configured. `{origin}` is the collection URL's
/// scheme and authority, `{slug}` its last path segment.
pub const DEFAULT_ENDPOINT_TEMPLATE: &str = "{origin}/Comic/Services/ComicService.asmx/ChapterList?slug={slug}";

const NAME: &str = "direct-query";

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(default)]
    data: Option<Vec<ListingEntry>>,
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    #[serde(default)]
    chapter_num: Option<serde_json::Value>,
    #[serde(default)]
    chapter_name: Option<String>,
    #[serde(default)]
    chapter_slug: Option<String>,
}

/// Asks the site's listing endpoint for the members.
pub struct DirectQueryStrategy {
    fetcher: Arc<dyn PageFetcher>,
    endpoint_template: String,
    retry: RetryPolicy,
}

impl DirectQueryStrategy {
    /// Creates the strategy with an endpoint template.
    #[must_use]
    pub fn new(fetcher: Arc<dyn PageFetcher>, endpoint_template: &str) -> Self {
        Self {
            fetcher,
            endpoint_template: endpoint_template.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builds the endpoint URL for a collection URL.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidUrl`] if the URL cannot be parsed or
    /// has no slug.
    pub fn endpoint_for(&self, collection_url: &str) -> Result<String, DiscoveryError> {
        let parsed = Url::parse(collection_url).map_err(|e| DiscoveryError::invalid_url(collection_url, e.to_string()))?;
        let slug = parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
            .ok_or_else(|| DiscoveryError::invalid_url(collection_url, "URL has no path segment to use as slug"))?
            .to_string();
        let origin = parsed.origin().ascii_serialization();
        Ok(self
            .endpoint_template
            .replace("{origin}", &origin)
            .replace("{slug}", &urlencoding::encode(&slug)))
    }
}

impl std::fmt::Debug for DirectQueryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectQueryStrategy")
            .field("endpoint_template", &self.endpoint_template)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DiscoveryStrategy for DirectQueryStrategy {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip(self, ctx), fields(strategy = NAME))]
    async fn discover(&self, url: &str, ctx: &DiscoveryContext) -> Result<DiscoveryStep, DiscoveryError> {
        let endpoint = self.endpoint_for(url)?;
        let headers = merge_headers(HeaderProfile::json_listing(url), &ctx.custom_headers);
        let page = fetch_with_retry(self.fetcher.as_ref(), &endpoint, &headers, &self.retry)
            .await
            .map_err(|e| DiscoveryError::strategy_failed(NAME, url, e.to_string()))?;
        let response: ListingResponse = page
            .json()
            .map_err(|e| DiscoveryError::strategy_failed(NAME, url, e.to_string()))?;

        let Some(entries) = response.data else {
            return Err(DiscoveryError::strategy_failed(NAME, url, "response has no data list"));
        };
        let base = url.trim_end_matches('/');
        let members: Vec<DiscoveredMember> = entries
            .into_iter()
            .filter_map(|entry| {
                let slug = entry.chapter_slug.filter(|s| !s.trim().is_empty())?;
                let id = entry.chapter_num.as_ref().and_then(id_from_json);
                let title = entry
                    .chapter_name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| format!("Chapter {}", id.as_deref().unwrap_or("?")));
                Some(DiscoveredMember::new(id, title, format!("{base}/{}", slug.trim_matches('/'))))
            })
            .collect();

        debug!(members = members.len(), "endpoint listing parsed");
        if members.is_empty() {
            Ok(DiscoveryStep::Empty)
        } else {
            Ok(DiscoveryStep::Members(members))
        }
    }
}

fn id_from_json(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
