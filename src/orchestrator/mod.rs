//! Acquisition of collections and listings.
//!
//! The orchestrator drives one collection through discovery, filtering and
//! bounded-concurrency member acquisition, then aggregates what happened into
//! an [`AcquisitionResult`]. Listings fan out over collections the same way.
//!
//! No run ever aborts on a member or item failure: failures are recorded in
//! the outcomes and reflected in the aggregate status.
//!
//! # Example
//!
//! ```no_run
//! use series_downloader::orchestrator::{AcquisitionPolicy, Orchestrator};
//! use series_downloader::storage::{StorageBuilder, StorageMode};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = StorageBuilder::new(StorageMode::Filesystem { root: "downloads".into() })
//!     .build()
//!     .await;
//! let orchestrator = Orchestrator::builder(storage).build()?;
//! let result = orchestrator
//!     .acquire("https://site.test/series/abc", &AcquisitionPolicy::default())
//!     .await;
//! println!("{}: {} items fetched", result.status, result.items_fetched);
//! # Ok(())
//! # }
//! ```

mod error;
mod item;
mod listing;
mod member;
mod observer;
mod page_images;
mod policy;
mod result;

pub use error::OrchestratorError;
pub use observer::{AcquisitionObserver, NoopObserver};
pub use policy::{
    AcquisitionPolicy, DEFAULT_COLLECTION_CONCURRENCY, DEFAULT_INTER_COLLECTION_DELAY,
    DEFAULT_INTER_ITEM_DELAY, DEFAULT_INTER_MEMBER_DELAY, DEFAULT_MEMBER_CONCURRENCY,
    ListingPolicy, MAX_CONCURRENCY,
};
pub use page_images::{
    DEFAULT_MAX_PAGE_IMAGES, PageImage, PageImagesPolicy, PageImagesResult, page_folder,
};
pub use result::{
    AcquisitionResult, AcquisitionStatus, CollectionPreview, ListingResult, MemberOutcome,
    MemberState, derive_listing_status, derive_status,
};

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use futures_util::stream;
use tracing::{info, instrument, warn};

use crate::browser::{ChromiumBrowser, DEFAULT_MAX_INTERACTIONS, ScriptableBrowser};
use crate::collection::{CollectionRef, MemberRef, UNKNOWN_COLLECTION};
use crate::fetch::{
    HeaderProfile, HttpFetcher, PROFILE_ROTATION_DELAY, PageFetcher, RATE_LIMITED_BACKOFF,
    RateLimiter, RetryPolicy, fetch_with_retry, merge_headers,
};
use crate::ledger::ExistenceLedger;
use crate::parser::{PageParser, SelectorParser};
use crate::resolver::{
    DiscoveryContext, DiscoveryError, DiscoveryResolver, ItemResolver, build_default_discovery_resolver,
};
use crate::storage::StorageBackend;

/// Collaborators shared by every run.
pub(crate) struct Inner {
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn PageParser>,
    storage: Arc<dyn StorageBackend>,
    resolver: DiscoveryResolver,
    items: ItemResolver,
    browser: Arc<dyn ScriptableBrowser>,
    ledger: ExistenceLedger,
    profiles: Vec<HeaderProfile>,
    profile_rotation_delay: Duration,
    rate_limited_backoff: Duration,
    page_retry: RetryPolicy,
    observer: Arc<dyn AcquisitionObserver>,
}

/// State of one collection run, borrowed by every member task.
pub(crate) struct Run<'a> {
    inner: &'a Inner,
    policy: &'a AcquisitionPolicy,
    limiter: &'a RateLimiter,
    collection: &'a CollectionRef,
    /// Set once the first member needing network access has started.
    network_started: AtomicBool,
}

/// A named collection and the outcome of its member discovery.
struct Identified {
    collection: CollectionRef,
    members: Result<Vec<MemberRef>, DiscoveryError>,
}

/// Acquires collections and listings into a storage backend.
///
/// Cheap to clone; clones share collaborators.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("storage", &self.inner.storage.kind())
            .field("resolver", &self.inner.resolver)
            .field("profiles", &self.inner.profiles.len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Starts building an orchestrator that stores into `storage`.
    #[must_use]
    pub fn builder(storage: Arc<dyn StorageBackend>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(storage)
    }

    /// The progress ledger over this orchestrator's storage.
    #[must_use]
    pub fn ledger(&self) -> &ExistenceLedger {
        &self.inner.ledger
    }

    /// Acquires one collection.
    ///
    /// Always returns a result; an invalid policy, an unreachable collection
    /// page or an exhausted discovery chain yield a `Failed` result with one
    /// explanatory error.
    #[instrument(skip(self, policy), fields(url = %url))]
    pub async fn acquire(&self, url: &str, policy: &AcquisitionPolicy) -> AcquisitionResult {
        if let Err(error) = policy.validate() {
            return AcquisitionResult::failed(
                CollectionRef::new(url, UNKNOWN_COLLECTION),
                error.to_string(),
                Duration::ZERO,
            );
        }
        let limiter = RateLimiter::new(policy.inter_item_delay);
        self.acquire_with(url, policy, &limiter).await
    }

    /// Runs a validated policy against `url`, pacing items through `limiter`.
    pub(crate) async fn acquire_with(
        &self,
        url: &str,
        policy: &AcquisitionPolicy,
        limiter: &RateLimiter,
    ) -> AcquisitionResult {
        let started = Instant::now();
        let inner = self.inner.as_ref();

        let identified = match self.identify(url, &policy.custom_headers).await {
            Ok(identified) => identified,
            Err(error) => {
                return AcquisitionResult::failed(
                    CollectionRef::new(url, UNKNOWN_COLLECTION),
                    error.to_string(),
                    started.elapsed(),
                );
            }
        };
        let collection = identified.collection;
        let discovered = match identified.members {
            Ok(members) => members,
            Err(error) => {
                return AcquisitionResult::failed(collection, error.to_string(), started.elapsed());
            }
        };
        let total_members_found = discovered.len();

        let filtered = policy.member_filter().apply(discovered);
        let warnings: Vec<String> = filtered.fallback.iter().map(ToString::to_string).collect();
        let members = filtered.members;
        info!(found = total_members_found, selected = members.len(), "members selected");
        inner.observer.members_resolved(&collection, members.len());

        let run = Run {
            inner,
            policy,
            limiter,
            collection: &collection,
            network_started: AtomicBool::new(false),
        };
        let run = &run;
        let outcomes: Vec<MemberOutcome> = stream::iter(members)
            .map(move |member| async move {
                let outcome = member::acquire_member(run, member).await;
                run.inner.observer.member_finished(run.collection, &outcome);
                outcome
            })
            .buffered(policy.member_concurrency)
            .collect()
            .await;

        let errors = outcomes
            .iter()
            .flat_map(|outcome| {
                outcome
                    .errors
                    .iter()
                    .map(move |error| format!("Member {}: {error}", outcome.member.id))
            })
            .collect();
        let items_fetched = outcomes.iter().map(|outcome| outcome.items_fetched).sum();
        let status = derive_status(&outcomes);
        info!(%status, items_fetched, members = outcomes.len(), "collection finished");

        AcquisitionResult {
            status,
            collection,
            members: outcomes,
            errors,
            warnings,
            total_members_found,
            items_fetched,
            elapsed: started.elapsed(),
        }
    }

    /// Names a collection and lists its members without storing anything.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::CollectionPage`] when the collection page
    /// cannot be fetched and [`OrchestratorError::Discovery`] when every
    /// discovery strategy fails.
    #[instrument(skip(self, custom_headers), fields(url = %url))]
    pub async fn preview(
        &self,
        url: &str,
        custom_headers: &[(String, String)],
    ) -> Result<CollectionPreview, OrchestratorError> {
        let identified = self.identify(url, custom_headers).await?;
        let members = identified
            .members
            .map_err(|error| OrchestratorError::discovery(url, error.to_string()))?;
        info!(collection = %identified.collection.key, members = members.len(), "collection previewed");
        Ok(CollectionPreview {
            total_members: members.len(),
            collection: identified.collection,
            members,
        })
    }

    /// Fetches the collection page, names the collection and runs discovery.
    ///
    /// Only a page failure is an error here; a discovery failure is returned
    /// alongside the collection it was attempted for.
    async fn identify(
        &self,
        url: &str,
        custom_headers: &[(String, String)],
    ) -> Result<Identified, OrchestratorError> {
        let inner = self.inner.as_ref();
        let headers = merge_headers(HeaderProfile::html_page(url), custom_headers);
        let html = match fetch_with_retry(inner.fetcher.as_ref(), url, &headers, &inner.page_retry).await {
            Ok(page) => page.text(),
            Err(error) => {
                warn!(error = %error, "collection page unavailable");
                return Err(OrchestratorError::collection_page(url, error.to_string()));
            }
        };

        let title = inner.parser.extract_title(&html).unwrap_or_else(|| {
            warn!(fallback = UNKNOWN_COLLECTION, "no collection title found");
            UNKNOWN_COLLECTION.to_string()
        });
        let collection = CollectionRef::new(url, title);
        info!(collection = %collection.key, "collection identified");

        let ctx = DiscoveryContext::new()
            .with_page_html(html)
            .with_custom_headers(custom_headers.to_vec());
        let members = inner.resolver.resolve(url, &ctx).await;
        if let Err(error) = &members {
            warn!(error = %error, "member discovery failed");
        }
        Ok(Identified { collection, members })
    }
}

/// Builder for [`Orchestrator`].
///
/// Anything not set falls back to the production collaborators: an
/// [`HttpFetcher`], the default [`SelectorParser`] and a [`ChromiumBrowser`].
pub struct OrchestratorBuilder {
    storage: Arc<dyn StorageBackend>,
    fetcher: Option<Arc<dyn PageFetcher>>,
    parser: Option<Arc<dyn PageParser>>,
    browser: Option<Arc<dyn ScriptableBrowser>>,
    observer: Arc<dyn AcquisitionObserver>,
    endpoint_template: Option<String>,
    max_interactions: usize,
    profiles: Vec<HeaderProfile>,
    profile_rotation_delay: Duration,
    rate_limited_backoff: Duration,
    page_retry: RetryPolicy,
}

impl OrchestratorBuilder {
    fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            fetcher: None,
            parser: None,
            browser: None,
            observer: Arc::new(NoopObserver),
            endpoint_template: None,
            max_interactions: DEFAULT_MAX_INTERACTIONS,
            profiles: HeaderProfile::default_rotation(),
            profile_rotation_delay: PROFILE_ROTATION_DELAY,
            rate_limited_backoff: RATE_LIMITED_BACKOFF,
            page_retry: RetryPolicy::default(),
        }
    }

    /// Uses `fetcher` for pages and items.
    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Uses `parser` for HTML extraction.
    #[must_use]
    pub fn parser(mut self, parser: Arc<dyn PageParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Uses `browser` for interactive pages.
    #[must_use]
    pub fn browser(mut self, browser: Arc<dyn ScriptableBrowser>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Reports progress to `observer`.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn AcquisitionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Overrides the direct-query endpoint template (`{origin}`, `{slug}`).
    #[must_use]
    pub fn endpoint_template(mut self, template: impl Into<String>) -> Self {
        self.endpoint_template = Some(template.into());
        self
    }

    /// Bounds "load more" clicks during interactive discovery.
    #[must_use]
    pub fn max_interactions(mut self, max_interactions: usize) -> Self {
        self.max_interactions = max_interactions;
        self
    }

    /// Header profiles tried in order for each item.
    #[must_use]
    pub fn profiles(mut self, profiles: Vec<HeaderProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    /// Pause between header profiles for one item.
    #[must_use]
    pub fn profile_rotation_delay(mut self, delay: Duration) -> Self {
        self.profile_rotation_delay = delay;
        self
    }

    /// Pause after a 429 without a usable Retry-After.
    #[must_use]
    pub fn rate_limited_backoff(mut self, delay: Duration) -> Self {
        self.rate_limited_backoff = delay;
        self
    }

    /// Retry policy for page fetches.
    #[must_use]
    pub fn page_retry(mut self, retry: RetryPolicy) -> Self {
        self.page_retry = retry;
        self
    }

    /// Builds the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Setup`] when the default HTTP client or
    /// parser cannot be constructed, or when no header profile is configured.
    pub fn build(self) -> Result<Orchestrator, OrchestratorError> {
        if self.profiles.is_empty() {
            return Err(OrchestratorError::setup("header profiles", "at least one profile is required"));
        }
        let fetcher: Arc<dyn PageFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new().map_err(|e| OrchestratorError::setup("http client", e.to_string()))?),
        };
        let parser: Arc<dyn PageParser> = match self.parser {
            Some(parser) => parser,
            None => Arc::new(
                SelectorParser::with_defaults().map_err(|e| OrchestratorError::setup("parser", e.to_string()))?,
            ),
        };
        let browser: Arc<dyn ScriptableBrowser> = self.browser.unwrap_or_else(|| Arc::new(ChromiumBrowser::new()));

        let resolver = build_default_discovery_resolver(
            Arc::clone(&fetcher),
            Arc::clone(&parser),
            Arc::clone(&browser),
            self.endpoint_template.as_deref(),
            self.max_interactions,
        );
        let items = ItemResolver::new(Arc::clone(&fetcher), Arc::clone(&parser), Arc::clone(&browser))
            .with_retry(self.page_retry.clone());
        let ledger = ExistenceLedger::new(Arc::clone(&self.storage));

        Ok(Orchestrator {
            inner: Arc::new(Inner {
                fetcher,
                parser,
                storage: self.storage,
                resolver,
                items,
                browser,
                ledger,
                profiles: self.profiles,
                profile_rotation_delay: self.profile_rotation_delay,
                rate_limited_backoff: self.rate_limited_backoff,
                page_retry: self.page_retry,
                observer: self.observer,
            }),
        })
    }
}

impl std::fmt::Debug for OrchestratorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorBuilder")
            .field("storage", &self.storage.kind())
            .field("endpoint_template", &self.endpoint_template)
            .field("max_interactions", &self.max_interactions)
            .field("profiles", &self.profiles.len())
            .finish_non_exhaustive()
    }
}
