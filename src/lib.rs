//! Series Downloader Library
//!
//! This library discovers, fetches and incrementally synchronizes hierarchical
//! image collections (listing → collection → member → item) from sites that
//! offer no stable enumeration API. Re-runs are cheap: whatever already sits in
//! storage is skipped.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`collection`] - Collection, member and item identities; key sanitization,
//!   member normalization and range filtering
//! - [`fetch`] - HTTP page/item fetching with header profiles, retry and rate limiting
//! - [`parser`] - HTML extraction (titles, member links, item sources, page images)
//! - [`browser`] - Scriptable headless browser for pages that need interaction
//! - [`resolver`] - Discovery strategies and the priority-ordered discovery loop
//! - [`storage`] - Storage backends (filesystem and S3-compatible object storage)
//! - [`ledger`] - Existence checks and persisted progress records
//! - [`orchestrator`] - Bounded concurrent acquisition, status aggregation,
//!   collection previews and single-page image collection

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod browser;
pub mod collection;
pub mod fetch;
pub mod ledger;
pub mod orchestrator;
pub mod parser;
pub mod resolver;
pub mod storage;
mod user_agent;

// Re-export commonly used types
pub use collection::{
    CollectionRef, FilterOutcome, ItemRef, MemberFilter, MemberRef, RangeFallback, sanitize_key,
};
pub use fetch::{
    DEFAULT_MAX_RETRIES, FailureType, FetchError, FetchedPage, HeaderProfile, HttpFetcher,
    PageFetcher, RateLimiter, RetryDecision, RetryPolicy, classify_error,
};
pub use ledger::{ExistenceLedger, MemberProgress, ProgressRecord, ProgressSummary};
pub use orchestrator::{
    AcquisitionObserver, AcquisitionPolicy, AcquisitionResult, AcquisitionStatus,
    CollectionPreview, ListingPolicy, ListingResult, MemberOutcome, MemberState, NoopObserver,
    Orchestrator, OrchestratorBuilder, OrchestratorError, PageImagesPolicy, PageImagesResult,
};
pub use resolver::{
    DiscoveryContext, DiscoveryError, DiscoveryResolver, DiscoveryStep, DiscoveryStrategy,
};
pub use storage::{StorageBackend, StorageBuilder, StorageError, StorageKind, StorageMode};
