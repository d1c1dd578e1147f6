//! Error types for member and item discovery.
//!
//! Messages follow the What/Why/Suggestion shape used across the crate.

use thiserror::Error;

/// Errors that can occur while discovering members or items.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// One strategy could not produce a result.
    #[error("{strategy} discovery failed for '{url}': {reason}")]
    StrategyFailed {
        /// Strategy name.
        strategy: String,
        /// Collection or member page.
        url: String,
        /// Why it failed.
        reason: String,
    },

    /// Every strategy was tried and none produced members.
    #[error(
        "no members found for '{url}': tried {tried} strategy(ies)\n  Suggestion: Check that the URL is a collection page, or retry later if the site is blocking requests"
    )]
    Exhausted {
        /// Collection page.
        url: String,
        /// Number of strategies tried.
        tried: usize,
    },

    /// No item sources could be found on a member page.
    #[error("no items found on '{url}'\n  Suggestion: The page may require a browser; make sure Chromium is installed")]
    NoItems {
        /// Member page.
        url: String,
    },

    /// The URL cannot be used for discovery.
    #[error("invalid collection URL '{url}': {reason}")]
    InvalidUrl {
        /// Offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl DiscoveryError {
    /// Creates a `StrategyFailed` error.
    pub fn strategy_failed(strategy: &str, url: &str, reason: impl Into<String>) -> Self {
        Self::StrategyFailed {
            strategy: strategy.to_string(),
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an `Exhausted` error.
    #[must_use]
    pub fn exhausted(url: &str, tried: usize) -> Self {
        Self::Exhausted {
            url: url.to_string(),
            tried,
        }
    }

    /// Creates a `NoItems` error.
    #[must_use]
    pub fn no_items(url: &str) -> Self {
        Self::NoItems { url: url.to_string() }
    }

    /// Creates an `InvalidUrl` error.
    pub fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}
