//! Error types for orchestrator setup, policies and previews.

use thiserror::Error;

/// Errors raised before any acquisition work starts, or by a preview.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    /// A policy value is unusable.
    #[error("invalid policy: {reason}\n  Suggestion: Check the range and concurrency options")]
    InvalidPolicy {
        /// What is wrong.
        reason: String,
    },

    /// A collaborator could not be constructed.
    #[error("failed to set up {component}: {reason}")]
    Setup {
        /// Component name.
        component: &'static str,
        /// Construction error.
        reason: String,
    },

    /// The collection page could not be fetched.
    #[error("Collection page {url}: {reason}")]
    CollectionPage {
        /// Page address.
        url: String,
        /// Fetch error.
        reason: String,
    },

    /// Every discovery strategy failed for a collection.
    #[error("{reason}")]
    Discovery {
        /// Collection address.
        url: String,
        /// Aggregated strategy failures.
        reason: String,
    },
}

impl OrchestratorError {
    /// Creates an `InvalidPolicy` error.
    pub fn invalid_policy(reason: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            reason: reason.into(),
        }
    }

    /// Creates a `CollectionPage` error.
    pub fn collection_page(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CollectionPage {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Discovery` error.
    pub fn discovery(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Discovery {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Setup` error.
    pub fn setup(component: &'static str, reason: impl Into<String>) -> Self {
        Self::Setup {
            component,
            reason: reason.into(),
        }
    }
}
