//! Error types for browser sessions.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by a [`super::ScriptableBrowser`].
#[derive(Debug, Clone, Error)]
pub enum BrowserError {
    /// The browser process could not be started.
    #[error("failed to launch browser: {reason}\n  Suggestion: Install Chromium or set CHROME_PATH")]
    Launch {
        /// Launcher message.
        reason: String,
    },

    /// Navigation to the page failed.
    #[error("navigation to {url} failed: {reason}")]
    Navigation {
        /// Target URL.
        url: String,
        /// Browser message.
        reason: String,
    },

    /// A page script failed or returned an unexpected value.
    #[error("script on {url} failed: {reason}")]
    Script {
        /// Page URL.
        url: String,
        /// Evaluation message.
        reason: String,
    },

    /// The session exceeded its time budget.
    #[error("browser session for {url} timed out after {secs}s")]
    Timeout {
        /// Page URL.
        url: String,
        /// Budget in seconds.
        secs: u64,
    },

    /// No browser is available for this run.
    #[error("browser unavailable for {url}: {reason}")]
    Unavailable {
        /// Page URL.
        url: String,
        /// Why no browser is available.
        reason: String,
    },
}

impl BrowserError {
    /// Creates a `Launch` error.
    pub fn launch(reason: impl Into<String>) -> Self {
        Self::Launch {
            reason: reason.into(),
        }
    }

    /// Creates a `Navigation` error.
    pub fn navigation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Script` error.
    pub fn script(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Script {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(url: impl Into<String>, budget: Duration) -> Self {
        Self::Timeout {
            url: url.into(),
            secs: budget.as_secs(),
        }
    }

    /// Creates an `Unavailable` error.
    pub fn unavailable(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
