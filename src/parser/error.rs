//! Error types for parser construction.

use thiserror::Error;

/// Errors raised while building a parser from configuration.
#[derive(Debug, Clone, Error)]
pub enum ParserError {
    /// A configured CSS selector does not parse.
    #[error("invalid CSS selector '{selector}': {reason}\n  Suggestion: Check the selector syntax in your configuration")]
    InvalidSelector {
        /// The offending selector.
        selector: String,
        /// Parser message.
        reason: String,
    },

    /// A configured pattern is not a valid regular expression.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Regex compiler message.
        reason: String,
    },
}

impl ParserError {
    /// Creates an `InvalidSelector` error.
    #[must_use]
    pub fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidPattern` error.
    #[must_use]
    pub fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}
