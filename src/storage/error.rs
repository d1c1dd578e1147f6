//! Error types for storage backends.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a [`super::StorageBackend`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Object storage request failed.
    #[error("object storage {operation} failed for '{key}': {reason}")]
    Remote {
        /// Operation name (`put`, `head`, `list`, `get`).
        operation: &'static str,
        /// Object key or prefix.
        key: String,
        /// SDK message.
        reason: String,
    },

    /// A key would escape the storage root or is otherwise unusable.
    #[error("invalid storage key '{key}': {reason}")]
    InvalidKey {
        /// Offending key.
        key: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Object storage configuration is missing or invalid.
    #[error("object storage configuration error: {reason}\n  Suggestion: Set ACCESS_KEY, SECRET_KEY, ENDPOINT_URL and BUCKET_NAME (a .env file works)")]
    Config {
        /// What is wrong.
        reason: String,
    },

    /// The backend could not be initialized for this run.
    #[error("storage backend unavailable: {reason}")]
    Unavailable {
        /// Initialization failure.
        reason: String,
    },
}

impl StorageError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a remote (object storage) error.
    pub fn remote(operation: &'static str, key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Remote {
            operation,
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid-key error.
    pub fn invalid_key(key: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason,
        }
    }

    /// Creates a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates an unavailable-backend error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}
