//! Storage backends for acquired items and progress records.
//!
//! Keys are `/`-separated relative paths such as
//! `Solo_Leveling/Member_12/001.jpg`. The backend is chosen once, at
//! construction, through [`StorageBuilder`]; nothing downstream branches on
//! the storage mode.

mod config;
mod error;
mod filesystem;
mod object;
mod unavailable;

pub use config::{DEFAULT_REGION, ObjectStorageConfig};
pub use error::StorageError;
pub use filesystem::FilesystemBackend;
pub use object::ObjectStorageBackend;
pub use unavailable::UnavailableBackend;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Which kind of backend holds the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Local filesystem.
    Local,
    /// S3-compatible object storage.
    Cloud,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Cloud => write!(f, "cloud"),
        }
    }
}

/// Capability set every backend provides.
#[async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Backend kind, recorded in progress records.
    fn kind(&self) -> StorageKind;

    /// Returns true if an object exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Lists the keys directly under `prefix` (a `/`-terminated directory key).
    ///
    /// A missing prefix yields an empty list. Object backends page through
    /// the full listing.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Reads a metadata document, `None` if absent.
    async fn read_metadata(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores an item and returns its location (path or URL).
    async fn write_item(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError>;

    /// Replaces a metadata document atomically.
    async fn write_metadata(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
}

/// Requested storage mode for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageMode {
    /// Store under a local root directory.
    Filesystem {
        /// Root directory.
        root: PathBuf,
    },
    /// Store in an S3-compatible bucket.
    Object(ObjectStorageConfig),
}

/// Builds the backend for a [`StorageMode`].
///
/// Construction never fails: an object backend that cannot be initialized
/// becomes an [`UnavailableBackend`], so existence checks fail open and item
/// writes fail per item.
#[derive(Debug, Clone)]
pub struct StorageBuilder {
    mode: StorageMode,
}

impl StorageBuilder {
    /// Creates a builder for the mode.
    #[must_use]
    pub fn new(mode: StorageMode) -> Self {
        Self { mode }
    }

    /// Builds the backend.
    pub async fn build(self) -> Arc<dyn StorageBackend> {
        match self.mode {
            StorageMode::Filesystem { root } => {
                info!(root = %root.display(), "using filesystem storage");
                Arc::new(FilesystemBackend::new(root))
            }
            StorageMode::Object(config) => match ObjectStorageBackend::connect(config).await {
                Ok(backend) => {
                    info!(bucket = %backend.bucket(), "using object storage");
                    Arc::new(backend)
                }
                Err(error) => {
                    warn!(error = %error, "object storage unavailable; existence checks will report nothing stored");
                    Arc::new(UnavailableBackend::new(StorageKind::Cloud, error.to_string()))
                }
            },
        }
    }
}

/// Joins key segments with `/`.
#[must_use]
pub fn join_key(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Returns the final segment of a key.
#[must_use]
pub fn key_name(key: &str) -> &str {
    key.trim_end_matches('/').rsplit('/').next().unwrap_or(key)
}

/// Guesses an item content type from its filename.
#[must_use]
pub fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()).as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}
