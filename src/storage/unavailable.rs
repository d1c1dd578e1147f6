//! Placeholder backend for a storage mode that failed to initialize.

use async_trait::async_trait;

use super::{StorageBackend, StorageError, StorageKind};

/// Every operation fails with [`StorageError::Unavailable`].
#[derive(Debug, Clone)]
pub struct UnavailableBackend {
    kind: StorageKind,
    reason: String,
}

impl UnavailableBackend {
    /// Creates the backend with the initialization failure message.
    #[must_use]
    pub fn new(kind: StorageKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    fn error(&self) -> StorageError {
        StorageError::unavailable(self.reason.clone())
    }
}

#[async_trait]
impl StorageBackend for UnavailableBackend {
    fn kind(&self) -> StorageKind {
        self.kind
    }

    async fn exists(&self, _key: &str) -> Result<bool, StorageError> {
        Err(self.error())
    }

    async fn list(&self, _prefix: &str) -> Result<Vec<String>, StorageError> {
        Err(self.error())
    }

    async fn read_metadata(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Err(self.error())
    }

    async fn write_item(&self, _key: &str, _bytes: &[u8], _content_type: &str) -> Result<String, StorageError> {
        Err(self.error())
    }

    async fn write_metadata(&self, _key: &str, _bytes: &[u8]) -> Result<(), StorageError> {
        Err(self.error())
    }
}
