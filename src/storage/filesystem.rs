//! Local filesystem backend.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{StorageBackend, StorageError, StorageKind};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stores keys as files under a root directory.
#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Creates a backend rooted at `root` (created lazily on first write).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key.trim_end_matches('/'));
        if relative.as_os_str().is_empty() {
            return Err(StorageError::invalid_key(key, "empty key"));
        }
        let mut path = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => path.push(segment),
                Component::CurDir => {}
                _ => return Err(StorageError::invalid_key(key, "key must stay inside the storage root")),
            }
        }
        Ok(path)
    }

    async fn write_atomic(&self, key: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.resolve(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| StorageError::invalid_key(key, "key has no parent"))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = parent.join(format!(
            ".{file_name}.{}.{}.tmp",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&temp, bytes)
            .await
            .map_err(|e| StorageError::io(&temp, e))?;
        if let Err(error) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::io(&path, error));
        }
        Ok(path)
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    fn kind(&self) -> StorageKind {
        StorageKind::Local
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(StorageError::io(path, error)),
        }
    }

    #[instrument(skip(self))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.resolve(prefix)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(StorageError::io(dir, error)),
        };
        let base = prefix.trim_end_matches('/');
        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&dir, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map_err(|e| StorageError::io(entry.path(), e))?
                .is_file();
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_file && !name.starts_with('.') {
                keys.push(format!("{base}/{name}"));
            }
        }
        keys.sort();
        debug!(count = keys.len(), "listed directory");
        Ok(keys)
    }

    async fn read_metadata(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(StorageError::io(path, error)),
        }
    }

    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    async fn write_item(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<String, StorageError> {
        let path = self.write_atomic(key, bytes).await?;
        Ok(path.display().to_string())
    }

    async fn write_metadata(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.write_atomic(key, bytes).await.map(|_| ())
    }
}
