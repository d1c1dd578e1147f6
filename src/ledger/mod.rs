//! Existence ledger: what has already been acquired.
//!
//! Existence is answered from the storage listing itself, so a run that
//! crashed after writing items but before recording progress still skips
//! them next time. Storage layout:
//!
//! ```text
//! <collection>/Member_<id>/<filename>
//! <collection>/progress/Member_<id>.json
//! ```
//!
//! Each member's progress entry is its own document. Concurrent completions,
//! whether from one run or from several processes sharing a storage root,
//! never rewrite each other's entries.
//!
//! Existence checks fail open: a backend error is logged and reported as
//! "not stored", which costs a redundant fetch but never blocks a run.

mod record;

pub use record::{MemberProgress, ProgressRecord, ProgressSummary};

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::collection::is_item_filename;
use crate::storage::{StorageBackend, StorageError, StorageKind, join_key, key_name};

/// Directory under a collection holding one progress entry per member.
pub const PROGRESS_DIR: &str = "progress";

const ENTRY_PREFIX: &str = "Member_";
const ENTRY_SUFFIX: &str = ".json";

/// Key of a member's directory, `/`-terminated.
#[must_use]
pub fn member_prefix(collection: &str, member_id: &str) -> String {
    format!("{}/", join_key(&[collection, &format!("Member_{member_id}")]))
}

/// Key of one stored item.
#[must_use]
pub fn item_key(collection: &str, member_id: &str, filename: &str) -> String {
    join_key(&[collection, &format!("Member_{member_id}"), filename])
}

/// Key of a member's progress entry.
#[must_use]
pub fn progress_key(collection: &str, member_id: &str) -> String {
    join_key(&[collection, PROGRESS_DIR, &format!("{ENTRY_PREFIX}{member_id}{ENTRY_SUFFIX}")])
}

fn member_id_from_entry(key: &str) -> Option<&str> {
    key_name(key)
        .strip_prefix(ENTRY_PREFIX)?
        .strip_suffix(ENTRY_SUFFIX)
        .filter(|id| !id.is_empty())
}

/// Answers existence questions and maintains progress records.
#[derive(Debug, Clone)]
pub struct ExistenceLedger {
    backend: Arc<dyn StorageBackend>,
}

impl ExistenceLedger {
    /// Creates a ledger over a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// The underlying backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Backend kind.
    #[must_use]
    pub fn storage_kind(&self) -> StorageKind {
        self.backend.kind()
    }

    /// Returns whether a member has at least one stored item, and those items.
    ///
    /// `exists` is true exactly when the returned list is non-empty.
    #[instrument(skip(self), fields(storage = %self.backend.kind()))]
    pub async fn member_exists(&self, collection: &str, member_id: &str) -> (bool, Vec<String>) {
        let prefix = member_prefix(collection, member_id);
        match self.backend.list(&prefix).await {
            Ok(keys) => {
                let mut items: Vec<String> = keys
                    .iter()
                    .map(|key| key_name(key))
                    .filter(|name| is_item_filename(name))
                    .map(str::to_string)
                    .collect();
                items.sort();
                items.dedup();
                debug!(items = items.len(), "member listing");
                (!items.is_empty(), items)
            }
            Err(error) => {
                warn!(error = %error, "member existence check failed; treating as not stored");
                (false, Vec::new())
            }
        }
    }

    /// Returns whether one item is stored; errors count as absent.
    pub async fn item_exists(&self, collection: &str, member_id: &str, filename: &str) -> bool {
        let key = item_key(collection, member_id, filename);
        match self.backend.exists(&key).await {
            Ok(exists) => exists,
            Err(error) => {
                warn!(key = %key, error = %error, "item existence check failed; treating as not stored");
                false
            }
        }
    }

    /// Records a completed member.
    ///
    /// Returns `Ok(false)` without writing when `items` is empty. Only the
    /// member's own entry is written.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn record_member(
        &self,
        collection: &str,
        member_id: &str,
        items: &[String],
    ) -> Result<bool, StorageError> {
        if items.is_empty() {
            debug!("refusing to record a member without items");
            return Ok(false);
        }
        let mut sorted = items.to_vec();
        sorted.sort();
        sorted.dedup();
        let entry = MemberProgress::new(sorted, self.backend.kind());

        let key = progress_key(collection, member_id);
        let bytes = entry
            .to_json()
            .map_err(|e| StorageError::remote("encode", &key, e.to_string()))?;
        self.backend.write_metadata(&key, &bytes).await?;
        info!(total_items = entry.total_items, "progress recorded");
        Ok(true)
    }

    /// Summarizes a collection's recorded members.
    ///
    /// Unreadable entries are skipped with a warning.
    #[instrument(skip(self))]
    pub async fn progress(&self, collection: &str) -> Result<ProgressSummary, StorageError> {
        Ok(self.load(collection).await?.summary())
    }

    async fn load(&self, collection: &str) -> Result<ProgressRecord, StorageError> {
        let prefix = format!("{}/", join_key(&[collection, PROGRESS_DIR]));
        let mut record = ProgressRecord::default();
        for key in self.backend.list(&prefix).await? {
            let Some(member_id) = member_id_from_entry(&key) else {
                continue;
            };
            let Some(bytes) = self.backend.read_metadata(&key).await? else {
                continue;
            };
            match MemberProgress::from_json(&bytes) {
                Ok(entry) => {
                    record.members.insert(member_id.to_string(), entry);
                }
                Err(error) => warn!(key = %key, error = %error, "progress entry unreadable; skipping"),
            }
        }
        debug!(members = record.members.len(), "progress loaded");
        Ok(record)
    }
}
