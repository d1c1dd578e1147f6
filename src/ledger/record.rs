//! Typed progress entries, one per member, and their per-collection fold.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::StorageKind;

/// What the ledger last recorded for one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProgress {
    /// Stored item filenames, sorted.
    pub items: Vec<String>,
    /// Number of stored items.
    pub total_items: usize,
    /// Backend the items were written to.
    pub storage: StorageKind,
    /// When this entry was last written.
    pub last_updated: DateTime<Utc>,
}

impl MemberProgress {
    /// An entry for `items` stamped now.
    #[must_use]
    pub fn new(items: Vec<String>, storage: StorageKind) -> Self {
        Self {
            total_items: items.len(),
            items,
            storage,
            last_updated: Utc::now(),
        }
    }

    /// Parses a stored entry.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Serializes as pretty-printed JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

/// Per-collection cache of completed members, keyed by member id.
///
/// Folded from the per-member entries. The storage listing is the truth;
/// this record only summarizes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Entries by member id.
    #[serde(default)]
    pub members: BTreeMap<String, MemberProgress>,
}

impl ProgressRecord {
    /// Summarizes the record.
    #[must_use]
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            total_members: self.members.len(),
            total_items: self.members.values().map(|m| m.total_items).sum(),
            per_member: self.members.clone(),
        }
    }
}

/// Totals over a collection's progress record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    /// Members with a recorded entry.
    pub total_members: usize,
    /// Items across all recorded members.
    pub total_items: usize,
    /// The recorded entries.
    pub per_member: BTreeMap<String, MemberProgress>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_members_and_items() {
        let mut record = ProgressRecord::default();
        record.members.insert("1".into(), MemberProgress::new(vec!["001.jpg".into(), "002.jpg".into()], StorageKind::Local));
        record.members.insert("2".into(), MemberProgress::new(vec!["001.png".into()], StorageKind::Local));

        let summary = record.summary();
        assert_eq!(summary.total_members, 2);
        assert_eq!(summary.total_items, 3);
        assert_eq!(summary.per_member["1"].total_items, 2);
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = MemberProgress::new(vec!["001.jpg".into()], StorageKind::Cloud);
        let json: serde_json::Value = serde_json::from_slice(&entry.to_json().unwrap()).unwrap();
        assert_eq!(json["items"][0], "001.jpg");
        assert_eq!(json["total_items"], 1);
        assert_eq!(json["storage"], "cloud");
        let stamp = json["last_updated"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());
        assert_eq!(MemberProgress::from_json(&entry.to_json().unwrap()).unwrap(), entry);
    }

    #[test]
    fn test_from_json_rejects_partial_entry() {
        assert!(MemberProgress::from_json(b"{\"items\": []}").is_err());
    }
}
