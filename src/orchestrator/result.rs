//! Per-member outcomes and aggregate results.

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::collection::{CollectionRef, MemberRef};

/// Aggregate status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionStatus {
    /// Every attempted unit produced items without errors.
    Success,
    /// Some units produced items.
    Partial,
    /// Nothing produced any item.
    Failed,
}

impl std::fmt::Display for AcquisitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Where a member ended up.
///
/// `Pending -> Skipped`, or `Pending -> Discovering -> Fetching ->
/// {Recorded, RecordedPartial, Failed}`, with `Discovering -> Failed` when no
/// items are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberState {
    /// Not started.
    Pending,
    /// Already stored; reused without network access.
    Skipped,
    /// Looking for item sources.
    Discovering,
    /// Fetching items.
    Fetching,
    /// Every item stored and recorded.
    Recorded,
    /// Some items stored and recorded, some failed.
    RecordedPartial,
    /// No item stored.
    Failed,
}

impl MemberState {
    /// Returns true for the states a member can end in.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Skipped | Self::Recorded | Self::RecordedPartial | Self::Failed
        )
    }

    /// Returns true if moving to `next` follows the state machine.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Skipped | Self::Discovering)
                | (Self::Discovering, Self::Fetching | Self::Failed)
                | (Self::Fetching, Self::Recorded | Self::RecordedPartial | Self::Failed)
        )
    }
}

/// What happened to one member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberOutcome {
    /// The member.
    pub member: MemberRef,
    /// Final state.
    pub state: MemberState,
    /// Stored item filenames, sorted (reused ones included).
    pub items: Vec<String>,
    /// Item sources found on the member page (0 when skipped).
    pub items_found: usize,
    /// Items fetched and stored during this run.
    pub items_fetched: usize,
    /// Where each newly stored item went.
    pub locations: Vec<String>,
    /// Member and item errors.
    pub errors: Vec<String>,
}

impl MemberOutcome {
    /// A fresh outcome in `Pending`.
    #[must_use]
    pub fn pending(member: MemberRef) -> Self {
        Self {
            member,
            state: MemberState::Pending,
            items: Vec::new(),
            items_found: 0,
            items_fetched: 0,
            locations: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Moves to `next`, ignoring transitions the state machine forbids.
    pub fn advance(&mut self, next: MemberState) {
        if self.state.can_transition_to(next) {
            self.state = next;
        } else {
            tracing::debug!(from = ?self.state, to = ?next, member = %self.member.id, "ignoring invalid member transition");
        }
    }

    /// Returns true if the member contributed at least one item.
    #[must_use]
    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Returns true if the member has items and no errors.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.has_items() && self.errors.is_empty()
    }
}

/// Result of acquiring one collection. Always produced, even on failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquisitionResult {
    /// Aggregate status.
    pub status: AcquisitionStatus,
    /// The collection.
    pub collection: CollectionRef,
    /// One outcome per attempted member, in member order.
    pub members: Vec<MemberOutcome>,
    /// Errors from every level, prefixed with their member.
    pub errors: Vec<String>,
    /// Non-fatal notices, e.g. a range fallback.
    pub warnings: Vec<String>,
    /// Members discovered before filtering.
    pub total_members_found: usize,
    /// Items fetched and stored during this run.
    pub items_fetched: usize,
    /// Wall-clock duration.
    #[serde(rename = "elapsed_seconds", serialize_with = "duration_secs")]
    pub elapsed: Duration,
}

impl AcquisitionResult {
    /// A failed result carrying a single explanatory error.
    #[must_use]
    pub fn failed(collection: CollectionRef, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            status: AcquisitionStatus::Failed,
            collection,
            members: Vec::new(),
            errors: vec![error.into()],
            warnings: Vec::new(),
            total_members_found: 0,
            items_fetched: 0,
            elapsed,
        }
    }

    /// Items held by the attempted members, reused ones included.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.members.iter().map(|m| m.items.len()).sum()
    }
}

/// Derives the status of a collection run from its member outcomes.
///
/// `Failed` when no member has items (including no members at all),
/// `Success` when every member has items and no errors, else `Partial`.
#[must_use]
pub fn derive_status(members: &[MemberOutcome]) -> AcquisitionStatus {
    if !members.iter().any(MemberOutcome::has_items) {
        AcquisitionStatus::Failed
    } else if members.iter().all(MemberOutcome::is_clean) {
        AcquisitionStatus::Success
    } else {
        AcquisitionStatus::Partial
    }
}

/// Result of acquiring a listing of collections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingResult {
    /// Aggregate status.
    pub status: AcquisitionStatus,
    /// Listing page.
    pub listing_url: String,
    /// One result per attempted collection, in listing order.
    pub collections: Vec<AcquisitionResult>,
    /// Listing-level errors followed by collection errors.
    pub errors: Vec<String>,
    /// Collections found on the listing before capping.
    pub total_collections_found: usize,
    /// Items fetched across all collections.
    pub items_fetched: usize,
    /// Wall-clock duration.
    #[serde(rename = "elapsed_seconds", serialize_with = "duration_secs")]
    pub elapsed: Duration,
}

/// A collection and its members as discovery sees them, with nothing stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionPreview {
    /// The collection, named from its page title.
    pub collection: CollectionRef,
    /// Members discovered.
    pub total_members: usize,
    /// Discovered members in ordinal order.
    pub members: Vec<MemberRef>,
}

/// Derives a listing status: `Success` when every collection succeeded,
/// `Failed` when none produced items, else `Partial`.
#[must_use]
pub fn derive_listing_status(collections: &[AcquisitionResult]) -> AcquisitionStatus {
    if collections.iter().all(|c| c.total_items() == 0) {
        AcquisitionStatus::Failed
    } else if collections.iter().all(|c| c.status == AcquisitionStatus::Success) {
        AcquisitionStatus::Success
    } else {
        AcquisitionStatus::Partial
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
pub(crate) fn duration_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64((value.as_secs_f64() * 100.0).round() / 100.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn member(id: &str) -> MemberRef {
        MemberRef {
            id: id.to_string(),
            title: format!("Chapter {id}"),
            address: format!("https://s.test/c/{id}"),
            ordinal: 1,
        }
    }

    fn outcome(items: usize, errors: usize) -> MemberOutcome {
        let mut o = MemberOutcome::pending(member("1"));
        o.items = (1..=items).map(|i| format!("{i:03}.jpg")).collect();
        o.errors = (0..errors).map(|i| format!("error {i}")).collect();
        o
    }

    #[test]
    fn test_status_derivation() {
        assert_eq!(derive_status(&[]), AcquisitionStatus::Failed);
        assert_eq!(derive_status(&[outcome(0, 1), outcome(0, 0)]), AcquisitionStatus::Failed);
        assert_eq!(derive_status(&[outcome(2, 0), outcome(1, 0)]), AcquisitionStatus::Success);
        assert_eq!(derive_status(&[outcome(2, 0), outcome(0, 1)]), AcquisitionStatus::Partial);
        assert_eq!(derive_status(&[outcome(2, 1)]), AcquisitionStatus::Partial);
    }

    #[test]
    fn test_state_machine_transitions() {
        use MemberState::*;
        assert!(Pending.can_transition_to(Skipped));
        assert!(Pending.can_transition_to(Discovering));
        assert!(Discovering.can_transition_to(Failed));
        assert!(Fetching.can_transition_to(RecordedPartial));
        assert!(!Recorded.can_transition_to(Fetching));
        assert!(!Pending.can_transition_to(Recorded));
        assert!(!Skipped.can_transition_to(Discovering));
        assert!(Skipped.is_terminal());
        assert!(!Fetching.is_terminal());
    }

    #[test]
    fn test_advance_ignores_backward_moves() {
        let mut o = MemberOutcome::pending(member("1"));
        o.advance(MemberState::Discovering);
        o.advance(MemberState::Fetching);
        o.advance(MemberState::Recorded);
        o.advance(MemberState::Discovering);
        assert_eq!(o.state, MemberState::Recorded);
    }

    #[test]
    fn test_listing_status() {
        let collection = CollectionRef::new("https://s.test/c", "Series");
        let mut ok = AcquisitionResult::failed(collection.clone(), "x", Duration::ZERO);
        ok.status = AcquisitionStatus::Success;
        ok.errors.clear();
        ok.members = vec![outcome(1, 0)];
        let failed = AcquisitionResult::failed(collection, "boom", Duration::ZERO);

        assert_eq!(derive_listing_status(&[]), AcquisitionStatus::Failed);
        assert_eq!(derive_listing_status(&[ok.clone()]), AcquisitionStatus::Success);
        assert_eq!(derive_listing_status(&[ok, failed.clone()]), AcquisitionStatus::Partial);
        assert_eq!(derive_listing_status(&[failed]), AcquisitionStatus::Failed);
    }

    #[test]
    fn test_result_serializes_elapsed_seconds() {
        let result = AcquisitionResult::failed(
            CollectionRef::new("https://s.test/c", "Series"),
            "no members",
            Duration::from_millis(1500),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["elapsed_seconds"], 1.5);
        assert_eq!(json["collection"]["key"], "Series");
    }
}
