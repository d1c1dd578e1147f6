//! Progress hooks for callers that render acquisition progress.

use super::MemberOutcome;
use crate::collection::CollectionRef;

/// Receives acquisition events. Every method defaults to doing nothing.
pub trait AcquisitionObserver: Send + Sync {
    /// Members were resolved and filtered; `count` will be attempted.
    fn members_resolved(&self, _collection: &CollectionRef, _count: usize) {}

    /// A member reached a terminal state.
    fn member_finished(&self, _collection: &CollectionRef, _outcome: &MemberOutcome) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl AcquisitionObserver for NoopObserver {}
