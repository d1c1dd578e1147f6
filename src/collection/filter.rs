//! Range and count filtering of normalized member lists.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::MemberRef;

/// Range and count bounds applied to a normalized member list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberFilter {
    /// Lowest member id to keep (inclusive). Defaults to the lowest available.
    pub start: Option<f64>,
    /// Highest member id to keep (inclusive). Defaults to the highest available.
    pub end: Option<f64>,
    /// Keep at most this many members; `None` or `Some(0)` means unbounded.
    pub max_count: Option<usize>,
}

/// A requested range that did not intersect the available members.
///
/// When this happens the whole list is kept instead of nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeFallback {
    /// Requested lower bound, if any.
    pub requested_start: Option<f64>,
    /// Requested upper bound, if any.
    pub requested_end: Option<f64>,
    /// Lowest numeric member id available.
    pub available_min: f64,
    /// Highest numeric member id available.
    pub available_max: f64,
}

impl fmt::Display for RangeFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |value: Option<f64>| value.map_or_else(|| "*".to_string(), |v| v.to_string());
        write!(
            f,
            "requested members {}..={} lie outside available {}..={}; acquiring all members instead",
            bound(self.requested_start),
            bound(self.requested_end),
            self.available_min,
            self.available_max
        )
    }
}

/// Members kept by a filter, plus the fallback notice when one applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// Members to acquire, in canonical order.
    pub members: Vec<MemberRef>,
    /// Present when the range missed and the full list was kept.
    pub fallback: Option<RangeFallback>,
}

impl MemberFilter {
    /// Returns true when no range bound is set.
    #[must_use]
    pub fn is_unbounded_range(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Applies the range then the count bound.
    ///
    /// Members with symbolic ids are always kept by the range step. A range
    /// that lies entirely outside the available numeric ids keeps the full
    /// list and reports a [`RangeFallback`].
    #[must_use]
    pub fn apply(&self, members: Vec<MemberRef>) -> FilterOutcome {
        let (mut kept, fallback) = self.apply_range(members);
        if let Some(max) = self.max_count.filter(|max| *max > 0)
            && kept.len() > max
        {
            debug!(max, total = kept.len(), "truncating member list");
            kept.truncate(max);
        }
        FilterOutcome {
            members: kept,
            fallback,
        }
    }

    fn apply_range(&self, members: Vec<MemberRef>) -> (Vec<MemberRef>, Option<RangeFallback>) {
        if self.is_unbounded_range() {
            return (members, None);
        }

        let numeric: Vec<f64> = members.iter().filter_map(MemberRef::numeric_id).collect();
        let Some(available_min) = numeric.iter().copied().reduce(f64::min) else {
            debug!("no numeric member ids; range bounds do not apply");
            return (members, None);
        };
        let available_max = numeric.iter().copied().fold(available_min, f64::max);

        let start = self.start.unwrap_or(available_min);
        let end = self.end.unwrap_or(available_max);

        if start > available_max || end < available_min {
            let fallback = RangeFallback {
                requested_start: self.start,
                requested_end: self.end,
                available_min,
                available_max,
            };
            warn!(%fallback, "member range fallback");
            return (members, Some(fallback));
        }

        let kept = members
            .into_iter()
            .filter(|member| {
                member
                    .numeric_id()
                    .is_none_or(|value| value >= start && value <= end)
            })
            .collect();
        (kept, None)
    }
}
