//! Acquisition policies.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::OrchestratorError;
use crate::collection::MemberFilter;

/// Default pause before the next member that needs network access.
pub const DEFAULT_INTER_MEMBER_DELAY: Duration = Duration::from_secs(2);

/// Default same-host spacing between item requests.
pub const DEFAULT_INTER_ITEM_DELAY: Duration = Duration::from_millis(500);

/// Default number of members acquired at once.
pub const DEFAULT_MEMBER_CONCURRENCY: usize = 1;

/// Default number of collections acquired at once from a listing.
pub const DEFAULT_COLLECTION_CONCURRENCY: usize = 2;

/// Default stagger between collection starts.
pub const DEFAULT_INTER_COLLECTION_DELAY: Duration = Duration::from_secs(3);

/// Upper bound for both concurrency settings.
pub const MAX_CONCURRENCY: usize = 16;

/// How one collection is acquired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionPolicy {
    /// Lowest member id to acquire.
    pub start: Option<f64>,
    /// Highest member id to acquire.
    pub end: Option<f64>,
    /// Maximum members after range filtering; `0` means no limit.
    pub max_members: Option<usize>,
    /// Maximum items per member; `0` means no limit.
    pub max_items_per_member: Option<usize>,
    /// Same-host spacing between item requests.
    #[serde(with = "duration_millis")]
    pub inter_item_delay: Duration,
    /// Pause before each member that needs network access, except the first.
    #[serde(with = "duration_millis")]
    pub inter_member_delay: Duration,
    /// Members acquired at once.
    pub member_concurrency: usize,
    /// Re-discover items of members that already exist and fetch only the
    /// missing ones.
    pub revalidate_members: bool,
    /// Headers applied on top of every request.
    pub custom_headers: Vec<(String, String)>,
}

impl Default for AcquisitionPolicy {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            max_members: None,
            max_items_per_member: None,
            inter_item_delay: DEFAULT_INTER_ITEM_DELAY,
            inter_member_delay: DEFAULT_INTER_MEMBER_DELAY,
            member_concurrency: DEFAULT_MEMBER_CONCURRENCY,
            revalidate_members: false,
            custom_headers: Vec::new(),
        }
    }
}

impl AcquisitionPolicy {
    /// Checks that the policy is usable.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidPolicy`] for a non-finite or
    /// negative bound, `start > end`, or a concurrency outside `1..=16`.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        for (name, bound) in [("start", self.start), ("end", self.end)] {
            if let Some(value) = bound {
                if !value.is_finite() || value < 0.0 {
                    return Err(OrchestratorError::invalid_policy(format!(
                        "{name} must be a non-negative number, got {value}"
                    )));
                }
            }
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(OrchestratorError::invalid_policy(format!(
                    "start ({start}) is greater than end ({end})"
                )));
            }
        }
        if !(1..=MAX_CONCURRENCY).contains(&self.member_concurrency) {
            return Err(OrchestratorError::invalid_policy(format!(
                "member concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.member_concurrency
            )));
        }
        Ok(())
    }

    /// The member filter this policy describes.
    #[must_use]
    pub fn member_filter(&self) -> MemberFilter {
        MemberFilter {
            start: self.start,
            end: self.end,
            max_count: self.max_members,
        }
    }

    /// Item cap, with `0` read as no limit.
    #[must_use]
    pub fn item_limit(&self) -> Option<usize> {
        self.max_items_per_member.filter(|&limit| limit > 0)
    }
}

/// How a listing of collections is acquired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingPolicy {
    /// Maximum collections taken from the listing; `0` means no limit.
    pub max_collections: Option<usize>,
    /// Collections acquired at once.
    pub collection_concurrency: usize,
    /// Stagger between collection starts.
    #[serde(with = "duration_millis")]
    pub inter_collection_delay: Duration,
    /// Policy applied to every collection.
    pub collection: AcquisitionPolicy,
}

impl Default for ListingPolicy {
    fn default() -> Self {
        Self {
            max_collections: None,
            collection_concurrency: DEFAULT_COLLECTION_CONCURRENCY,
            inter_collection_delay: DEFAULT_INTER_COLLECTION_DELAY,
            collection: AcquisitionPolicy::default(),
        }
    }
}

impl ListingPolicy {
    /// Checks that the policy is usable.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidPolicy`] when the collection
    /// concurrency or the nested collection policy is invalid.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if !(1..=MAX_CONCURRENCY).contains(&self.collection_concurrency) {
            return Err(OrchestratorError::invalid_policy(format!(
                "collection concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.collection_concurrency
            )));
        }
        self.collection.validate()
    }

    /// Collection cap, with `0` read as no limit.
    #[must_use]
    pub fn collection_limit(&self) -> Option<usize> {
        self.max_collections.filter(|&limit| limit > 0)
    }
}

pub(super) mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(AcquisitionPolicy::default().validate().is_ok());
        assert!(ListingPolicy::default().validate().is_ok());
        assert_eq!(AcquisitionPolicy::default().member_concurrency, 1);
        assert_eq!(ListingPolicy::default().collection_concurrency, 2);
    }

    #[test]
    fn test_start_after_end_rejected() {
        let policy = AcquisitionPolicy {
            start: Some(10.0),
            end: Some(2.0),
            ..AcquisitionPolicy::default()
        };
        let err = policy.validate().unwrap_err();
        assert!(err.to_string().contains("greater than end"));
    }

    #[test]
    fn test_negative_or_nan_bound_rejected() {
        for bound in [-1.0, f64::NAN] {
            let policy = AcquisitionPolicy {
                start: Some(bound),
                ..AcquisitionPolicy::default()
            };
            assert!(policy.validate().is_err());
        }
    }

    #[test]
    fn test_concurrency_bounds() {
        let zero = AcquisitionPolicy {
            member_concurrency: 0,
            ..AcquisitionPolicy::default()
        };
        assert!(zero.validate().is_err());
        let listing = ListingPolicy {
            collection_concurrency: MAX_CONCURRENCY + 1,
            ..ListingPolicy::default()
        };
        assert!(listing.validate().is_err());
    }

    #[test]
    fn test_zero_limits_mean_unlimited() {
        let policy = AcquisitionPolicy {
            max_items_per_member: Some(0),
            ..AcquisitionPolicy::default()
        };
        assert_eq!(policy.item_limit(), None);
        let listing = ListingPolicy {
            max_collections: Some(0),
            ..ListingPolicy::default()
        };
        assert_eq!(listing.collection_limit(), None);
    }

    #[test]
    fn test_policy_serde_uses_millis() {
        let json = serde_json::to_value(AcquisitionPolicy::default()).unwrap();
        assert_eq!(json["inter_member_delay"], 2000);
        let parsed: AcquisitionPolicy = serde_json::from_str(r#"{"inter_item_delay": 10}"#).unwrap();
        assert_eq!(parsed.inter_item_delay, Duration::from_millis(10));
        assert_eq!(parsed.member_concurrency, DEFAULT_MEMBER_CONCURRENCY);
    }
}
