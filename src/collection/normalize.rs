//! Member list normalization shared by every discovery strategy.

use std::collections::HashSet;

use tracing::debug;

use super::{MemberRef, numeric_id};

/// A member as a discovery strategy found it, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredMember {
    /// Extracted id, if the strategy could find one.
    pub id: Option<String>,
    /// Display title.
    pub title: String,
    /// Page holding the member's items.
    pub address: String,
}

impl DiscoveredMember {
    /// Creates a discovered member.
    #[must_use]
    pub fn new(id: Option<String>, title: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty()),
            title: title.into(),
            address: address.into(),
        }
    }
}

/// Normalizes raw discovery output into the canonical member order.
///
/// 1. Duplicate addresses are dropped (first occurrence wins).
/// 2. Members with numeric ids are sorted ascending; later duplicates of an
///    id are dropped.
/// 3. Members with symbolic ids follow in discovery order.
/// 4. Members without an id are interleaved with the symbolic ones in
///    discovery order and receive the next unused integer id above the
///    numeric range.
/// 5. Ordinals are assigned 1-based from the final position.
#[must_use]
pub fn normalize_members(discovered: Vec<DiscoveredMember>) -> Vec<MemberRef> {
    let mut seen_addresses = HashSet::new();
    let mut numeric: Vec<(f64, DiscoveredMember)> = Vec::new();
    let mut trailing: Vec<DiscoveredMember> = Vec::new();

    for member in discovered {
        if !seen_addresses.insert(member.address.clone()) {
            debug!(address = %member.address, "dropping duplicate member address");
            continue;
        }
        match member.id.as_deref().and_then(numeric_id) {
            Some(value) => numeric.push((value, member)),
            None => trailing.push(member),
        }
    }

    numeric.sort_by(|(a, _), (b, _)| a.total_cmp(b));

    let mut used_ids: HashSet<String> = HashSet::new();
    let mut ordered: Vec<(String, DiscoveredMember)> = Vec::new();
    let mut last_value: Option<f64> = None;
    for (value, member) in numeric {
        if last_value.is_some_and(|last| last.total_cmp(&value).is_eq()) {
            debug!(address = %member.address, "dropping duplicate member id");
            continue;
        }
        last_value = Some(value);
        let id = member.id.clone().unwrap_or_default();
        used_ids.insert(id.clone());
        ordered.push((id, member));
    }

    let mut next_synthetic = next_integer_above(last_value);
    for member in trailing {
        let id = if let Some(id) = member.id.clone() {
            if used_ids.contains(&id) {
                debug!(id = %id, address = %member.address, "dropping duplicate member id");
                continue;
            }
            id
        } else {
            loop {
                let candidate = next_synthetic.to_string();
                next_synthetic += 1;
                if !used_ids.contains(&candidate) {
                    break candidate;
                }
            }
        };
        used_ids.insert(id.clone());
        ordered.push((id, member));
    }

    ordered
        .into_iter()
        .enumerate()
        .map(|(position, (id, member))| MemberRef {
            id,
            title: member.title,
            address: member.address,
            ordinal: position + 1,
        })
        .collect()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn next_integer_above(max: Option<f64>) -> u64 {
    match max {
        Some(value) if value >= 0.0 => value.floor() as u64 + 1,
        _ => 1,
    }
}
