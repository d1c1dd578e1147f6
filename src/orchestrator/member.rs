//! The per-member pipeline: skip, discover, fetch, record.

use std::collections::HashSet;
use std::sync::atomic::Ordering;

use tracing::{debug, info, instrument, warn};

use super::item::fetch_item;
use super::{MemberOutcome, MemberState, Run};
use crate::collection::{ItemRef, MemberRef};
use crate::ledger::item_key;
use crate::storage::content_type_for;

/// Runs one member to a terminal state. Never fails: problems end up in the
/// outcome's errors.
#[instrument(skip(run, member), fields(collection = %run.collection.key, member = %member.id))]
pub(super) async fn acquire_member(run: &Run<'_>, member: MemberRef) -> MemberOutcome {
    let inner = run.inner;
    let key = run.collection.key.as_str();
    let mut outcome = MemberOutcome::pending(member);
    let member_id = outcome.member.id.clone();
    let address = outcome.member.address.clone();

    if !run.policy.revalidate_members {
        let (exists, items) = inner.ledger.member_exists(key, &member_id).await;
        if exists {
            info!(items = items.len(), "member already stored; skipping");
            outcome.items = items;
            outcome.advance(MemberState::Skipped);
            return outcome;
        }
    }

    if run.network_started.swap(true, Ordering::SeqCst) && !run.policy.inter_member_delay.is_zero() {
        debug!(delay_ms = run.policy.inter_member_delay.as_millis(), "pausing before member");
        tokio::time::sleep(run.policy.inter_member_delay).await;
    }

    outcome.advance(MemberState::Discovering);
    let mut sources = match inner.items.resolve(&address, &run.policy.custom_headers).await {
        Ok(sources) => sources,
        Err(error) => {
            warn!(error = %error, "item discovery failed");
            outcome.errors.push(error.to_string());
            outcome.advance(MemberState::Failed);
            return outcome;
        }
    };

    let mut seen = HashSet::new();
    sources.retain(|source| seen.insert(source.clone()));
    if let Some(limit) = run.policy.item_limit() {
        sources.truncate(limit);
    }
    outcome.items_found = sources.len();
    let items = ItemRef::from_sources(&sources);

    outcome.advance(MemberState::Fetching);
    let mut stored = Vec::with_capacity(items.len());
    for item in &items {
        if run.policy.revalidate_members && inner.ledger.item_exists(key, &member_id, &item.filename).await {
            debug!(item = %item.filename, "item already stored");
            stored.push(item.filename.clone());
            continue;
        }

        let bytes = match fetch_item(run, item, &address).await {
            Ok(bytes) => bytes,
            Err(error) => {
                outcome.errors.push(error);
                continue;
            }
        };
        let storage_key = item_key(key, &member_id, &item.filename);
        match inner
            .storage
            .write_item(&storage_key, &bytes, content_type_for(&item.filename))
            .await
        {
            Ok(location) => {
                stored.push(item.filename.clone());
                outcome.locations.push(location);
                outcome.items_fetched += 1;
            }
            Err(error) => {
                warn!(item = %item.filename, error = %error, "storing item failed");
                outcome.errors.push(format!("{}: {error}", item.filename));
            }
        }
    }

    stored.sort();
    if stored.is_empty() {
        outcome.advance(MemberState::Failed);
        return outcome;
    }

    if let Err(error) = inner.ledger.record_member(key, &member_id, &stored).await {
        warn!(error = %error, "recording progress failed");
        outcome.errors.push(format!("progress record: {error}"));
    }
    outcome.items = stored;
    let state = if outcome.errors.is_empty() {
        MemberState::Recorded
    } else {
        MemberState::RecordedPartial
    };
    outcome.advance(state);
    info!(
        items = outcome.items.len(),
        fetched = outcome.items_fetched,
        errors = outcome.errors.len(),
        state = ?outcome.state,
        "member finished"
    );
    outcome
}
