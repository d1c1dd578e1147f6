//! Result rendering for the terminal.

use anyhow::Result;
use serde::Serialize;

use series_downloader::orchestrator::{
    AcquisitionResult, CollectionPreview, ListingResult, MemberState, PageImagesResult,
};
use series_downloader::ProgressSummary;

/// Errors shown before the rest are summarized as a count.
const MAX_ERRORS_SHOWN: usize = 10;

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn collection_summary_lines(result: &AcquisitionResult) -> Vec<String> {
    let skipped = result
        .members
        .iter()
        .filter(|m| m.state == MemberState::Skipped)
        .count();
    let failed = result
        .members
        .iter()
        .filter(|m| m.state == MemberState::Failed)
        .count();

    let mut lines = vec![
        format!("{} ({}): {}", result.collection.title, result.collection.key, result.status),
        format!(
            "  members: {} attempted of {} found, {skipped} already stored, {failed} failed",
            result.members.len(),
            result.total_members_found
        ),
        format!(
            "  items: {} fetched this run, {} held in total ({:.1}s)",
            result.items_fetched,
            result.total_items(),
            result.elapsed.as_secs_f64()
        ),
    ];
    lines.extend(result.warnings.iter().map(|w| format!("  warning: {w}")));
    lines.extend(error_lines(&result.errors));
    lines
}

pub(crate) fn listing_summary_lines(result: &ListingResult) -> Vec<String> {
    let mut lines = vec![format!(
        "{}: {} ({} of {} collections, {} items fetched, {:.1}s)",
        result.listing_url,
        result.status,
        result.collections.len(),
        result.total_collections_found,
        result.items_fetched,
        result.elapsed.as_secs_f64()
    )];
    for collection in &result.collections {
        lines.push(format!(
            "  {}: {} ({} items fetched)",
            collection.collection.key, collection.status, collection.items_fetched
        ));
    }
    lines.extend(error_lines(&result.errors));
    lines
}

pub(crate) fn progress_summary_lines(collection: &str, summary: &ProgressSummary) -> Vec<String> {
    if summary.total_members == 0 {
        return vec![format!("{collection}: no recorded members")];
    }
    let mut lines = vec![format!(
        "{collection}: {} members, {} items",
        summary.total_members, summary.total_items
    )];
    for (id, member) in &summary.per_member {
        lines.push(format!(
            "  {id}: {} items ({}, {})",
            member.items.len(),
            member.storage,
            member.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    lines
}

/// Preview of a collection, listing at most `limit` members (0 for all).
pub(crate) fn preview_lines(preview: &CollectionPreview, limit: usize) -> Vec<String> {
    let mut lines = vec![
        format!("{} ({})", preview.collection.title, preview.collection.key),
        format!("  {} members", preview.total_members),
    ];
    let shown = if limit == 0 { preview.members.len() } else { limit.min(preview.members.len()) };
    lines.extend(
        preview.members[..shown]
            .iter()
            .map(|member| format!("  {}: {} <{}>", member.id, member.title, member.address)),
    );
    if shown < preview.members.len() {
        lines.push(format!("  ... and {} more", preview.members.len() - shown));
    }
    lines
}

pub(crate) fn page_images_lines(result: &PageImagesResult) -> Vec<String> {
    let mut lines = vec![
        format!("{} -> {}: {}", result.url, result.folder, result.status),
        format!(
            "  images: {} stored, {} already stored, {} found ({:.1}s)",
            result.images.len(),
            result.skipped.len(),
            result.total_found,
            result.elapsed.as_secs_f64()
        ),
    ];
    lines.extend(error_lines(&result.errors));
    lines
}

fn error_lines(errors: &[String]) -> Vec<String> {
    let mut lines: Vec<String> = errors
        .iter()
        .take(MAX_ERRORS_SHOWN)
        .map(|e| format!("  error: {e}"))
        .collect();
    if errors.len() > MAX_ERRORS_SHOWN {
        lines.push(format!("  ... and {} more errors", errors.len() - MAX_ERRORS_SHOWN));
    }
    lines
}

pub(crate) fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}
