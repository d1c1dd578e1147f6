//! Integration tests for listing acquisition.

mod support;

use std::time::Duration;

use series_downloader::orchestrator::{AcquisitionStatus, ListingPolicy};
use support::*;
use tempfile::TempDir;
use wiremock::MockServer;

fn listing_html(series: &[(&str, &str)]) -> String {
    let links: String = series
        .iter()
        .map(|(href, title)| format!(r#"<div class="item"><a href="{href}" title="Truyện tranh {title}">{title}</a></div>"#))
        .collect();
    format!(
        r#"<html><body>{links}<a href="/the-loai/action">Action</a><a href="/truyen-tranh/alpha/chuong-1">Chapter 1</a></body></html>"#
    )
}

fn fast_listing_policy() -> ListingPolicy {
    ListingPolicy {
        inter_collection_delay: Duration::ZERO,
        collection: fast_policy(),
        ..ListingPolicy::default()
    }
}

#[tokio::test]
async fn test_listing_acquires_every_collection_in_order() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    mount_html(
        &server,
        "/",
        listing_html(&[("/truyen-tranh/alpha", "Alpha Series"), ("/truyen-tranh/beta", "Beta Series")]),
    )
    .await;
    mount_html(&server, "/truyen-tranh/alpha", collection_html("Alpha Series", "/truyen-tranh/alpha", &[1])).await;
    mount_html(&server, "/truyen-tranh/beta", collection_html("Beta Series", "/truyen-tranh/beta", &[7])).await;
    mount_chapter(&server, "/truyen-tranh/alpha", 1, 2, 1).await;
    mount_chapter(&server, "/truyen-tranh/beta", 7, 1, 1).await;

    let url = format!("{}/", server.uri());
    let result = orchestrator(temp.path()).acquire_listing(&url, &fast_listing_policy()).await;

    assert_eq!(result.status, AcquisitionStatus::Success, "errors: {:?}", result.errors);
    assert_eq!(result.total_collections_found, 2);
    let keys: Vec<&str> = result.collections.iter().map(|c| c.collection.key.as_str()).collect();
    assert_eq!(keys, vec!["Alpha_Series", "Beta_Series"]);
    assert_eq!(result.items_fetched, 3);
    assert!(temp.path().join("Beta_Series").join("Member_7").join("001.jpg").exists());
}

#[tokio::test]
async fn test_listing_cap_and_partial_status() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    mount_html(
        &server,
        "/",
        listing_html(&[
            ("/truyen-tranh/alpha", "Alpha Series"),
            ("/truyen-tranh/beta", "Beta Series"),
            ("/truyen-tranh/gamma", "Gamma Series"),
        ]),
    )
    .await;
    mount_html(&server, "/truyen-tranh/alpha", collection_html("Alpha Series", "/truyen-tranh/alpha", &[1])).await;
    mount_chapter(&server, "/truyen-tranh/alpha", 1, 1, 1).await;
    // Beta's page is missing, gamma is beyond the cap.

    let policy = ListingPolicy {
        max_collections: Some(2),
        ..fast_listing_policy()
    };
    let url = format!("{}/", server.uri());
    let result = orchestrator(temp.path()).acquire_listing(&url, &policy).await;

    assert_eq!(result.status, AcquisitionStatus::Partial);
    assert_eq!(result.total_collections_found, 3);
    assert_eq!(result.collections.len(), 2);
    assert_eq!(result.collections[1].status, AcquisitionStatus::Failed);
    assert_eq!(result.errors.len(), 1);
}

#[tokio::test]
async fn test_listing_without_collections_fails() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    mount_html(&server, "/", "<html><body><a href=\"/the-loai/action\">Action</a></body></html>".to_string()).await;

    let url = format!("{}/", server.uri());
    let result = orchestrator(temp.path()).acquire_listing(&url, &fast_listing_policy()).await;

    assert_eq!(result.status, AcquisitionStatus::Failed);
    assert!(result.collections.is_empty());
    assert_eq!(result.errors.len(), 1);
}

#[tokio::test]
async fn test_listing_rejects_invalid_concurrency() {
    let temp = TempDir::new().unwrap();
    let policy = ListingPolicy {
        collection_concurrency: 0,
        ..fast_listing_policy()
    };
    let result = orchestrator(temp.path())
        .acquire_listing("https://site.test/", &policy)
        .await;
    assert_eq!(result.status, AcquisitionStatus::Failed);
    assert!(result.errors[0].contains("concurrency"));
}
