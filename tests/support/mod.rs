//! Shared fixtures for integration tests: a fake comic site on a mock server
//! and an orchestrator wired for fast, browser-free runs.
#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use series_downloader::browser::NoopBrowser;
use series_downloader::orchestrator::{AcquisitionPolicy, Orchestrator};
use series_downloader::storage::FilesystemBackend;
use series_downloader::{HttpFetcher, RetryPolicy};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SERIES_PATH: &str = "/truyen-tranh/test-series";
pub const SERIES_KEY: &str = "Test_Series";

/// A small but valid BMP image, distinct per seed.
pub fn image_bytes(seed: u8) -> Vec<u8> {
    let img = image::RgbImage::from_fn(32, 32, |x, y| {
        image::Rgb([seed, (x * 8) as u8, (y * 8) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Bmp)
        .expect("encode test image");
    out.into_inner()
}

/// A collection page listing chapters newest first, like the real sites do.
pub fn collection_html(title: &str, series_path: &str, chapters: &[u32]) -> String {
    let rows: String = chapters
        .iter()
        .rev()
        .map(|n| {
            format!(
                r#"<div class="row"><div class="chapter"><a href="{series_path}/chuong-{n}">Chapter {n}</a></div></div>"#
            )
        })
        .collect();
    format!(
        r#"<html><head><title>{title} - Read online</title></head><body>
        <h1 class="title-detail">{title}</h1>
        <div class="list-chapter">{rows}</div>
        </body></html>"#
    )
}

/// A member page showing the given image paths.
pub fn member_html(images: &[String]) -> String {
    let imgs: String = images
        .iter()
        .map(|src| format!(r#"<div class="page-chapter"><img data-src="{src}" alt="page"></div>"#))
        .collect();
    format!(r#"<html><body><div class="reading-detail">{imgs}</div></body></html>"#)
}

/// Image paths for chapter `n` with `count` pages.
pub fn image_paths(n: u32, count: u32) -> Vec<String> {
    (1..=count).map(|p| format!("/img/{n}/p{p}.jpg")).collect()
}

pub async fn mount_html(server: &MockServer, page: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Mounts a chapter page and its images, each image expected `image_hits` times.
pub async fn mount_chapter(server: &MockServer, series_path: &str, n: u32, pages: u32, image_hits: u64) {
    let images = image_paths(n, pages);
    mount_html(server, &format!("{series_path}/chuong-{n}"), member_html(&images)).await;
    for (i, image) in images.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path(image.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(image_bytes(i as u8)))
            .expect(image_hits)
            .mount(server)
            .await;
    }
}

/// Writes item files as if an earlier run had stored them.
pub fn seed_member(root: &Path, collection: &str, member_id: &str, files: &[&str]) {
    let dir = root.join(collection).join(format!("Member_{member_id}"));
    std::fs::create_dir_all(&dir).expect("create member dir");
    for file in files {
        std::fs::write(dir.join(file), image_bytes(0)).expect("seed item");
    }
}

pub fn orchestrator(root: &Path) -> Orchestrator {
    Orchestrator::builder(Arc::new(FilesystemBackend::new(root)))
        .fetcher(Arc::new(HttpFetcher::new().expect("http client")))
        .browser(Arc::new(NoopBrowser))
        .profile_rotation_delay(Duration::from_millis(10))
        .rate_limited_backoff(Duration::from_millis(10))
        .page_retry(RetryPolicy::no_retry())
        .build()
        .expect("orchestrator")
}

pub fn fast_policy() -> AcquisitionPolicy {
    AcquisitionPolicy {
        inter_item_delay: Duration::ZERO,
        inter_member_delay: Duration::ZERO,
        ..AcquisitionPolicy::default()
    }
}
