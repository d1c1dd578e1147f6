//! Collecting every image shown on a single web page.
//!
//! Images land under a folder named after the page's host. Remote images go
//! through the same header-profile rotation and validation as member items;
//! `data:` images embedded in the page are decoded in place.

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures_util::StreamExt;
use futures_util::stream;
use image::ImageReader;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::item::fetch_item;
use super::policy::duration_millis;
use super::result::duration_secs;
use super::{
    AcquisitionPolicy, AcquisitionStatus, DEFAULT_INTER_ITEM_DELAY, MAX_CONCURRENCY, Orchestrator,
    OrchestratorError, Run,
};
use crate::browser::SettlePlan;
use crate::collection::{CollectionRef, ItemRef, is_item_filename};
use crate::fetch::{HeaderProfile, RateLimiter, fetch_with_retry, merge_headers};
use crate::parser::{InlineImage, PageImages};
use crate::storage::{content_type_for, join_key};

/// Default cap on images collected from one page.
pub const DEFAULT_MAX_PAGE_IMAGES: usize = 100;

/// Default number of images fetched at once.
const DEFAULT_IMAGE_CONCURRENCY: usize = 4;

/// Characters kept in short previews of embedded images.
const INLINE_PREVIEW_CHARS: usize = 50;

/// Knobs for one page-images run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageImagesPolicy {
    /// Cap on images stored; `None` or `Some(0)` means unlimited.
    pub max_images: Option<usize>,
    /// Also store `data:` images embedded in the page.
    pub include_inline: bool,
    /// Render the page in the browser as well and merge what it shows.
    pub use_browser: bool,
    /// Images fetched at once.
    pub concurrency: usize,
    /// Minimum spacing between requests to one host.
    #[serde(with = "duration_millis")]
    pub inter_item_delay: Duration,
    /// Extra request headers, overriding the defaults.
    pub custom_headers: Vec<(String, String)>,
}

impl Default for PageImagesPolicy {
    fn default() -> Self {
        Self {
            max_images: Some(DEFAULT_MAX_PAGE_IMAGES),
            include_inline: true,
            use_browser: false,
            concurrency: DEFAULT_IMAGE_CONCURRENCY,
            inter_item_delay: DEFAULT_INTER_ITEM_DELAY,
            custom_headers: Vec::new(),
        }
    }
}

impl PageImagesPolicy {
    /// Checks the concurrency bound.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidPolicy`] when `concurrency` is
    /// outside `1..=MAX_CONCURRENCY`.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(OrchestratorError::invalid_policy(format!(
                "image concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            )));
        }
        Ok(())
    }

    /// The effective image cap, `None` meaning unlimited.
    #[must_use]
    pub fn image_limit(&self) -> Option<usize> {
        self.max_images.filter(|&limit| limit > 0)
    }
}

/// One stored image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageImage {
    /// Source address, or a shortened `data:` URI for embedded images.
    pub source: String,
    /// Filename inside the page folder.
    pub filename: String,
    /// Where the backend put it.
    pub location: String,
    /// Stored size.
    pub size_bytes: usize,
    /// Pixel width, when the format could be decoded.
    pub width: Option<u32>,
    /// Pixel height, when the format could be decoded.
    pub height: Option<u32>,
    /// Detected format extension, e.g. `png`.
    pub format: Option<String>,
}

/// Result of collecting a page's images. Always produced, even on failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageImagesResult {
    /// Aggregate status.
    pub status: AcquisitionStatus,
    /// The page.
    pub url: String,
    /// Host the folder is named after, `www.` removed.
    pub domain: String,
    /// Storage folder holding the images.
    pub folder: String,
    /// Images found on the page before capping.
    pub total_found: usize,
    /// Images stored during this run.
    pub images: Vec<PageImage>,
    /// Filenames already present and left alone.
    pub skipped: Vec<String>,
    /// One entry per failed page load or image.
    pub errors: Vec<String>,
    /// Wall-clock duration.
    #[serde(rename = "elapsed_seconds", serialize_with = "duration_secs")]
    pub elapsed: Duration,
}

impl PageImagesResult {
    fn failed(url: &str, domain: String, errors: Vec<String>, started: Instant) -> Self {
        Self {
            status: AcquisitionStatus::Failed,
            url: url.to_string(),
            folder: domain.clone(),
            domain,
            total_found: 0,
            images: Vec::new(),
            skipped: Vec::new(),
            errors,
            elapsed: started.elapsed(),
        }
    }
}

/// Storage folder for a page: its host, lowercased, without `www.`, with
/// anything outside word characters, `-` and `.` replaced by `_`.
///
/// Returns `None` for anything but an http(s) URL with a host.
///
/// # Examples
///
/// ```
/// use series_downloader::orchestrator::page_folder;
///
/// assert_eq!(page_folder("https://www.Example.com/gallery").as_deref(), Some("example.com"));
/// assert_eq!(page_folder("ftp://example.com/a.png"), None);
/// ```
#[must_use]
pub fn page_folder(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    Some(safe_segment(host)).filter(|folder| !folder.is_empty())
}

enum Stored {
    Image(PageImage),
    Skipped(String),
    Failed(String),
}

impl Orchestrator {
    /// Collects the images shown on one web page into a per-domain folder.
    ///
    /// Remote sources come first, in page order, then embedded `data:`
    /// images take whatever the cap leaves. Files whose names come from the
    /// source URL and already exist are skipped.
    #[instrument(skip(self, policy), fields(url = %url))]
    pub async fn acquire_page_images(&self, url: &str, policy: &PageImagesPolicy) -> PageImagesResult {
        let started = Instant::now();
        let Some(domain) = page_folder(url) else {
            return PageImagesResult::failed(
                url,
                String::new(),
                vec![format!("Invalid URL {url}: must start with http:// or https://")],
                started,
            );
        };
        if let Err(error) = policy.validate() {
            return PageImagesResult::failed(url, domain, vec![error.to_string()], started);
        }

        let inner = self.inner.as_ref();
        let mut errors = Vec::new();
        let mut found = PageImages::default();

        let headers = merge_headers(HeaderProfile::html_page(url), &policy.custom_headers);
        match fetch_with_retry(inner.fetcher.as_ref(), url, &headers, &inner.page_retry).await {
            Ok(page) => found.merge(inner.parser.extract_page_images(&page.text(), url)),
            Err(error) => {
                warn!(error = %error, "page unavailable");
                errors.push(format!("Page {url}: {error}"));
            }
        }
        if policy.use_browser {
            match inner.browser.load_and_settle(url, &SettlePlan::item_page()).await {
                Ok(html) => found.merge(inner.parser.extract_page_images(&html, url)),
                Err(error) => {
                    warn!(error = %error, "browser render failed");
                    errors.push(format!("Browser render of {url}: {error}"));
                }
            }
        }

        let total_found = found.len();
        if found.is_empty() {
            if errors.is_empty() {
                errors.push(format!("No images found on {url}"));
            }
            return PageImagesResult::failed(url, domain, errors, started);
        }

        let PageImages { mut sources, mut inline } = found;
        if let Some(limit) = policy.image_limit() {
            sources.truncate(limit);
            inline.truncate(limit - sources.len());
        }
        if !policy.include_inline {
            inline.clear();
        }
        info!(found = total_found, remote = sources.len(), inline = inline.len(), "page images selected");

        let item_policy = AcquisitionPolicy {
            inter_item_delay: policy.inter_item_delay,
            custom_headers: policy.custom_headers.clone(),
            ..AcquisitionPolicy::default()
        };
        let limiter = RateLimiter::new(policy.inter_item_delay);
        let collection = CollectionRef::new(url, domain.as_str());
        let run = Run {
            inner,
            policy: &item_policy,
            limiter: &limiter,
            collection: &collection,
            network_started: AtomicBool::new(false),
        };
        let run = &run;
        let folder = domain.as_str();

        let names = planned_names(&sources);
        let remote: Vec<Stored> = stream::iter(sources.into_iter().zip(names).enumerate())
            .map(move |(position, (source, name))| async move {
                store_remote(run, folder, url, position + 1, source, name).await
            })
            .buffered(policy.concurrency)
            .collect()
            .await;

        let mut images = Vec::new();
        let mut skipped = Vec::new();
        for outcome in remote {
            match outcome {
                Stored::Image(image) => images.push(image),
                Stored::Skipped(name) => skipped.push(name),
                Stored::Failed(error) => errors.push(error),
            }
        }
        for (position, embedded) in inline.iter().enumerate() {
            match store_inline(run, folder, position + 1, embedded).await {
                Ok(image) => images.push(image),
                Err(error) => errors.push(error),
            }
        }

        let status = if images.is_empty() && skipped.is_empty() {
            AcquisitionStatus::Failed
        } else if errors.is_empty() {
            AcquisitionStatus::Success
        } else {
            AcquisitionStatus::Partial
        };
        info!(%status, stored = images.len(), skipped = skipped.len(), "page images finished");

        PageImagesResult {
            status,
            url: url.to_string(),
            folder: domain.clone(),
            domain,
            total_found,
            images,
            skipped,
            errors,
            elapsed: started.elapsed(),
        }
    }
}

async fn store_remote(
    run: &Run<'_>,
    folder: &str,
    referer: &str,
    index: usize,
    source: String,
    name: Option<String>,
) -> Stored {
    let storage = run.inner.storage.as_ref();
    if let Some(name) = &name {
        let key = join_key(&[folder, name]);
        match storage.exists(&key).await {
            Ok(true) => {
                debug!(filename = %name, "image already stored");
                return Stored::Skipped(name.clone());
            }
            Ok(false) => {}
            Err(error) => warn!(error = %error, key = %key, "existence check failed; fetching anyway"),
        }
    }

    let item = ItemRef {
        index,
        address: source,
        filename: name.clone().unwrap_or_else(|| format!("image_{index:03}")),
    };
    let bytes = match fetch_item(run, &item, referer).await {
        Ok(bytes) => bytes,
        Err(error) => return Stored::Failed(format!("Image {}: {error}", item.address)),
    };

    let (format, dimensions) = describe(&bytes);
    let filename = name.unwrap_or_else(|| {
        format!("image_{index:03}.{}", format.as_deref().unwrap_or("jpg"))
    });
    match write_image(run, folder, &filename, &bytes).await {
        Ok(location) => Stored::Image(PageImage {
            source: item.address,
            filename,
            location,
            size_bytes: bytes.len(),
            width: dimensions.map(|(width, _)| width),
            height: dimensions.map(|(_, height)| height),
            format,
        }),
        Err(error) => Stored::Failed(format!("Image {}: {error}", item.address)),
    }
}

async fn store_inline(
    run: &Run<'_>,
    folder: &str,
    index: usize,
    embedded: &InlineImage,
) -> Result<PageImage, String> {
    let bytes = STANDARD
        .decode(&embedded.data)
        .map_err(|e| format!("Inline image {index}: invalid base64: {e}"))?;
    let extension = match embedded.format.as_str() {
        "jpeg" => "jpg",
        "svg+xml" => "svg",
        other => other,
    };
    let filename = format!("inline_{index:03}.{}", safe_segment(extension));
    let location = write_image(run, folder, &filename, &bytes)
        .await
        .map_err(|e| format!("Inline image {index}: {e}"))?;
    let (format, dimensions) = describe(&bytes);
    let preview: String = embedded.data.chars().take(INLINE_PREVIEW_CHARS).collect();
    Ok(PageImage {
        source: format!("data:image/{};base64,{preview}...", embedded.format),
        filename,
        location,
        size_bytes: bytes.len(),
        width: dimensions.map(|(width, _)| width),
        height: dimensions.map(|(_, height)| height),
        format: format.or_else(|| Some(extension.to_string())),
    })
}

async fn write_image(run: &Run<'_>, folder: &str, filename: &str, bytes: &[u8]) -> Result<String, String> {
    let key = join_key(&[folder, filename]);
    run.inner
        .storage
        .write_item(&key, bytes, content_type_for(filename))
        .await
        .map_err(|e| e.to_string())
}

/// Filenames taken from each source's URL, when usable.
///
/// A name is usable when it has an image extension and no earlier source
/// already claimed it; the rest get positional names once their format is
/// known.
fn planned_names(sources: &[String]) -> Vec<Option<String>> {
    let mut taken = HashSet::new();
    sources
        .iter()
        .map(|source| {
            url_filename(source)
                .filter(|name| is_item_filename(name))
                .filter(|name| taken.insert(name.to_ascii_lowercase()))
        })
        .collect()
}

fn url_filename(source: &str) -> Option<String> {
    let parsed = Url::parse(source).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(segment).ok()?;
    let (stem, ext) = decoded.rsplit_once('.')?;
    let stem = safe_segment(stem);
    if stem.trim_matches('_').is_empty() {
        return None;
    }
    Some(format!("{stem}.{}", ext.to_ascii_lowercase()))
}

/// Detected format extension and dimensions.
fn describe(bytes: &[u8]) -> (Option<String>, Option<(u32, u32)>) {
    let format = image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().map(|ext| (*ext).to_string()));
    let dimensions = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok());
    (format, dimensions)
}

fn safe_segment(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') { c } else { '_' })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_page_folder_normalizes_host() {
        assert_eq!(page_folder("https://www.Example.COM/a/b?c=1").as_deref(), Some("example.com"));
        assert_eq!(page_folder("http://127.0.0.1:8080/").as_deref(), Some("127.0.0.1"));
        assert_eq!(page_folder("https://cdn.site-x.test/").as_deref(), Some("cdn.site-x.test"));
        assert_eq!(page_folder("https://xn--bcher-kva.test/").as_deref(), Some("xn--bcher-kva.test"));
    }

    #[test]
    fn test_page_folder_rejects_other_schemes() {
        assert_eq!(page_folder("ftp://example.com/a.png"), None);
        assert_eq!(page_folder("example.com/gallery"), None);
        assert_eq!(page_folder("data:image/png;base64,AAAA"), None);
    }

    #[test]
    fn test_planned_names_keep_first_claim() {
        let sources = vec![
            "https://a.test/img/cover.JPG".to_string(),
            "https://b.test/other/cover.jpg".to_string(),
            "https://a.test/render?id=7".to_string(),
            "https://a.test/img/my%20photo.png".to_string(),
            "https://a.test/img/notes.txt".to_string(),
        ];
        assert_eq!(
            planned_names(&sources),
            vec![
                Some("cover.jpg".to_string()),
                None,
                None,
                Some("my_photo.png".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_describe_reads_format_and_size() {
        let (format, dimensions) = describe(&png_bytes(7, 3));
        assert_eq!(format.as_deref(), Some("png"));
        assert_eq!(dimensions, Some((7, 3)));

        let (format, dimensions) = describe(b"definitely not an image");
        assert_eq!(format, None);
        assert_eq!(dimensions, None);
    }

    #[test]
    fn test_policy_limits() {
        assert_eq!(PageImagesPolicy::default().image_limit(), Some(DEFAULT_MAX_PAGE_IMAGES));
        let unlimited = PageImagesPolicy {
            max_images: Some(0),
            ..PageImagesPolicy::default()
        };
        assert_eq!(unlimited.image_limit(), None);

        let bad = PageImagesPolicy {
            concurrency: 0,
            ..PageImagesPolicy::default()
        };
        assert!(matches!(bad.validate(), Err(OrchestratorError::InvalidPolicy { .. })));
        assert!(PageImagesPolicy::default().validate().is_ok());
    }
}
