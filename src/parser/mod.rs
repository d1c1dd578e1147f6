//! HTML extraction for collection, member and listing pages.
//!
//! Extraction is pure: the same HTML and base URL always give the same
//! output. Network access belongs to [`crate::fetch`] and
//! [`crate::browser`]; this module only reads markup.

mod config;
mod error;
mod selector;

pub use config::ParserConfig;
pub use error::ParserError;
pub use selector::SelectorParser;

use serde::{Deserialize, Serialize};

use crate::collection::DiscoveredMember;

/// A collection found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionLink {
    /// Absolute collection page URL.
    pub url: String,
    /// Cleaned display title.
    pub title: String,
}

/// An image embedded in the page as a base64 `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    /// Declared subtype, e.g. `png`.
    pub format: String,
    /// The base64 payload, still encoded.
    pub data: String,
}

/// Every image a page references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageImages {
    /// Absolute image addresses in page order, de-duplicated.
    pub sources: Vec<String>,
    /// Inline images in page order.
    pub inline: Vec<InlineImage>,
}

impl PageImages {
    /// Number of images found.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len() + self.inline.len()
    }

    /// Returns true if the page references no image.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.inline.is_empty()
    }

    /// Adds what `other` found that is not already here.
    pub fn merge(&mut self, other: PageImages) {
        for source in other.sources {
            if !self.sources.contains(&source) {
                self.sources.push(source);
            }
        }
        for image in other.inline {
            if !self.inline.contains(&image) {
                self.inline.push(image);
            }
        }
    }
}

/// Extracts structure from fetched HTML.
pub trait PageParser: Send + Sync {
    /// Returns the collection title, or `None` when no plausible title exists.
    fn extract_title(&self, html: &str) -> Option<String>;

    /// Returns member links in ascending reading order (ids not yet normalized).
    fn extract_member_links(&self, html: &str, base_url: &str) -> Vec<DiscoveredMember>;

    /// Returns de-duplicated absolute item addresses in page order.
    fn extract_item_sources(&self, html: &str, base_url: &str) -> Vec<String>;

    /// Returns de-duplicated collection links from a listing page.
    fn extract_collection_links(&self, html: &str, base_url: &str) -> Vec<CollectionLink>;

    /// Returns every image on an arbitrary page: `<img>` sources and
    /// `srcset` candidates, CSS background images and inline `data:` images.
    /// No content heuristics are applied.
    fn extract_page_images(&self, html: &str, base_url: &str) -> PageImages;
}

/// Resolves `href` against `base`, keeping only http(s) results.
pub(crate) fn absolutize(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("data:") || href.starts_with("javascript:") {
        return None;
    }
    let joined = url::Url::parse(base)
        .and_then(|base| base.join(href))
        .or_else(|_| url::Url::parse(href))
        .ok()?;
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}
