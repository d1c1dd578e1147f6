//! Identities for collections, members and items.
//!
//! A collection (a series) is identified by its sanitized storage key. Its
//! members (chapters) are resolved fresh on every run and normalized into a
//! stable order; each member's items (page images) are named by position so
//! that re-fetching produces the same filenames.

mod filter;
mod key;
mod normalize;

pub use filter::{FilterOutcome, MemberFilter, RangeFallback};
pub use key::{UNKNOWN_COLLECTION, sanitize_key};
pub use normalize::{DiscoveredMember, normalize_members};

use serde::{Deserialize, Serialize};

/// File extensions accepted as stored items.
pub const ITEM_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

/// Extension used when an item's source address carries none we recognize.
pub const DEFAULT_ITEM_EXTENSION: &str = "jpg";

/// Minimum zero-padding width for item filenames.
const MIN_FILENAME_WIDTH: usize = 3;

/// A resolved collection: where it came from and where it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRef {
    /// Page the collection was discovered from.
    pub source_url: String,
    /// Human-readable title as extracted from the page.
    pub title: String,
    /// Sanitized storage key; two refs with the same key share storage.
    pub key: String,
}

impl CollectionRef {
    /// Creates a collection reference, deriving the key from the title.
    #[must_use]
    pub fn new(source_url: impl Into<String>, title: impl Into<String>) -> Self {
        let title = title.into();
        let key = sanitize_key(&title);
        Self {
            source_url: source_url.into(),
            title,
            key,
        }
    }
}

/// One member (chapter) of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRef {
    /// Member identifier, possibly fractional (`"12.5"`) or symbolic (`"extra"`).
    pub id: String,
    /// Display title.
    pub title: String,
    /// Page holding the member's items.
    pub address: String,
    /// 1-based position after normalization.
    pub ordinal: usize,
}

impl MemberRef {
    /// Returns the numeric value of the id when it is a plain decimal number.
    #[must_use]
    pub fn numeric_id(&self) -> Option<f64> {
        numeric_id(&self.id)
    }
}

/// Parses an id as a plain decimal number (`"7"`, `"12.5"`).
///
/// Anything else (`"extra"`, `"1e3"`, `"NaN"`) is symbolic.
#[must_use]
pub fn numeric_id(id: &str) -> Option<f64> {
    let trimmed = id.trim();
    let mut parts = trimmed.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();
    let is_decimal = !whole.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.is_none_or(|f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()));
    if !is_decimal {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// One item (image) of a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    /// 1-based position in the de-duplicated item list.
    pub index: usize,
    /// Source address of the item.
    pub address: String,
    /// Stable storage filename derived from `index`.
    pub filename: String,
}

impl ItemRef {
    /// Builds item refs from an ordered, de-duplicated list of source addresses.
    ///
    /// Filenames are zero-padded positions (`001.jpg`); the width grows past 3
    /// digits only when the list is long enough to need it.
    #[must_use]
    pub fn from_sources(sources: &[String]) -> Vec<Self> {
        let width = MIN_FILENAME_WIDTH.max(sources.len().to_string().len());
        sources
            .iter()
            .enumerate()
            .map(|(position, address)| {
                let index = position + 1;
                Self {
                    index,
                    address: address.clone(),
                    filename: format!("{index:0width$}.{}", extension_for(address)),
                }
            })
            .collect()
    }
}

/// Returns true when the filename ends in an accepted item extension.
#[must_use]
pub fn is_item_filename(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| ITEM_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn extension_for(address: &str) -> &'static str {
    let path = url::Url::parse(address)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| address.split(['?', '#']).next().unwrap_or_default().to_string());
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "jpg",
        Some("png") => "png",
        Some("webp") => "webp",
        Some("gif") => "gif",
        _ => DEFAULT_ITEM_EXTENSION,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_ref_derives_key_from_title() {
        let collection = CollectionRef::new("https://site.test/truyen-tranh/abc", "One Piece: Vol 1");
        assert_eq!(collection.key, "One_Piece_Vol_1");
        assert_eq!(collection.title, "One Piece: Vol 1");
    }

    #[test]
    fn test_numeric_id_accepts_integers_and_fractions() {
        assert_eq!(numeric_id("7"), Some(7.0));
        assert_eq!(numeric_id("12.5"), Some(12.5));
        assert_eq!(numeric_id(" 3 "), Some(3.0));
    }

    #[test]
    fn test_numeric_id_rejects_symbolic_values() {
        assert_eq!(numeric_id("extra"), None);
        assert_eq!(numeric_id("NaN"), None);
        assert_eq!(numeric_id("1e3"), None);
        assert_eq!(numeric_id("4."), None);
        assert_eq!(numeric_id(""), None);
    }

    #[test]
    fn test_item_filenames_are_positional() {
        let sources = vec![
            "https://cdn.test/a/page-1.jpg".to_string(),
            "https://cdn.test/a/page-2.png?token=x".to_string(),
            "https://cdn.test/a/page-3".to_string(),
        ];
        let items = ItemRef::from_sources(&sources);
        let names: Vec<&str> = items.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, vec!["001.jpg", "002.png", "003.jpg"]);
        assert_eq!(items[2].index, 3);
    }

    #[test]
    fn test_item_filenames_normalize_jpeg() {
        let items = ItemRef::from_sources(&["https://cdn.test/x.JPEG".to_string()]);
        assert_eq!(items[0].filename, "001.jpg");
    }

    #[test]
    fn test_item_filenames_widen_for_large_lists() {
        let sources: Vec<String> = (0..1200)
            .map(|i| format!("https://cdn.test/{i}.jpg"))
            .collect();
        let items = ItemRef::from_sources(&sources);
        assert_eq!(items[0].filename, "0001.jpg");
        assert_eq!(items[1199].filename, "1200.jpg");
    }

    #[test]
    fn test_is_item_filename() {
        assert!(is_item_filename("001.jpg"));
        assert!(is_item_filename("cover.WEBP"));
        assert!(!is_item_filename("progress.json"));
        assert!(!is_item_filename("noext"));
    }
}
