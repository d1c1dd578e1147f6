//! Selector and heuristic configuration for [`super::SelectorParser`].

use serde::{Deserialize, Serialize};

/// Selectors and heuristics used to read collection, member and listing pages.
///
/// The defaults target the common layouts of Vietnamese comic readers
/// (`NetTruyen` family) and fall back to generic markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Title selectors tried in order; the first with a plausible title wins.
    pub title_selectors: Vec<String>,
    /// Titles must be longer than this many characters.
    pub min_title_chars: usize,
    /// Member link selector groups; the first group matching any link wins.
    pub member_link_selectors: Vec<String>,
    /// Whether member pages list newest first (the extracted list is reversed).
    pub members_listed_descending: bool,
    /// Pattern capturing a member id from link text or href (group 1).
    pub member_id_pattern: String,
    /// Pattern for a fractional id written into an href (`chuong-12-5`),
    /// capturing the whole and fractional parts (groups 1 and 2).
    pub member_href_fraction_pattern: String,
    /// Item selectors; the first yielding an accepted item wins.
    pub item_selectors: Vec<String>,
    /// Image attributes checked in order for a source address.
    pub item_attributes: Vec<String>,
    /// Image attributes checked in order when collecting a whole page's images.
    pub page_image_attributes: Vec<String>,
    /// Substrings marking an image address as decoration rather than content.
    pub item_skip_patterns: Vec<String>,
    /// Listing page: substrings a collection link must contain (any).
    pub collection_include_patterns: Vec<String>,
    /// Listing page: substrings a collection link must not contain.
    pub collection_exclude_patterns: Vec<String>,
    /// Listing page: title prefixes stripped from collection titles.
    pub collection_title_prefixes: Vec<String>,
    /// Listing page: titles must be longer than this many characters.
    pub min_collection_title_chars: usize,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            title_selectors: strings(&[
                "h1.title-detail",
                "h1.manga-title",
                "h1.entry-title",
                ".manga-info h1",
                ".detail-info h1",
                "h1",
                "title",
            ]),
            min_title_chars: 3,
            member_link_selectors: strings(&[
                ".list-chapter .row .chapter a",
                ".chapter-list a, .chapters a, .manga-chapters a",
            ]),
            members_listed_descending: true,
            member_id_pattern: r"(?i)(?:chapter|chương|chuong|chap)[\s\-_.]*(\d+(?:\.\d+)?)"
                .to_string(),
            member_href_fraction_pattern: r"(?i)(?:chapter|chuong|chap)[\-_]*(\d+)[\-_.](\d+)/?(?:[?#].*)?$"
                .to_string(),
            item_selectors: strings(&[
                ".reading-detail .page-chapter img",
                ".chapter-content img",
                ".manga-content img",
                ".reader-content img",
                ".chapter img",
                "img[data-src]",
                "img[src]",
            ]),
            item_attributes: strings(&["data-src", "data-original", "src", "data-lazy"]),
            page_image_attributes: strings(&[
                "src",
                "data-src",
                "data-original",
                "data-lazy",
                "data-url",
                "data-img-src",
            ]),
            item_skip_patterns: strings(&[
                "/ads/",
                "banner",
                "icon",
                "logo",
                "avatar",
                "thumb-default",
                "facebook",
                "twitter",
                "social",
                "button",
            ]),
            collection_include_patterns: strings(&["/truyen-tranh/"]),
            collection_exclude_patterns: strings(&["/chuong-"]),
            collection_title_prefixes: strings(&["Truyện tranh ", "Comic ", "Manga "]),
            min_collection_title_chars: 2,
        }
    }
}
