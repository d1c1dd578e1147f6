//! CSS-selector implementation of [`PageParser`] backed by `scraper`.

use std::collections::HashSet;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, trace};

use super::{CollectionLink, InlineImage, PageImages, PageParser, ParserConfig, ParserError, absolutize};
use crate::collection::{DiscoveredMember, ITEM_EXTENSIONS};

/// [`PageParser`] driven by a [`ParserConfig`].
///
/// Selectors are compiled once at construction.
#[derive(Debug)]
pub struct SelectorParser {
    config: ParserConfig,
    title_selectors: Vec<Selector>,
    member_link_selectors: Vec<Selector>,
    item_selectors: Vec<Selector>,
    anchor_selector: Selector,
    image_selector: Selector,
    styled_selector: Selector,
    style_selector: Selector,
    member_id: Regex,
    member_href_fraction: Regex,
    background_url: Regex,
    inline_image: Regex,
}

const BACKGROUND_URL_PATTERN: &str = r#"background-image:\s*url\(\s*["']?([^"')]+?)["']?\s*\)"#;
const INLINE_IMAGE_PATTERN: &str = r"data:image/([a-zA-Z0-9.+-]+);base64,([A-Za-z0-9+/=]+)";

fn pattern(source: &str) -> Result<Regex, ParserError> {
    Regex::new(source).map_err(|e| ParserError::invalid_pattern(source, e.to_string()))
}

impl SelectorParser {
    /// Builds a parser from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError`] if a selector or the member id pattern is invalid.
    pub fn new(config: ParserConfig) -> Result<Self, ParserError> {
        Ok(Self {
            title_selectors: compile_all(&config.title_selectors)?,
            member_link_selectors: compile_all(&config.member_link_selectors)?,
            item_selectors: compile_all(&config.item_selectors)?,
            anchor_selector: compile("a[href]")?,
            image_selector: compile("img")?,
            styled_selector: compile("[style]")?,
            style_selector: compile("style")?,
            member_id: pattern(&config.member_id_pattern)?,
            member_href_fraction: pattern(&config.member_href_fraction_pattern)?,
            background_url: pattern(BACKGROUND_URL_PATTERN)?,
            inline_image: pattern(INLINE_IMAGE_PATTERN)?,
            config,
        })
    }

    /// Builds a parser with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError`] only if the built-in selectors fail to compile.
    pub fn with_defaults() -> Result<Self, ParserError> {
        Self::new(ParserConfig::default())
    }

    /// Link text wins; an href is read as `chuong-12-5` (12.5) before the
    /// plain pattern is tried on it.
    fn member_id_from(&self, text: &str, href: &str) -> Option<String> {
        if let Some(id) = self.member_id.captures(text).and_then(|caps| caps.get(1)) {
            return Some(id.as_str().to_string());
        }
        if let Some(caps) = self.member_href_fraction.captures(href)
            && let (Some(whole), Some(fraction)) = (caps.get(1), caps.get(2))
        {
            return Some(format!("{}.{}", whole.as_str(), fraction.as_str()));
        }
        self.member_id
            .captures(href)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn background_sources<'a>(&'a self, css: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.background_url
            .captures_iter(css)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    fn is_content_image(&self, address: &str) -> bool {
        let lower = address.to_lowercase();
        if self
            .config
            .item_skip_patterns
            .iter()
            .any(|pattern| lower.contains(&pattern.to_lowercase()))
        {
            return false;
        }
        let path = url::Url::parse(&lower).map_or(lower.clone(), |u| u.path().to_string());
        path.rsplit_once('.')
            .is_some_and(|(_, ext)| ITEM_EXTENSIONS.contains(&ext))
    }

    fn image_source(&self, element: &ElementRef<'_>) -> Option<String> {
        self.config.item_attributes.iter().find_map(|attribute| {
            element
                .value()
                .attr(attribute)
                .map(str::trim)
                .filter(|value| !value.is_empty() && !value.starts_with("data:"))
                .map(str::to_string)
        })
    }
}

fn compile(selector: &str) -> Result<Selector, ParserError> {
    Selector::parse(selector).map_err(|e| ParserError::invalid_selector(selector, e.to_string()))
}

fn compile_all(selectors: &[String]) -> Result<Vec<Selector>, ParserError> {
    selectors.iter().map(|s| compile(s)).collect()
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

impl PageParser for SelectorParser {
    fn extract_title(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        for selector in &self.title_selectors {
            if let Some(element) = document.select(selector).next() {
                let title = element_text(&element);
                if title.chars().count() > self.config.min_title_chars {
                    return Some(title);
                }
            }
        }
        None
    }

    #[instrument(skip(self, html), fields(base_url = %base_url))]
    fn extract_member_links(&self, html: &str, base_url: &str) -> Vec<DiscoveredMember> {
        let document = Html::parse_document(html);
        for (group, selector) in self.member_link_selectors.iter().enumerate() {
            let mut members: Vec<DiscoveredMember> = document
                .select(selector)
                .filter_map(|element| {
                    let href = element.value().attr("href")?;
                    let address = absolutize(base_url, href)?;
                    let text = element_text(&element);
                    let id = self.member_id_from(&text, &address);
                    Some(DiscoveredMember::new(id, text, address))
                })
                .collect();
            if members.is_empty() {
                trace!(group, "member selector group matched nothing");
                continue;
            }
            if self.config.members_listed_descending {
                members.reverse();
            }
            debug!(group, count = members.len(), "extracted member links");
            return members;
        }
        Vec::new()
    }

    #[instrument(skip(self, html), fields(base_url = %base_url))]
    fn extract_item_sources(&self, html: &str, base_url: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        for (index, selector) in self.item_selectors.iter().enumerate() {
            let mut seen = HashSet::new();
            let sources: Vec<String> = document
                .select(selector)
                .filter_map(|element| self.image_source(&element))
                .filter_map(|src| absolutize(base_url, &src))
                .filter(|address| self.is_content_image(address))
                .filter(|address| seen.insert(address.clone()))
                .collect();
            if !sources.is_empty() {
                debug!(selector = index, count = sources.len(), "extracted item sources");
                return sources;
            }
        }
        Vec::new()
    }

    fn extract_collection_links(&self, html: &str, base_url: &str) -> Vec<CollectionLink> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for element in document.select(&self.anchor_selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let included = self
                .config
                .collection_include_patterns
                .iter()
                .any(|pattern| href.contains(pattern.as_str()));
            let excluded = self
                .config
                .collection_exclude_patterns
                .iter()
                .any(|pattern| href.contains(pattern.as_str()));
            if !included || excluded {
                continue;
            }
            let Some(url) = absolutize(base_url, href) else {
                continue;
            };

            let raw_title = element
                .value()
                .attr("title")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map_or_else(|| element_text(&element), str::to_string);
            let mut title = raw_title.as_str();
            for prefix in &self.config.collection_title_prefixes {
                if let Some(stripped) = title.strip_prefix(prefix.as_str()) {
                    title = stripped;
                }
            }
            let title = title.trim();
            if title.chars().count() <= self.config.min_collection_title_chars {
                continue;
            }
            if seen.insert(url.clone()) {
                links.push(CollectionLink {
                    url,
                    title: title.to_string(),
                });
            }
        }
        debug!(count = links.len(), "extracted collection links");
        links
    }

    #[instrument(skip(self, html), fields(base_url = %base_url))]
    fn extract_page_images(&self, html: &str, base_url: &str) -> PageImages {
        let document = Html::parse_document(html);
        let mut candidates: Vec<String> = Vec::new();

        for element in document.select(&self.image_selector) {
            let attributes = element.value();
            if let Some(src) = self.config.page_image_attributes.iter().find_map(|attribute| {
                attributes
                    .attr(attribute)
                    .map(str::trim)
                    .filter(|value| !value.is_empty() && !value.starts_with("data:"))
            }) {
                candidates.push(src.to_string());
            }
            if let Some(srcset) = attributes.attr("srcset") {
                candidates.extend(
                    srcset
                        .split(',')
                        .filter_map(|candidate| candidate.split_whitespace().next())
                        .map(str::to_string),
                );
            }
        }
        for element in document.select(&self.styled_selector) {
            if let Some(style) = element.value().attr("style") {
                candidates.extend(self.background_sources(style).map(str::to_string));
            }
        }
        for element in document.select(&self.style_selector) {
            let css: String = element.text().collect();
            candidates.extend(self.background_sources(&css).map(str::to_string));
        }

        let mut seen = HashSet::new();
        let sources: Vec<String> = candidates
            .iter()
            .filter_map(|candidate| absolutize(base_url, candidate))
            .filter(|address| seen.insert(address.clone()))
            .collect();

        let mut seen = HashSet::new();
        let inline: Vec<InlineImage> = self
            .inline_image
            .captures_iter(html)
            .filter_map(|caps| Some((caps.get(1)?.as_str(), caps.get(2)?.as_str())))
            .filter(|(_, data)| seen.insert(*data))
            .map(|(format, data)| InlineImage {
                format: format.to_ascii_lowercase(),
                data: data.to_string(),
            })
            .collect();

        debug!(sources = sources.len(), inline = inline.len(), "extracted page images");
        PageImages { sources, inline }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parser() -> SelectorParser {
        SelectorParser::with_defaults().unwrap()
    }

    const BASE: &str = "https://site.test/truyen-tranh/solo-leveling";

    #[test]
    fn test_extract_title_prefers_specific_selector() {
        let html = r#"<html><head><title>Site name</title></head>
            <body><h1>Generic header</h1><h1 class="title-detail"> Solo   Leveling </h1></body></html>"#;
        assert_eq!(parser().extract_title(html), Some("Solo Leveling".to_string()));
    }

    #[test]
    fn test_extract_title_skips_short_candidates() {
        let html = r"<html><head><title>Fallback Title</title></head><body><h1>Abc</h1></body></html>";
        assert_eq!(parser().extract_title(html), Some("Fallback Title".to_string()));
    }

    #[test]
    fn test_extract_title_none_when_nothing_plausible() {
        assert_eq!(parser().extract_title("<html><body><p>x</p></body></html>"), None);
    }

    #[test]
    fn test_extract_member_links_reverses_descending_listing() {
        let html = r#"<div class="list-chapter"><div class="row"><div class="chapter">
            <a href="/truyen-tranh/solo-leveling/chuong-3">Chapter 3</a></div></div>
            <div class="row"><div class="chapter"><a href="/truyen-tranh/solo-leveling/chuong-2">Chapter 2</a></div></div>
            <div class="row"><div class="chapter"><a href="/truyen-tranh/solo-leveling/chuong-1">Chapter 1</a></div></div></div>"#;
        let members = parser().extract_member_links(html, BASE);
        let ids: Vec<Option<&str>> = members.iter().map(|m| m.id.as_deref()).collect();
        assert_eq!(ids, vec![Some("1"), Some("2"), Some("3")]);
        assert_eq!(members[0].address, "https://site.test/truyen-tranh/solo-leveling/chuong-1");
    }

    #[test]
    fn test_extract_member_links_falls_through_to_generic_group() {
        let html = r#"<ul class="chapter-list">
            <li><a href="/c/chuong-12-5">Extra chapter</a></li>
            <li><a href="/c/x">Chương 7.5 - Side</a></li></ul>"#;
        let members = parser().extract_member_links(html, BASE);
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].id.as_deref(), Some("7.5"));
        assert_eq!(members[1].id.as_deref(), Some("12.5"));
    }

    #[test]
    fn test_member_id_from_href_separators() {
        let parser = parser();
        assert_eq!(parser.member_id_from("", "https://s.test/c/chuong-12-5"), Some("12.5".to_string()));
        assert_eq!(parser.member_id_from("", "https://s.test/c/chap_3_1/"), Some("3.1".to_string()));
        assert_eq!(parser.member_id_from("", "https://s.test/c/chuong-12.5?x=1"), Some("12.5".to_string()));
        assert_eq!(parser.member_id_from("", "https://s.test/c/chuong-12-the-end"), Some("12".to_string()));
        assert_eq!(parser.member_id_from("", "https://s.test/c/chuong-4"), Some("4".to_string()));
        assert_eq!(parser.member_id_from("Chapter 9", "https://s.test/c/chuong-12-5"), Some("9".to_string()));
    }

    #[test]
    fn test_extract_page_images_collects_every_kind() {
        let html = r#"<html><head><style>.hero { background-image: url('/bg/hero.webp'); }</style></head><body>
            <img src="/a.jpg" srcset="/a-small.jpg 480w, https://cdn.test/a-large.jpg 1080w">
            <img data-src="//cdn.test/lazy.png">
            <img src="/a.jpg">
            <img src="https://cdn.test/site-logo.png">
            <div style="background-image: url(&quot;/bg/tile.gif&quot;)"></div>
            <img src="data:image/png;base64,iVBORw0KGgo=">
            <img src="data:image/png;base64,iVBORw0KGgo="></body></html>"#;
        let images = parser().extract_page_images(html, "https://site.test/gallery/");
        assert_eq!(
            images.sources,
            vec![
                "https://site.test/a.jpg".to_string(),
                "https://site.test/a-small.jpg".to_string(),
                "https://cdn.test/a-large.jpg".to_string(),
                "https://cdn.test/lazy.png".to_string(),
                "https://cdn.test/site-logo.png".to_string(),
                "https://site.test/bg/tile.gif".to_string(),
                "https://site.test/bg/hero.webp".to_string(),
            ]
        );
        assert_eq!(
            images.inline,
            vec![InlineImage {
                format: "png".to_string(),
                data: "iVBORw0KGgo=".to_string(),
            }]
        );
    }

    #[test]
    fn test_extract_member_links_without_id() {
        let html = r#"<div class="chapters"><a href="/c/prologue">Prologue</a></div>"#;
        let members = parser().extract_member_links(html, BASE);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, None);
        assert_eq!(members[0].title, "Prologue");
    }

    #[test]
    fn test_extract_item_sources_filters_and_dedupes() {
        let html = r#"<div class="reading-detail"><div class="page-chapter">
            <img data-src="//cdn.test/p/001.jpg" src="/lazy.gif">
            <img src="https://cdn.test/p/002.png?v=1">
            <img src="https://cdn.test/p/001.jpg">
            <img src="https://cdn.test/ads/banner.jpg">
            <img src="data:image/png;base64,AAAA">
            <img src="https://cdn.test/p/readme.txt">
            </div></div><img src="https://cdn.test/other.jpg">"#;
        let sources = parser().extract_item_sources(html, BASE);
        assert_eq!(
            sources,
            vec![
                "https://cdn.test/p/001.jpg".to_string(),
                "https://cdn.test/p/002.png?v=1".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_item_sources_attribute_priority() {
        let html = r#"<div class="chapter-content">
            <img data-original="https://cdn.test/a.webp" src="https://cdn.test/placeholder.jpg"></div>"#;
        assert_eq!(
            parser().extract_item_sources(html, BASE),
            vec!["https://cdn.test/a.webp".to_string()]
        );
    }

    #[test]
    fn test_extract_item_sources_generic_fallback() {
        let html = r#"<p><img src="/img/1.jpg"><img src="/img/logo.png"></p>"#;
        assert_eq!(
            parser().extract_item_sources(html, "https://site.test/c/1"),
            vec!["https://site.test/img/1.jpg".to_string()]
        );
    }

    #[test]
    fn test_extract_item_sources_empty_page() {
        assert!(parser().extract_item_sources("<html></html>", BASE).is_empty());
    }

    #[test]
    fn test_extract_collection_links() {
        let html = r#"
            <a href="/truyen-tranh/one-piece" title="Truyện tranh One Piece">x</a>
            <a href="/truyen-tranh/one-piece">One Piece again</a>
            <a href="/truyen-tranh/one-piece/chuong-1">Chapter 1</a>
            <a href="/truyen-tranh/ab">AB</a>
            <a href="https://site.test/truyen-tranh/naruto">Manga Naruto</a>
            <a href="/the-loai/action">Action</a>"#;
        let links = parser().extract_collection_links(html, "https://site.test/");
        assert_eq!(
            links,
            vec![
                CollectionLink {
                    url: "https://site.test/truyen-tranh/one-piece".to_string(),
                    title: "One Piece".to_string(),
                },
                CollectionLink {
                    url: "https://site.test/truyen-tranh/naruto".to_string(),
                    title: "Naruto".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let config = ParserConfig {
            item_selectors: vec!["img[".to_string()],
            ..ParserConfig::default()
        };
        let err = SelectorParser::new(config).unwrap_err();
        assert!(matches!(err, ParserError::InvalidSelector { .. }));
    }
}
