//! Shared User-Agent strings for HTTP traffic.
//!
//! Page and listing requests identify the tool; item requests replace this
//! with the browser-like header profiles in [`crate::fetch::HeaderProfile`].

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/nicksrandall/series-downloader";

/// Default User-Agent for page and listing requests.
#[must_use]
pub(crate) fn default_page_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("series-downloader/{version} (+{PROJECT_UA_URL})")
}
