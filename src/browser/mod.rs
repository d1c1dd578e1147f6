//! Scriptable headless browser for pages that only reveal content after
//! interaction ("load more" controls, lazy-loaded images).
//!
//! Every call owns its browser process: it is launched for the call and torn
//! down before the call returns, whether it succeeded or not.

mod chromium;
mod error;

pub use chromium::ChromiumBrowser;
pub use error::BrowserError;

use std::time::Duration;

use async_trait::async_trait;

/// Default bound on "load more" clicks per page.
pub const DEFAULT_MAX_INTERACTIONS: usize = 10;

/// How to settle a page before reading its HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlePlan {
    /// Wait after the initial navigation.
    pub initial_wait: Duration,
    /// CSS selectors of "load more" controls.
    pub load_more_selectors: Vec<String>,
    /// Lowercase text fragments identifying "load more" buttons or links.
    pub load_more_texts: Vec<String>,
    /// Text fragments meaning the list is complete.
    pub end_markers: Vec<String>,
    /// Maximum "load more" clicks.
    pub max_interactions: usize,
    /// Wait after each click.
    pub interaction_delay: Duration,
    /// Scroll to the bottom until the document height stops changing.
    pub scroll_until_stable: bool,
    /// Maximum scroll rounds.
    pub max_scrolls: usize,
    /// Wait after each scroll.
    pub scroll_delay: Duration,
    /// Overall budget for one call.
    pub timeout: Duration,
}

impl SettlePlan {
    /// Plan for member listings: click "load more" until it disappears.
    #[must_use]
    pub fn member_listing() -> Self {
        Self {
            initial_wait: Duration::from_secs(3),
            load_more_selectors: [
                ".load-more",
                ".show-more",
                "#load-more",
                "#show-more",
                "button[class*='load-more']",
                "a[class*='show-more']",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            load_more_texts: vec![
                "xem thêm".to_string(),
                "load more".to_string(),
                "show more".to_string(),
            ],
            end_markers: vec![
                "Không còn chapter nào".to_string(),
                "No more chapters".to_string(),
                "End of chapters".to_string(),
            ],
            max_interactions: DEFAULT_MAX_INTERACTIONS,
            interaction_delay: Duration::from_secs(2),
            scroll_until_stable: false,
            max_scrolls: 0,
            scroll_delay: Duration::ZERO,
            timeout: Duration::from_secs(120),
        }
    }

    /// Plan for item pages: scroll until lazy images stop loading.
    #[must_use]
    pub fn item_page() -> Self {
        Self {
            initial_wait: Duration::from_secs(2),
            load_more_selectors: Vec::new(),
            load_more_texts: Vec::new(),
            end_markers: Vec::new(),
            max_interactions: 0,
            interaction_delay: Duration::ZERO,
            scroll_until_stable: true,
            max_scrolls: 20,
            scroll_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Loads a page in a real browser and returns the settled HTML.
#[async_trait]
pub trait ScriptableBrowser: Send + Sync {
    /// Navigates to `url`, follows the plan, and returns the final document HTML.
    async fn load_and_settle(&self, url: &str, plan: &SettlePlan) -> Result<String, BrowserError>;
}

/// Browser stand-in used when interactive discovery is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBrowser;

#[async_trait]
impl ScriptableBrowser for NoopBrowser {
    async fn load_and_settle(&self, url: &str, _plan: &SettlePlan) -> Result<String, BrowserError> {
        Err(BrowserError::unavailable(url, "interactive browsing is disabled"))
    }
}
