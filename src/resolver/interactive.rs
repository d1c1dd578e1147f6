//! Member discovery in a scriptable browser, for listings that only reveal
//! every member after repeated "load more" clicks.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{DiscoveryContext, DiscoveryError, DiscoveryStep, DiscoveryStrategy};
use crate::browser::{ScriptableBrowser, SettlePlan};
use crate::parser::PageParser;

const NAME: &str = "interactive-page";

/// Settles the collection page in a browser, then parses member links.
pub struct InteractivePageStrategy {
    browser: Arc<dyn ScriptableBrowser>,
    parser: Arc<dyn PageParser>,
    plan: SettlePlan,
}

impl InteractivePageStrategy {
    /// Creates the strategy with at most `max_interactions` "load more" clicks.
    #[must_use]
    pub fn new(browser: Arc<dyn ScriptableBrowser>, parser: Arc<dyn PageParser>, max_interactions: usize) -> Self {
        let mut plan = SettlePlan::member_listing();
        plan.max_interactions = max_interactions;
        Self { browser, parser, plan }
    }

    /// The settle plan used for each call.
    #[must_use]
    pub fn plan(&self) -> &SettlePlan {
        &self.plan
    }
}

impl std::fmt::Debug for InteractivePageStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractivePageStrategy")
            .field("max_interactions", &self.plan.max_interactions)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DiscoveryStrategy for InteractivePageStrategy {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip(self, _ctx), fields(strategy = NAME))]
    async fn discover(&self, url: &str, _ctx: &DiscoveryContext) -> Result<DiscoveryStep, DiscoveryError> {
        let html = self
            .browser
            .load_and_settle(url, &self.plan)
            .await
            .map_err(|e| DiscoveryError::strategy_failed(NAME, url, e.to_string()))?;
        let members = self.parser.extract_member_links(&html, url);
        debug!(members = members.len(), "member links parsed from settled page");
        if members.is_empty() {
            Ok(DiscoveryStep::Empty)
        } else {
            Ok(DiscoveryStep::Members(members))
        }
    }
}
