//! Headless Chromium via `chromiumoxide`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use super::{BrowserError, ScriptableBrowser, SettlePlan};

/// Environment variable naming an explicit Chromium executable.
pub const CHROME_PATH_ENV: &str = "CHROME_PATH";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DOCUMENT_HEIGHT: &str = "document.body ? document.body.scrollHeight : 0";
const SCROLL_TO_BOTTOM: &str =
    "(() => { window.scrollTo(0, document.body ? document.body.scrollHeight : 0); return true; })()";
const OUTER_HTML: &str = "document.documentElement.outerHTML";

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Launches a fresh headless Chromium per call.
///
/// Each call gets a throwaway profile directory that is removed however the
/// call ends, launch failures included.
#[derive(Debug, Clone, Default)]
pub struct ChromiumBrowser {
    executable: Option<PathBuf>,
    profile_root: Option<PathBuf>,
}

impl ChromiumBrowser {
    /// Uses `CHROME_PATH` when set, otherwise chromiumoxide's executable detection.
    #[must_use]
    pub fn new() -> Self {
        let executable = std::env::var(CHROME_PATH_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        Self {
            executable,
            profile_root: None,
        }
    }

    /// Uses an explicit executable.
    #[must_use]
    pub fn with_executable(path: impl Into<PathBuf>) -> Self {
        Self {
            executable: Some(path.into()),
            profile_root: None,
        }
    }

    /// Creates profile directories under `root` instead of the system temp dir.
    #[must_use]
    pub fn with_profile_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.profile_root = Some(root.into());
        self
    }

    fn profile_dir(&self) -> Result<TempDir, BrowserError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("series-downloader-browser-");
        let dir = match &self.profile_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        dir.map_err(|e| BrowserError::launch(format!("cannot create browser profile: {e}")))
    }

    fn config(&self, profile_dir: &Path) -> Result<BrowserConfig, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile_dir)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--window-size=1920,1080")
            .arg(format!("--user-agent={BROWSER_USER_AGENT}"));
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(BrowserError::launch)
    }
}

#[async_trait]
impl ScriptableBrowser for ChromiumBrowser {
    #[instrument(skip(self, plan), fields(url = %url))]
    async fn load_and_settle(&self, url: &str, plan: &SettlePlan) -> Result<String, BrowserError> {
        let session = SESSION_COUNTER.fetch_add(1, Ordering::SeqCst);
        let profile_dir = self.profile_dir()?;
        let config = self.config(profile_dir.path())?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::launch(e.to_string()))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        debug!(session, "browser launched");

        let outcome = match tokio::time::timeout(plan.timeout, drive(&browser, url, plan)).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::timeout(url, plan.timeout)),
        };

        if let Err(error) = browser.close().await {
            debug!(error = %error, "browser close reported an error");
        }
        if let Err(error) = browser.wait().await {
            debug!(error = %error, "browser process wait failed");
        }
        handler_task.abort();
        let profile_path = profile_dir.path().to_path_buf();
        if let Err(error) = profile_dir.close() {
            debug!(error = %error, path = %profile_path.display(), "could not remove browser profile");
        }
        debug!(session, ok = outcome.is_ok(), "browser torn down");

        outcome
    }
}

async fn drive(browser: &Browser, url: &str, plan: &SettlePlan) -> Result<String, BrowserError> {
    let page = browser
        .new_page(url)
        .await
        .map_err(|e| BrowserError::navigation(url, e.to_string()))?;
    if let Err(error) = page.wait_for_navigation().await {
        warn!(error = %error, "navigation did not settle cleanly");
    }
    tokio::time::sleep(plan.initial_wait).await;

    if plan.max_interactions > 0 {
        let click = click_script(plan)?;
        let ended = end_marker_script(plan)?;
        let mut clicks = 0;
        while clicks < plan.max_interactions {
            let clicked: bool = evaluate(&page, url, &click).await?;
            if !clicked {
                debug!(clicks, "no load-more control left");
                break;
            }
            clicks += 1;
            tokio::time::sleep(plan.interaction_delay).await;
            let finished: bool = evaluate(&page, url, &ended).await?;
            if finished {
                debug!(clicks, "end-of-list marker found");
                break;
            }
        }
        info!(clicks, "load-more interactions done");
    }

    if plan.scroll_until_stable {
        let mut last_height: f64 = evaluate(&page, url, DOCUMENT_HEIGHT).await?;
        for round in 0..plan.max_scrolls {
            let _: bool = evaluate(&page, url, SCROLL_TO_BOTTOM).await?;
            tokio::time::sleep(plan.scroll_delay).await;
            let height: f64 = evaluate(&page, url, DOCUMENT_HEIGHT).await?;
            if (height - last_height).abs() < f64::EPSILON {
                debug!(round, "document height stable");
                break;
            }
            last_height = height;
        }
    }

    let html: String = evaluate(&page, url, OUTER_HTML).await?;
    if let Err(error) = page.close().await {
        debug!(error = %error, "page close reported an error");
    }
    Ok(html)
}

async fn evaluate<T: DeserializeOwned>(page: &Page, url: &str, script: &str) -> Result<T, BrowserError> {
    page.evaluate(script)
        .await
        .map_err(|e| BrowserError::script(url, e.to_string()))?
        .into_value::<T>()
        .map_err(|e| BrowserError::script(url, e.to_string()))
}

fn click_script(plan: &SettlePlan) -> Result<String, BrowserError> {
    let selectors = serde_json::to_string(&plan.load_more_selectors)
        .map_err(|e| BrowserError::script("", e.to_string()))?;
    let texts = serde_json::to_string(&plan.load_more_texts)
        .map_err(|e| BrowserError::script("", e.to_string()))?;
    Ok(format!(
        r"(() => {{
  const selectors = {selectors};
  const texts = {texts};
  const usable = (el) => !el.disabled && !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
  for (const selector of selectors) {{
    for (const el of document.querySelectorAll(selector)) {{
      if (usable(el)) {{ el.click(); return true; }}
    }}
  }}
  for (const el of document.querySelectorAll('button, a')) {{
    const label = (el.textContent || '').trim().toLowerCase();
    if (texts.some((t) => label.includes(t)) && usable(el)) {{ el.click(); return true; }}
  }}
  return false;
}})()"
    ))
}

fn end_marker_script(plan: &SettlePlan) -> Result<String, BrowserError> {
    let markers = serde_json::to_string(&plan.end_markers)
        .map_err(|e| BrowserError::script("", e.to_string()))?;
    Ok(format!(
        r"(() => {{
  const markers = {markers};
  const text = document.body ? document.body.innerText : '';
  return markers.some((m) => text.includes(m));
}})()"
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_click_script_embeds_selectors_and_texts() {
        let script = click_script(&SettlePlan::member_listing()).unwrap();
        assert!(script.contains("\".load-more\""));
        assert!(script.contains("xem thêm"));
        assert!(script.starts_with("(() => {"));
    }

    #[test]
    fn test_end_marker_script_embeds_markers() {
        let script = end_marker_script(&SettlePlan::member_listing()).unwrap();
        assert!(script.contains("No more chapters"));
    }

    #[test]
    fn test_with_executable_overrides_detection() {
        let browser = ChromiumBrowser::with_executable("/opt/chrome/chrome");
        assert_eq!(browser.executable, Some(PathBuf::from("/opt/chrome/chrome")));
    }

    #[tokio::test]
    async fn test_failed_launch_leaves_no_profile_behind() {
        let root = tempfile::tempdir().unwrap();
        let browser = ChromiumBrowser::with_executable(root.path().join("no-such-chrome"))
            .with_profile_root(root.path());
        let plan = SettlePlan {
            timeout: std::time::Duration::from_secs(5),
            ..SettlePlan::item_page()
        };

        let err = browser.load_and_settle("https://site.test/", &plan).await.unwrap_err();
        assert!(matches!(err, BrowserError::Launch { .. }), "unexpected error: {err}");

        let leftovers: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "profile dirs left behind: {leftovers:?}");
    }
}
