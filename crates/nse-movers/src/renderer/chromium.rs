//! Chromium-backed browser session using chromiumoxide.

use super::{BrowserSession, ElementLocator, ElementRef, NavigationResult, SessionLauncher};
use crate::config::{ScanConfig, ENV_CHROMIUM_PATH};
use crate::error::{DriverError, DriverResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// How long to wait for the process to exit after a graceful close.
const QUIT_WAIT: Duration = Duration::from_secs(5);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. NSE_MOVERS_CHROMIUM_PATH env
    if let Ok(p) = std::env::var(ENV_CHROMIUM_PATH) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launches one Chromium process per session.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    chromium_path: Option<PathBuf>,
    headless: bool,
}

impl ChromiumLauncher {
    pub fn new(chromium_path: Option<PathBuf>, headless: bool) -> Self {
        Self {
            chromium_path,
            headless,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.chromium_path.clone(), config.headless)
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn start(
        &self,
        download_dir: &Path,
        user_agent: &str,
    ) -> DriverResult<Box<dyn BrowserSession>> {
        let chrome_path = self
            .chromium_path
            .clone()
            .filter(|p| p.exists())
            .or_else(find_chromium)
            .ok_or_else(|| {
                DriverError::Init(format!(
                    "Chromium not found. Install Chrome or set {ENV_CHROMIUM_PATH}."
                ))
            })?;
        tracing::debug!("Using browser binary {}", chrome_path.display());

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .args(launch_args(user_agent));
        builder = if self.headless {
            builder.headless_mode(HeadlessMode::New)
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| DriverError::Init(format!("failed to build browser config: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Init(format!("failed to launch Chromium: {e}")))?;

        // Spawn the handler task
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        match open_download_page(&browser, download_dir).await {
            Ok(page) => Ok(Box::new(ChromiumSession {
                browser: Some(browser),
                page,
                handler: Some(handler),
            })),
            Err(e) => {
                // The process is already running; do not leak it.
                if let Err(close_err) = browser.close().await {
                    tracing::warn!("Failed to close browser after init error: {close_err}");
                    let _ = browser.kill().await;
                }
                handler.abort();
                Err(e)
            }
        }
    }
}

/// Extra switches for every launch. Headless mode is set on the builder.
fn launch_args(user_agent: &str) -> Vec<String> {
    vec![
        format!("--user-agent={user_agent}"),
        "--disable-blink-features=AutomationControlled".into(),
        "--disable-gpu".into(),
        "--no-sandbox".into(),
        "--disable-dev-shm-usage".into(),
        "--disable-extensions".into(),
    ]
}

/// Await `fut` for whatever is left of `budget` since `start`.
async fn within_budget<F: Future>(start: Instant, budget: Duration, fut: F) -> Option<F::Output> {
    tokio::time::timeout(budget.saturating_sub(start.elapsed()), fut)
        .await
        .ok()
}

async fn open_download_page(browser: &Browser, download_dir: &Path) -> DriverResult<Page> {
    let behavior = SetDownloadBehaviorParams::builder()
        .behavior(SetDownloadBehaviorBehavior::Allow)
        .download_path(download_dir.to_string_lossy().into_owned())
        .build()
        .map_err(DriverError::Init)?;
    browser
        .execute(behavior)
        .await
        .map_err(|e| DriverError::Init(format!("failed to set download behavior: {e}")))?;

    browser
        .new_page("about:blank")
        .await
        .map_err(|e| DriverError::Init(format!("failed to create new page: {e}")))
}

/// A running Chromium process with a single page.
pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Page,
    handler: Option<JoinHandle<()>>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> DriverResult<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(timeout, self.page.goto(url)).await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                match within_budget(start, timeout, self.page.wait_for_navigation()).await {
                    Some(Ok(_)) => {}
                    Some(Err(e)) => tracing::debug!("Post-load navigation wait failed: {e}"),
                    None => tracing::debug!("Navigation still settling after {timeout:?}"),
                }

                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => Err(DriverError::Navigation(format!("{url}: {e}"))),
            Err(_) => Err(DriverError::Navigation(format!(
                "{url}: timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn page_ready(&self) -> bool {
        match self.page.evaluate("document.readyState").await {
            Ok(result) => result
                .into_value::<String>()
                .map(|state| state == "complete")
                .unwrap_or(false),
            Err(e) => {
                tracing::debug!("readyState check failed: {e}");
                false
            }
        }
    }

    async fn dismiss_overlay(&mut self) {
        let body = match self.page.find_element("body").await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("No body to send Escape to: {e}");
                return;
            }
        };
        if let Err(e) = body.press_key("Escape").await {
            tracing::warn!("Escape key dispatch failed: {e}");
        }
    }

    async fn check_clickable(&self, locator: &ElementLocator) -> DriverResult<Option<ElementRef>> {
        let script = clickable_script(locator);
        let clickable: bool = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Protocol(format!("clickable check failed: {e}")))?
            .into_value()
            .map_err(|e| DriverError::Protocol(format!("failed to convert check result: {e:?}")))?;

        Ok(clickable.then(|| ElementRef {
            locator: locator.clone(),
        }))
    }

    async fn click(&mut self, element: &ElementRef) -> DriverResult<()> {
        let stale = |e: chromiumoxide::error::CdpError| {
            tracing::debug!("Click on {} failed: {e}", element.locator);
            DriverError::StaleElement(element.locator.to_string())
        };
        let node = self
            .page
            .find_element(element.locator.to_css())
            .await
            .map_err(stale)?;
        node.click().await.map_err(stale)?;
        Ok(())
    }

    async fn quit(self: Box<Self>) -> DriverResult<()> {
        let mut this = self;
        let result = match this.browser.take() {
            Some(browser) => shutdown(browser).await,
            None => Ok(()),
        };
        if let Some(handler) = this.handler.take() {
            handler.abort();
        }
        result
    }
}

async fn shutdown(mut browser: Browser) -> DriverResult<()> {
    match browser.close().await {
        Ok(_) => {
            if tokio::time::timeout(QUIT_WAIT, browser.wait()).await.is_ok() {
                return Ok(());
            }
            tracing::warn!("Browser did not exit within {QUIT_WAIT:?}; killing it");
        }
        Err(e) => tracing::warn!("Graceful browser close failed: {e}; killing it"),
    }
    match browser.kill().await {
        Some(Err(e)) => Err(DriverError::Protocol(format!("failed to kill browser: {e}"))),
        _ => Ok(()),
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        // Dropping `browser` kills the child process.
        if self.browser.is_some() {
            tracing::warn!("Browser session dropped without quit");
        }
    }
}

/// JS that is true when the element is attached, visible, enabled, and
/// not covered by another element at its centre.
fn clickable_script(locator: &ElementLocator) -> String {
    format!(
        r#"(() => {{
  const el = {lookup};
  if (!el || !el.isConnected || el.disabled) return false;
  const style = window.getComputedStyle(el);
  if (style.visibility === 'hidden' || style.display === 'none') return false;
  const rect = el.getBoundingClientRect();
  if (rect.width === 0 || rect.height === 0) return false;
  const top = document.elementFromPoint(rect.left + rect.width / 2, rect.top + rect.height / 2);
  return top === null || top === el || el.contains(top);
}})()"#,
        lookup = locator.to_js_lookup()
    )
}
