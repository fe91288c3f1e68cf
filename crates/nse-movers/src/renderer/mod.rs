//! Browser session abstraction.
//!
//! Defines the `SessionLauncher` and `BrowserSession` traits that abstract
//! over the browser engine (currently Chromium via chromiumoxide), so the
//! acquisition controller can be driven against a scripted session in tests.

pub mod chromium;

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{DriverError, DriverResult};

/// Result of navigating to a URL.
#[derive(Debug, Clone)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// How to find an element on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementLocator {
    /// Match by DOM `id` attribute.
    Id(String),
    /// Match by CSS selector.
    Css(String),
}

impl ElementLocator {
    /// CSS selector equivalent. Ids are matched by attribute so they need no escaping.
    pub fn to_css(&self) -> String {
        match self {
            ElementLocator::Id(id) => format!("[id={}]", quote_js(id)),
            ElementLocator::Css(sel) => sel.clone(),
        }
    }

    /// JS expression evaluating to the element or `null`.
    pub fn to_js_lookup(&self) -> String {
        match self {
            ElementLocator::Id(id) => format!("document.getElementById({})", quote_js(id)),
            ElementLocator::Css(sel) => format!("document.querySelector({})", quote_js(sel)),
        }
    }
}

impl fmt::Display for ElementLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementLocator::Id(id) => write!(f, "#{id}"),
            ElementLocator::Css(sel) => f.write_str(sel),
        }
    }
}

/// Handle to an element that was found clickable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub locator: ElementLocator,
}

/// A browser engine that can start sessions.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Spawn one browser configured to save downloads silently into
    /// `download_dir`, present `user_agent`, and suppress automation signalling.
    async fn start(
        &self,
        download_dir: &Path,
        user_agent: &str,
    ) -> DriverResult<Box<dyn BrowserSession>>;
}

/// A single running browser with one page.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> DriverResult<NavigationResult>;

    /// Whether the document has finished loading.
    async fn page_ready(&self) -> bool;

    /// Send an Escape key press to close any modal overlay. Best-effort.
    async fn dismiss_overlay(&mut self);

    /// One check: the element if it exists and is interactable right now.
    async fn check_clickable(&self, locator: &ElementLocator) -> DriverResult<Option<ElementRef>>;

    /// Click a previously located element.
    async fn click(&mut self, element: &ElementRef) -> DriverResult<()>;

    /// Terminate the browser process.
    async fn quit(self: Box<Self>) -> DriverResult<()>;

    /// Poll until the element is clickable or `timeout` elapses.
    async fn wait_for_clickable(
        &self,
        locator: &ElementLocator,
        timeout: Duration,
        interval: Duration,
    ) -> DriverResult<ElementRef> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.check_clickable(locator).await {
                Ok(Some(element)) => return Ok(element),
                Ok(None) => {}
                Err(e) => tracing::debug!("Clickable check for {locator} failed: {e}"),
            }
            if Instant::now() >= deadline {
                return Err(DriverError::ElementTimeout {
                    locator: locator.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(interval).await;
        }
    }
}

/// Quote a string as a JS/CSS string literal.
fn quote_js(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}
