//! Scripted browser sessions for JavaScript-rendered pages.
//!
//! [`BrowserLauncher`] and [`BrowserSession`] are the seams the page fetcher
//! and rating extractor depend on; [`ChromiumLauncher`] is the production
//! implementation over the Chrome DevTools Protocol.

use crate::config::Config;
use crate::error::ScrapeError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::Page;
use futures::StreamExt;
use std::ops::Deref;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Resource count must stay unchanged this long to count as network-idle.
const IDLE_WINDOW: Duration = Duration::from_millis(500);

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launches a fresh session with a blank page.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScrapeError>;
}

/// One browser with one page.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigates to `url`, failing if the page cannot be loaded within `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), ScrapeError>;

    /// Waits until an element matching `selector` exists. Returns false on timeout.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> bool;

    /// Waits until the page stops loading resources. Returns false on timeout.
    async fn wait_for_network_idle(&self, timeout: Duration) -> bool;

    /// Current DOM serialized as HTML.
    async fn content(&self) -> Result<String, ScrapeError>;

    /// Releases the browser. Safe to call more than once.
    async fn close(&mut self) -> Result<(), ScrapeError>;
}

/// Owns a session and guarantees it is released.
///
/// [`SessionGuard::close`] is the normal path. If the guard is dropped
/// without it (panic, cancelled future) the release is spawned onto the
/// runtime captured at construction.
pub struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
    url: String,
    runtime: Option<tokio::runtime::Handle>,
}

impl SessionGuard {
    /// Wraps a launched session.
    pub fn new(session: Box<dyn BrowserSession>, url: impl Into<String>) -> Self {
        Self {
            session: Some(session),
            url: url.into(),
            runtime: tokio::runtime::Handle::try_current().ok(),
        }
    }

    /// Releases the session, logging (not returning) close failures.
    pub async fn close(mut self) {
        if let Some(mut session) = self.session.take() {
            match session.close().await {
                Ok(()) => debug!("Browser session closed for {}", self.url),
                Err(e) => warn!("Failed to close browser session for {}: {}", self.url, e),
            }
        }
    }
}

impl Deref for SessionGuard {
    type Target = dyn BrowserSession;

    fn deref(&self) -> &Self::Target {
        // Only `close(self)` and `drop` take the session out.
        self.session.as_deref().expect("session is present until the guard is consumed")
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        let url = std::mem::take(&mut self.url);

        match &self.runtime {
            Some(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!("Deferred browser close failed for {}: {}", url, e);
                    } else {
                        trace!("Deferred browser close succeeded for {}", url);
                    }
                });
            }
            None => warn!("No runtime to release browser session for {}", url),
        }
    }
}

/// Launches local Chromium instances through chromiumoxide.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    headless: bool,
    accept_language: String,
}

impl ChromiumLauncher {
    /// Creates a launcher from configuration.
    pub fn new(config: &Config) -> Self {
        Self { headless: config.headless, accept_language: config.accept_language.clone() }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScrapeError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled");
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(ScrapeError::Browser)?;

        debug!("Launching Chromium (headless: {})", self.headless);
        let (mut browser, mut handler) = CdpBrowser::launch(config)
            .await
            .map_err(|e| ScrapeError::Browser(format!("failed to launch browser: {e}")))?;

        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler.abort();
                return Err(ScrapeError::Browser(format!("failed to open page: {e}")));
            }
        };

        let headers = Headers::new(serde_json::json!({ "Accept-Language": self.accept_language }));
        if let Err(e) = page.execute(SetExtraHttpHeadersParams::new(headers)).await {
            debug!("Could not set Accept-Language: {}", e);
        }

        Ok(Box::new(ChromiumSession { browser: Mutex::new(Some(browser)), page, handler }))
    }
}

struct ChromiumSession {
    browser: Mutex<Option<CdpBrowser>>,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumSession {
    /// Returns the resource-timing entry count once the document is complete.
    async fn loaded_resources(&self) -> Option<i64> {
        let script = "document.readyState === 'complete' \
                      ? performance.getEntriesByType('resource').length : -1";
        let count = self.page.evaluate(script).await.ok()?.into_value::<i64>().ok()?;
        (count >= 0).then_some(count)
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), ScrapeError> {
        debug!("Navigating to {}", url);
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => {
                Err(ScrapeError::Navigation { url: url.to_string(), reason: e.to_string() })
            }
            Err(_) => Err(ScrapeError::Navigation {
                url: url.to_string(),
                reason: format!("timed out after {:?}", timeout),
            }),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> bool {
        let poll = async {
            loop {
                if self.page.find_element(selector).await.is_ok() {
                    return;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        let found = tokio::time::timeout(timeout, poll).await.is_ok();
        trace!("Selector {} {}", selector, if found { "found" } else { "timed out" });
        found
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> bool {
        let poll = async {
            let mut last: Option<(i64, Instant)> = None;
            loop {
                if let Some(count) = self.loaded_resources().await {
                    match last {
                        Some((prev, since)) if prev == count => {
                            if since.elapsed() >= IDLE_WINDOW {
                                return;
                            }
                        }
                        _ => last = Some((count, Instant::now())),
                    }
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, poll).await.is_ok()
    }

    async fn content(&self) -> Result<String, ScrapeError> {
        self.page
            .content()
            .await
            .map_err(|e| ScrapeError::Browser(format!("failed to read page content: {e}")))
    }

    async fn close(&mut self) -> Result<(), ScrapeError> {
        let browser = self.browser.lock().await.take();
        let result = match browser {
            Some(mut browser) => {
                let closed = browser.close().await.map(|_| ());
                let _ = browser.wait().await;
                closed.map_err(|e| ScrapeError::Browser(format!("failed to close browser: {e}")))
            }
            None => Ok(()),
        };
        self.handler.abort();
        result
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{MockLauncher, MockPage};
    use super::*;

    #[tokio::test]
    async fn test_guard_close_releases_once() {
        let launcher = MockLauncher::new(vec![MockPage::rendered("<h1>x</h1>")]);
        let guard = SessionGuard::new(launcher.launch().await.unwrap(), "http://x");

        assert_eq!(guard.content().await.unwrap(), "<h1>x</h1>");
        guard.close().await;

        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn test_guard_drop_releases() {
        let launcher = MockLauncher::new(vec![MockPage::rendered("")]);
        {
            let _guard = SessionGuard::new(launcher.launch().await.unwrap(), "http://x");
        }

        // the release runs on a spawned task
        for _ in 0..50 {
            if launcher.closes() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn test_guard_derefs_to_session() {
        let launcher = MockLauncher::new(vec![MockPage::unreachable()]);
        let guard = SessionGuard::new(launcher.launch().await.unwrap(), "http://x");

        let err = guard.goto("http://x", Duration::from_secs(1)).await.unwrap_err();
        assert!(err.is_fatal());
        guard.close().await;
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn test_mock_launcher_sequence() {
        let launcher = MockLauncher::new(vec![MockPage::bare("a"), MockPage::bare("b")]);
        let first = launcher.launch().await.unwrap();
        let second = launcher.launch().await.unwrap();
        let third = launcher.launch().await.unwrap();

        assert_eq!(first.content().await.unwrap(), "a");
        assert_eq!(second.content().await.unwrap(), "b");
        assert_eq!(third.content().await.unwrap(), "b");
    }
}
