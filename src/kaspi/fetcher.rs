//! Renders product pages to their final DOM.

use crate::config::Config;
use crate::error::ScrapeError;
use crate::kaspi::browser::{BrowserLauncher, SessionGuard};
use crate::kaspi::selectors::product;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// HTML captured from a rendered page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    pub fetched_at: DateTime<Utc>,
}

/// Deadlines for a single render.
#[derive(Debug, Clone, Copy)]
pub struct RenderTimeouts {
    pub navigation: Duration,
    pub heading: Duration,
    pub settle: Duration,
    pub network_idle: Duration,
}

impl RenderTimeouts {
    /// Reads the render deadlines from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            navigation: Duration::from_secs(config.navigation_timeout_secs),
            heading: Duration::from_secs(config.heading_timeout_secs),
            settle: Duration::from_secs(config.wait_seconds),
            network_idle: Duration::from_secs(config.network_idle_timeout_secs),
        }
    }
}

/// Opens a browser session per fetch and returns best-effort rendered HTML.
pub struct PageFetcher {
    launcher: Arc<dyn BrowserLauncher>,
    timeouts: RenderTimeouts,
}

impl PageFetcher {
    /// Creates a fetcher using the given launcher.
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: &Config) -> Self {
        Self { launcher, timeouts: RenderTimeouts::from_config(config) }
    }

    /// Renders `url`. Fails only when the browser cannot start or navigation fails;
    /// a missing heading or a busy network still yield the current HTML.
    pub async fn fetch(&self, url: &str) -> Result<RenderedPage, ScrapeError> {
        info!("Rendering page: {}", url);

        let session = SessionGuard::new(self.launcher.launch().await?, url);
        let result = self.render(&session, url).await;
        session.close().await;

        result
    }

    async fn render(&self, session: &SessionGuard, url: &str) -> Result<RenderedPage, ScrapeError> {
        session.goto(url, self.timeouts.navigation).await?;

        if !session.wait_for_selector(product::HEADING_CSS, self.timeouts.heading).await {
            debug!("Heading did not appear, settling for {:?}", self.timeouts.settle);
            tokio::time::sleep(self.timeouts.settle).await;
        }

        if !session.wait_for_network_idle(self.timeouts.network_idle).await {
            debug!("Network did not go idle, using current HTML");
        }

        let html = session.content().await?;
        debug!("Rendered {} bytes from {}", html.len(), url);

        Ok(RenderedPage { html, fetched_at: Utc::now() })
    }
}
