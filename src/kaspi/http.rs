//! Plain HTTP access for pages that do not need script execution.

use crate::config::Config;
use crate::error::ScrapeError;
use crate::kaspi::retry::Outcome;
use std::time::Duration;
use tracing::debug;
use wreq::Client;
use wreq_util::Emulation;

/// Builds a wreq client with the shared transport settings.
///
/// `cookies` keeps a per-client cookie jar; each client owns its own jar, so
/// cookies never leak between clients.
pub(crate) fn build_client(
    config: &Config,
    timeout: Duration,
    cookies: bool,
) -> Result<Client, ScrapeError> {
    let mut builder = Client::builder()
        .cookie_store(cookies)
        .gzip(true)
        .brotli(true)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10));

    if let Some(proxy_url) = &config.proxy {
        debug!("Configuring proxy: {}", proxy_url);
        let proxy = wreq::Proxy::all(proxy_url)
            .map_err(|e| ScrapeError::Http(format!("invalid proxy {proxy_url}: {e}")))?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

/// Status and body of a static GET.
#[derive(Debug, Clone)]
pub struct StaticResponse {
    pub status: u16,
    pub body: String,
}

impl StaticResponse {
    /// Returns true for HTTP 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Retry class for a non-200 response, `None` when the response is usable.
    pub fn outcome(&self) -> Option<Outcome> {
        (!self.is_ok()).then(|| Outcome::from_status(self.status))
    }
}

/// GETs page markup with a realistic browser header set.
pub struct StaticMarkupClient {
    client: Client,
    user_agent: String,
    accept_language: String,
}

impl StaticMarkupClient {
    /// Creates a client with the configured request timeout.
    pub fn new(config: &Config) -> Result<Self, ScrapeError> {
        let client = build_client(config, Duration::from_secs(config.timeout_secs), false)?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            accept_language: config.accept_language.clone(),
        })
    }

    /// Performs one GET. Non-200 statuses are returned, not raised; only
    /// transport failures become errors.
    pub async fn get(&self, url: &str) -> Result<StaticResponse, ScrapeError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", &self.accept_language)
            .header("Accept-Encoding", "gzip, deflate, br")
            .header("Connection", "keep-alive")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await?;

        let status = response.status().as_u16();
        debug!("Response status: {}", status);

        let body = response.text().await?;
        Ok(StaticResponse { status, body })
    }
}
