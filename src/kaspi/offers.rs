//! Paginated seller-offer retrieval from the internal offers endpoint.

use crate::config::Config;
use crate::error::ScrapeError;
use crate::kaspi::http::build_client;
use crate::kaspi::models::Offer;
use crate::kaspi::parser::parse_price;
use crate::kaspi::retry::{Backoff, Outcome, RetryPolicy, Step};
use crate::kaspi::target::ProductTarget;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use wreq::Client;
use wreq_util::Emulation;

const UNKNOWN_MERCHANT: &str = "Unknown";

/// Body POSTed for one page of offers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OfferPageRequest<'a> {
    city_id: &'a str,
    limit: usize,
    page: u32,
    sort: bool,
}

#[derive(Debug, Deserialize)]
struct OfferPageResponse {
    /// Kept as raw values so one odd entry cannot spoil the page.
    #[serde(default)]
    offers: Option<Vec<Value>>,
}

/// Builds an [`Offer`] from one raw entry, whatever its shape.
fn normalize_offer(raw: &Value) -> Offer {
    let seller_name = match raw.get("merchantName") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        Some(Value::Number(id)) => id.to_string(),
        _ => UNKNOWN_MERCHANT.to_string(),
    };

    Offer { seller_name, price: raw.get("price").and_then(price_value) }
}

/// The endpoint sends a bare number, a price string, or an `{ "amount": .. }` object.
fn price_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(amount) => amount.as_f64(),
        Value::String(text) => parse_price(text),
        Value::Object(fields) => fields.get("amount").and_then(price_value),
        _ => None,
    }
}

/// Walks the offers endpoint page by page for one product.
pub struct OfferPaginationClient {
    base_url: String,
    user_agent: String,
    accept_language: String,
    page_size: usize,
    page_delay: Duration,
    request_timeout: Duration,
    policy: RetryPolicy,
    config: Config,
}

impl OfferPaginationClient {
    /// Creates a client from configuration.
    pub fn new(config: &Config) -> Self {
        let policy = RetryPolicy::new(config.max_retries, config.backoff_unit())
            .on(Outcome::RateLimited, Backoff::Exponential)
            .otherwise(Backoff::Constant(1));

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            accept_language: config.accept_language.clone(),
            page_size: config.page_size.max(1),
            page_delay: Duration::from_millis(config.page_delay_ms),
            request_timeout: Duration::from_secs(config.api_timeout_secs),
            policy,
            config: config.clone(),
        }
    }

    fn api_url(&self, product_id: &str) -> String {
        format!("{}/yml/offer-view/offers/{}", self.base_url, product_id)
    }

    /// Collects every offer for `target` in endpoint order.
    ///
    /// Never fails: when a page cannot be fetched or decoded, the offers
    /// gathered so far are returned.
    pub async fn fetch(&self, target: &ProductTarget) -> Vec<Offer> {
        info!("Fetching offers for product {} (city {})", target.product_id, target.city_id);

        // A fresh client (and cookie jar) per run; never shared across products.
        let client = match build_client(&self.config, self.request_timeout, true) {
            Ok(client) => client,
            Err(e) => {
                warn!("Could not build offers client: {}", e);
                return Vec::new();
            }
        };

        if let Err(e) = self.acquire_cookies(&client, target).await {
            warn!("Could not open product page for cookies: {}", e);
            return Vec::new();
        }

        let api_url = self.api_url(&target.product_id);
        let mut offers = Vec::new();
        let mut page = 0u32;

        loop {
            let Some(body) = self.fetch_page(&client, &api_url, target, page).await else {
                warn!("Page {} unavailable after {} attempts", page, self.policy.max_retries());
                break;
            };

            let parsed: OfferPageResponse = match serde_json::from_str(&body) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Malformed offers JSON on page {}: {}", page, e);
                    break;
                }
            };

            let raw_offers = parsed.offers.unwrap_or_default();
            let count = raw_offers.len();
            if count == 0 {
                debug!("Page {}: no offers, done", page);
                break;
            }

            debug!("Page {}: {} offers", page, count);
            offers.extend(raw_offers.iter().map(normalize_offer));

            if count < self.page_size {
                debug!("Page {} is short ({} < {}), last page", page, count, self.page_size);
                break;
            }

            page += 1;
            tokio::time::sleep(self.page_delay).await;
        }

        info!("Collected {} offers", offers.len());
        offers
    }

    /// GETs the product page so the session picks up anti-bot cookies.
    async fn acquire_cookies(&self, client: &Client, target: &ProductTarget) -> Result<(), ScrapeError> {
        let response = client
            .get(&target.url)
            .emulation(Emulation::Chrome131)
            .header("User-Agent", &self.user_agent)
            .header("Accept-Language", &self.accept_language)
            .send()
            .await?;

        debug!("Cookie warm-up status: {}", response.status());
        Ok(())
    }

    async fn fetch_page(
        &self,
        client: &Client,
        api_url: &str,
        target: &ProductTarget,
        page: u32,
    ) -> Option<String> {
        let label = format!("offers page {}", page);

        self.policy
            .run(&label, |_| async move {
                match self.post_page(client, api_url, target, page).await {
                    Ok(body) => Step::Done(body),
                    Err(e) => {
                        debug!("Offers request failed on page {}: {}", page, e);
                        Step::Retry(e.outcome())
                    }
                }
            })
            .await
    }

    async fn post_page(
        &self,
        client: &Client,
        api_url: &str,
        target: &ProductTarget,
        page: u32,
    ) -> Result<String, ScrapeError> {
        let payload = OfferPageRequest {
            city_id: &target.city_id,
            limit: self.page_size,
            page,
            sort: true,
        };
        let body = serde_json::to_vec(&payload).map_err(|e| ScrapeError::Parse(e.to_string()))?;

        let response = client
            .post(api_url)
            .emulation(Emulation::Chrome131)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json, text/plain, */*")
            .header("Accept-Language", &self.accept_language)
            .header("Content-Type", "application/json")
            .header("Referer", &target.url)
            .header("Origin", &self.base_url)
            .header("X-Requested-With", "XMLHttpRequest")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(ScrapeError::Status(status));
        }
        Ok(response.text().await?)
    }
}
