//! Full product scrape command implementation.

use crate::config::Config;
use crate::format::Formatter;
use crate::kaspi::{is_valid_product_url, ProductRecordAssembler, ProductScraper, ScrapeResult};
use anyhow::{Context, Result};
use tracing::info;

/// Rejects anything that is not a kaspi.kz product URL with a city parameter.
pub(crate) fn validate_url(url: &str) -> Result<&str> {
    let url = url.trim();
    if !is_valid_product_url(url) {
        anyhow::bail!(
            "Invalid product URL: '{}'. Expected https://kaspi.kz/shop/p/<name>-<id>/?c=<city>",
            url
        );
    }
    Ok(url)
}

/// Executes the full extraction pipeline for product URLs.
pub struct ProductCommand {
    config: Config,
}

impl ProductCommand {
    /// Creates a new product command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Scrapes one product and returns formatted output.
    pub async fn execute(&self, url: &str) -> Result<String> {
        let scraper =
            ProductRecordAssembler::new(&self.config).context("Failed to create scraper")?;

        self.execute_with_scraper(&scraper, url).await
    }

    /// Scrapes one product with a provided scraper (for testing).
    pub async fn execute_with_scraper(
        &self,
        scraper: &impl ProductScraper,
        url: &str,
    ) -> Result<String> {
        let url = validate_url(url)?;
        info!("Scraping product: {}", url);

        let result = scraper.scrape(url).await.with_context(|| format!("Failed to scrape {url}"))?;

        let formatter = Formatter::new(self.config.format);
        Ok(formatter.format_result(&result))
    }

    /// Scrapes several products, one after another.
    pub async fn execute_batch(&self, urls: &[String]) -> Result<String> {
        let scraper =
            ProductRecordAssembler::new(&self.config).context("Failed to create scraper")?;

        self.execute_batch_with_scraper(&scraper, urls).await
    }

    /// Scrapes several products with a provided scraper (for testing).
    ///
    /// Invalid URLs and failed scrapes are reported on stderr and skipped.
    pub async fn execute_batch_with_scraper(
        &self,
        scraper: &impl ProductScraper,
        urls: &[String],
    ) -> Result<String> {
        let mut results: Vec<ScrapeResult> = Vec::new();

        for url in urls {
            let url = match validate_url(url) {
                Ok(url) => url,
                Err(e) => {
                    eprintln!("Skipping: {}", e);
                    continue;
                }
            };

            info!("Scraping product: {}", url);

            match scraper.scrape(url).await {
                Ok(result) => results.push(result),
                Err(e) => eprintln!("Failed to scrape {}: {}", url, e),
            }
        }

        let formatter = Formatter::new(self.config.format);
        Ok(formatter.format_results(&results))
    }
}
