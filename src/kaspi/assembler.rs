//! End-to-end extraction of one product record.

use crate::config::Config;
use crate::error::ScrapeError;
use crate::kaspi::browser::{BrowserLauncher, ChromiumLauncher};
use crate::kaspi::category::CategoryPathExtractor;
use crate::kaspi::dedup::AttributeDeduplicator;
use crate::kaspi::fetcher::PageFetcher;
use crate::kaspi::models::{Offer, RatingInfo, ScrapeResult};
use crate::kaspi::offers::OfferPaginationClient;
use crate::kaspi::parser::Parser;
use crate::kaspi::rating::RatingExtractor;
use crate::kaspi::target::ProductTarget;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Product extraction entry points - enables mocking for command tests.
#[async_trait]
pub trait ProductScraper: Send + Sync {
    /// Runs the full pipeline for one product URL.
    async fn scrape(&self, url: &str) -> Result<ScrapeResult, ScrapeError>;

    /// Only the offers of a product.
    async fn offers(&self, url: &str) -> Result<Vec<Offer>, ScrapeError>;

    /// Only the rating widget values.
    async fn rating(&self, url: &str) -> RatingInfo;

    /// Only the breadcrumb category path.
    async fn category(&self, url: &str) -> Option<String>;
}

/// Runs fetch, offers, rating, category and dedup in sequence.
pub struct ProductRecordAssembler {
    fetcher: PageFetcher,
    offers: OfferPaginationClient,
    rating: RatingExtractor,
    category: CategoryPathExtractor,
    parser: Parser,
    dedup: AttributeDeduplicator,
}

impl ProductRecordAssembler {
    /// Creates an assembler driving a local Chromium.
    pub fn new(config: &Config) -> Result<Self, ScrapeError> {
        Self::with_launcher(Arc::new(ChromiumLauncher::new(config)), config)
    }

    /// Creates an assembler on top of any browser launcher.
    pub fn with_launcher(
        launcher: Arc<dyn BrowserLauncher>,
        config: &Config,
    ) -> Result<Self, ScrapeError> {
        Ok(Self {
            fetcher: PageFetcher::new(Arc::clone(&launcher), config),
            offers: OfferPaginationClient::new(config),
            rating: RatingExtractor::new(launcher, config),
            category: CategoryPathExtractor::new(config)?,
            parser: Parser::new(config.attributes.clone()),
            dedup: AttributeDeduplicator::new(config.attributes.clone()),
        })
    }
}

#[async_trait]
impl ProductScraper for ProductRecordAssembler {
    /// Fails only on an unusable URL or when the page cannot be rendered at
    /// all; every later stage degrades to empty fields.
    async fn scrape(&self, url: &str) -> Result<ScrapeResult, ScrapeError> {
        let target = ProductTarget::parse(url)?;
        info!("Scraping product {} (city {})", target.product_id, target.city_id);

        let page = self.fetcher.fetch(&target.url).await?;
        let parsed = self.parser.parse_product_page(&page.html);

        let mut result =
            ScrapeResult::new(&target.url, &target.product_id, &target.city_id, page.fetched_at);
        result.name = parsed.name;
        result.images = parsed.images;

        result.set_offers(self.offers.fetch(&target).await);
        result.set_rating(self.rating.extract(&target.url).await);
        result.category = self.category.extract(&target.url).await;

        let attributes = self.parser.merge_attributes(parsed.groups, parsed.fallback);
        result.attributes = self.dedup.dedup(attributes);

        info!(
            "Scraped {:?}: {} offers, {} images, {} attribute entries",
            result.name,
            result.offers_count,
            result.images.len(),
            result.attributes.len()
        );
        Ok(result)
    }

    async fn offers(&self, url: &str) -> Result<Vec<Offer>, ScrapeError> {
        let target = ProductTarget::parse(url)?;
        Ok(self.offers.fetch(&target).await)
    }

    async fn rating(&self, url: &str) -> RatingInfo {
        self.rating.extract(url).await
    }

    async fn category(&self, url: &str) -> Option<String> {
        self.category.extract(url).await
    }
}
