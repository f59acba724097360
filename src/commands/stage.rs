//! Single-stage commands: offers, rating, or category only.

use crate::commands::product::validate_url;
use crate::config::Config;
use crate::format::Formatter;
use crate::kaspi::{ProductRecordAssembler, ProductScraper};
use anyhow::{Context, Result};
use tracing::info;

/// Which pipeline stage to run on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Offers,
    Rating,
    Category,
}

/// Runs one stage of the pipeline for a product URL.
pub struct StageCommand {
    config: Config,
    stage: Stage,
}

impl StageCommand {
    /// Creates a command running one stage.
    pub fn new(config: Config, stage: Stage) -> Self {
        Self { config, stage }
    }

    /// Runs the stage and returns formatted output.
    pub async fn execute(&self, url: &str) -> Result<String> {
        let scraper =
            ProductRecordAssembler::new(&self.config).context("Failed to create scraper")?;

        self.execute_with_scraper(&scraper, url).await
    }

    /// Runs the stage with a provided scraper (for testing).
    pub async fn execute_with_scraper(
        &self,
        scraper: &impl ProductScraper,
        url: &str,
    ) -> Result<String> {
        let url = validate_url(url)?;
        info!("Running {:?} stage: {}", self.stage, url);

        let formatter = Formatter::new(self.config.format);
        let output = match self.stage {
            Stage::Offers => formatter.format_offers(&scraper.offers(url).await?),
            Stage::Rating => formatter.format_rating(&scraper.rating(url).await),
            Stage::Category => formatter.format_category(scraper.category(url).await.as_deref()),
        };

        Ok(output)
    }
}
