//! kaspi-crawler - kaspi.kz product page extraction
//!
//! Renders product pages in headless Chromium, walks the offers endpoint,
//! and assembles a single normalized record per product.

pub mod commands;
pub mod config;
pub mod error;
pub mod format;
pub mod kaspi;

pub use config::Config;
pub use error::ScrapeError;
pub use kaspi::models::{Attributes, Offer, RatingInfo, ScrapeResult};
pub use kaspi::{ProductRecordAssembler, ProductScraper};
