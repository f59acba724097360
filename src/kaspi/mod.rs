//! kaspi.kz product page extraction: browser rendering, offers, rating,
//! category path and attribute cleanup.

pub mod assembler;
pub mod browser;
pub mod category;
pub mod dedup;
pub mod fetcher;
pub mod http;
pub mod models;
pub mod offers;
pub mod parser;
pub mod rating;
pub mod retry;
pub mod selectors;
pub mod target;

pub use assembler::{ProductRecordAssembler, ProductScraper};
pub use browser::{BrowserLauncher, BrowserSession, ChromiumLauncher};
pub use category::CategoryPathExtractor;
pub use dedup::{key_found_in_text, AttributeDeduplicator};
pub use fetcher::PageFetcher;
pub use http::StaticMarkupClient;
pub use models::{AttributeMap, Attributes, Offer, RatingInfo, ScrapeResult};
pub use offers::OfferPaginationClient;
pub use parser::Parser;
pub use rating::RatingExtractor;
pub use target::{is_valid_product_url, ProductTarget};
