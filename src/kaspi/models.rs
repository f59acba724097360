//! Data models for scraped product records, offers, and ratings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Key-value pairs of a single specification group.
pub type AttributeMap = BTreeMap<String, String>;

/// Product attributes, either grouped by specification heading or flat.
///
/// The shape is decided once by the assembler: grouped when the page carried
/// at least one structured specification block, flat otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Attributes {
    Grouped(BTreeMap<String, AttributeMap>),
    Flat(AttributeMap),
}

impl Attributes {
    /// Number of top-level entries (groups or flat keys).
    pub fn len(&self) -> usize {
        match self {
            Attributes::Grouped(groups) => groups.len(),
            Attributes::Flat(map) => map.len(),
        }
    }

    /// Returns true if there are no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-level keys in iteration order.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Attributes::Grouped(groups) => groups.keys().map(String::as_str).collect(),
            Attributes::Flat(map) => map.keys().map(String::as_str).collect(),
        }
    }

    /// Removes a top-level entry, returning whether it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        match self {
            Attributes::Grouped(groups) => groups.remove(key).is_some(),
            Attributes::Flat(map) => map.remove(key).is_some(),
        }
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Attributes::Flat(AttributeMap::new())
    }
}

/// A single seller's listing returned by the offers endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    /// Merchant display name
    pub seller_name: String,
    /// Listed price, if the endpoint returned one
    pub price: Option<f64>,
}

impl Offer {
    /// Creates a new offer.
    pub fn new(seller_name: impl Into<String>, price: Option<f64>) -> Self {
        Self { seller_name: seller_name.into(), price }
    }
}

/// Rating widget values. Both fields are null when the widget never rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingInfo {
    /// Star rating (0.0 - 5.0)
    pub rating: Option<f64>,
    /// Number of reviews
    pub reviews_count: Option<u32>,
}

impl RatingInfo {
    /// Returns true if neither value was found.
    pub fn is_empty(&self) -> bool {
        self.rating.is_none() && self.reviews_count.is_none()
    }
}

/// Returns `(min, max)` over the non-null offer prices.
pub fn price_bounds(offers: &[Offer]) -> Option<(f64, f64)> {
    offers.iter().filter_map(|o| o.price).fold(None, |acc, price| match acc {
        None => Some((price, price)),
        Some((lo, hi)) => Some((lo.min(price), hi.max(price))),
    })
}

/// Normalized record for one product page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    /// Product page URL as given
    pub url: String,
    /// Numeric product identifier taken from the URL
    pub product_id: String,
    /// Locality the offers were requested for
    pub city_id: String,
    /// Product title
    pub name: Option<String>,
    /// Breadcrumb path joined with " > "
    pub category: Option<String>,
    /// Lowest offer price
    pub price_min: Option<f64>,
    /// Highest offer price
    pub price_max: Option<f64>,
    /// Star rating (0.0 - 5.0)
    pub rating: Option<f64>,
    /// Number of reviews
    pub reviews_count: Option<u32>,
    /// Absolute image URLs without query strings
    pub images: BTreeSet<String>,
    /// Specification attributes
    pub attributes: Attributes,
    /// Seller offers in endpoint order
    pub offers: Vec<Offer>,
    /// Number of collected offers
    pub offers_count: usize,
    /// When the page was rendered
    pub fetched_at: DateTime<Utc>,
}

impl ScrapeResult {
    /// Creates an empty record for the given product.
    pub fn new(
        url: impl Into<String>,
        product_id: impl Into<String>,
        city_id: impl Into<String>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            product_id: product_id.into(),
            city_id: city_id.into(),
            name: None,
            category: None,
            price_min: None,
            price_max: None,
            rating: None,
            reviews_count: None,
            images: BTreeSet::new(),
            attributes: Attributes::default(),
            offers: Vec::new(),
            offers_count: 0,
            fetched_at,
        }
    }

    /// Stores the offers and derives price bounds and count from them.
    pub fn set_offers(&mut self, offers: Vec<Offer>) {
        let bounds = price_bounds(&offers);
        self.price_min = bounds.map(|(lo, _)| lo);
        self.price_max = bounds.map(|(_, hi)| hi);
        self.offers_count = offers.len();
        self.offers = offers;
    }

    /// Copies the rating widget values into the record.
    pub fn set_rating(&mut self, info: RatingInfo) {
        self.rating = info.rating;
        self.reviews_count = info.reviews_count;
    }
}
