//! Product URL normalization: product id, city id, and shape validation.

use crate::error::ScrapeError;
use regex_lite::Regex;
use std::sync::LazyLock;
use url::Url;

static PRODUCT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/p/[^/]+-(\d+)").unwrap());

static PRODUCT_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/p/[^/]+-(\d+)/?$").unwrap());

/// Marketplace host every valid product URL must point at.
pub const KASPI_HOST: &str = "kaspi.kz";

/// Extracts the numeric product id from a `/p/<slug>-<id>` URL.
pub fn extract_product_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    PRODUCT_ID.captures(parsed.path()).map(|c| c[1].to_string())
}

/// Extracts the numeric city id from the `c` query parameter.
pub fn extract_city_id(url: &str) -> Option<String> {
    Url::parse(url.trim()).ok().as_ref().and_then(city_param)
}

/// First `c` query value, decoded, if it is all digits.
fn city_param(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "c")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()))
}

fn is_kaspi_host(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|host| host == KASPI_HOST || host.ends_with(&format!(".{KASPI_HOST}")))
}

/// Checks that a URL is a kaspi.kz product page with a numeric city parameter.
pub fn is_valid_product_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };

    matches!(parsed.scheme(), "http" | "https")
        && is_kaspi_host(&parsed)
        && PRODUCT_PATH.is_match(parsed.path())
        && city_param(&parsed).is_some()
}

/// A product URL with its extracted identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductTarget {
    pub url: String,
    pub product_id: String,
    pub city_id: String,
}

impl ProductTarget {
    /// Extracts identifiers from a URL. Host checks are left to the caller.
    pub fn parse(url: &str) -> Result<Self, ScrapeError> {
        let url = url.trim();
        let invalid = |reason: &str| ScrapeError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;

        let product_id = PRODUCT_ID
            .captures(parsed.path())
            .map(|c| c[1].to_string())
            .ok_or_else(|| invalid("no product id in /p/<name>-<id> path"))?;

        let city_id = city_param(&parsed).ok_or_else(|| invalid("missing numeric c= city parameter"))?;

        Ok(Self { url: url.to_string(), product_id, city_id })
    }
}
