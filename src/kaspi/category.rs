//! Breadcrumb category path extraction over plain HTTP.

use crate::config::Config;
use crate::error::ScrapeError;
use crate::kaspi::http::StaticMarkupClient;
use crate::kaspi::retry::{Backoff, Outcome, RetryPolicy, Step};
use crate::kaspi::selectors::breadcrumbs;
use scraper::Html;
use tracing::{debug, info, trace, warn};

/// Separator between breadcrumb labels.
pub const PATH_SEPARATOR: &str = " > ";

/// Extracts the breadcrumb trail from page markup.
///
/// Uses the first selector that matches anything, drops root labels, and
/// returns `None` when nothing is left.
pub fn extract_category_path(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let crumbs = breadcrumbs::CANDIDATES.iter().find_map(|(css, selector)| {
        let found: Vec<_> = document.select(selector).collect();
        if found.is_empty() {
            trace!("Breadcrumb selector '{}' matched nothing", css);
            None
        } else {
            debug!("Breadcrumbs found with selector '{}'", css);
            Some(found)
        }
    })?;

    let labels: Vec<String> = crumbs
        .into_iter()
        .map(|a| a.text().map(str::trim).collect::<String>())
        .filter(|label| !label.is_empty() && !is_root_label(label))
        .collect();

    if labels.is_empty() {
        debug!("All breadcrumb labels were empty or root labels");
        return None;
    }

    Some(labels.join(PATH_SEPARATOR))
}

fn is_root_label(label: &str) -> bool {
    let lower = label.to_lowercase();
    breadcrumbs::ROOT_LABELS.contains(&lower.as_str())
}

/// Fetches the product page markup and resolves its category path.
pub struct CategoryPathExtractor {
    client: StaticMarkupClient,
    policy: RetryPolicy,
}

impl CategoryPathExtractor {
    /// Creates an extractor from configuration.
    pub fn new(config: &Config) -> Result<Self, ScrapeError> {
        let policy = RetryPolicy::new(config.max_retries, config.backoff_unit())
            .on(Outcome::RateLimited, Backoff::Exponential)
            .on(Outcome::Blocked, Backoff::Linear { base: 3 })
            .on(Outcome::Connect, Backoff::Constant(3))
            .otherwise(Backoff::Constant(2));

        Ok(Self { client: StaticMarkupClient::new(config)?, policy })
    }

    /// Returns the joined path, or `None` once every attempt failed.
    pub async fn extract(&self, url: &str) -> Option<String> {
        info!("Resolving category for {}", url);

        let path = self
            .policy
            .run("category", |_| async move {
                match self.client.get(url).await {
                    Ok(response) if response.is_ok() => match extract_category_path(&response.body) {
                        Some(path) => Step::Done(path),
                        None => Step::Retry(Outcome::Empty),
                    },
                    Ok(response) => {
                        debug!("HTTP {} while fetching breadcrumbs", response.status);
                        Step::Retry(response.outcome().unwrap_or(Outcome::UnexpectedStatus))
                    }
                    Err(e) => {
                        debug!("Breadcrumb request failed: {}", e);
                        Step::Retry(e.outcome())
                    }
                }
            })
            .await;

        match &path {
            Some(path) => info!("Category: {}", path),
            None => warn!("No category path for {}", url),
        }
        path
    }
}
