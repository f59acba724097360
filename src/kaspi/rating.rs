//! Rating widget extraction with bounded re-rendering.

use crate::config::Config;
use crate::kaspi::browser::{BrowserLauncher, SessionGuard};
use crate::kaspi::models::RatingInfo;
use crate::kaspi::retry::{Attempt, Backoff, Outcome, RetryPolicy, Step};
use crate::kaspi::selectors::rating;
use regex_lite::Regex;
use scraper::Html;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// `rating _45` encodes 4.5 stars.
static CODED_RATING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_(\d+)").unwrap());

static FIRST_INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Parses the rating widget out of page HTML.
///
/// The star value comes from a `_<digits>` class token divided by 10; the
/// review count is the first integer in the review link text.
pub fn parse_rating(html: &str) -> RatingInfo {
    let document = Html::parse_document(html);
    let Some(widget) = document.select(&rating::WIDGET).next() else {
        return RatingInfo::default();
    };

    let stars = widget.select(&rating::STARS).next().and_then(|span| {
        let classes = span.value().classes().collect::<Vec<_>>().join(" ");
        let code: u32 = CODED_RATING.captures(&classes)?[1].parse().ok()?;
        Some((f64::from(code) / 10.0).clamp(0.0, 5.0))
    });

    let reviews_count = widget.select(&rating::REVIEWS).next().and_then(|span| {
        let text = span.text().collect::<String>();
        FIRST_INTEGER.find(&text)?.as_str().parse().ok()
    });

    RatingInfo { rating: stars, reviews_count }
}

/// Renders the page until the rating widget yields a value or the budget runs out.
pub struct RatingExtractor {
    launcher: Arc<dyn BrowserLauncher>,
    policy: RetryPolicy,
    navigation_timeout: Duration,
    widget_timeout: Duration,
}

impl RatingExtractor {
    /// Creates an extractor sharing the pipeline's browser launcher.
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: &Config) -> Self {
        Self {
            launcher,
            policy: RetryPolicy::new(config.max_retries, config.backoff_unit())
                .otherwise(Backoff::Constant(2)),
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            widget_timeout: Duration::from_secs(config.rating_timeout_secs),
        }
    }

    /// Returns rating and review count, both null when nothing was found.
    pub async fn extract(&self, url: &str) -> RatingInfo {
        info!("Extracting rating: {}", url);

        match self.policy.run("rating", |attempt| self.attempt(url, attempt)).await {
            Some(info) => {
                debug!("Rating: {:?}, reviews: {:?}", info.rating, info.reviews_count);
                info
            }
            None => {
                warn!("Rating widget not found for {}", url);
                RatingInfo::default()
            }
        }
    }

    async fn attempt(&self, url: &str, attempt: Attempt) -> Step<RatingInfo> {
        let session = match self.launcher.launch().await {
            Ok(session) => SessionGuard::new(session, url),
            Err(e) => {
                warn!("Browser unavailable, skipping rating: {}", e);
                return Step::Stop;
            }
        };

        let step = self.try_render(&session, url, attempt).await;
        session.close().await;
        step
    }

    async fn try_render(&self, session: &SessionGuard, url: &str, attempt: Attempt) -> Step<RatingInfo> {
        if let Err(e) = session.goto(url, self.navigation_timeout).await {
            debug!("Navigation failed: {}", e);
            return Step::Retry(Outcome::Other);
        }

        if !session.wait_for_selector(rating::WIDGET_CSS, self.widget_timeout).await {
            if !attempt.last {
                debug!("Rating widget did not appear within {:?}", self.widget_timeout);
                return Step::Retry(Outcome::Timeout);
            }
            debug!("Last attempt, parsing whatever markup rendered");
        }

        let html = match session.content().await {
            Ok(html) => html,
            Err(e) => return Step::Retry(e.outcome()),
        };

        let info = parse_rating(&html);
        if info.is_empty() {
            debug!("Neither rating nor review count present");
            Step::Retry(Outcome::Empty)
        } else {
            Step::Done(info)
        }
    }
}
