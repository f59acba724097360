//! Error taxonomy for the extraction pipeline.

use crate::kaspi::retry::Outcome;
use thiserror::Error;

/// Errors raised inside the pipeline.
///
/// Only [`ScrapeError::Navigation`], [`ScrapeError::Browser`] and
/// [`ScrapeError::InvalidUrl`] ever leave the assembler; every other variant
/// is classified into a retry [`Outcome`] and absorbed by the stage that saw it.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid product URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl ScrapeError {
    /// Returns true if the error means the source could not be reached at all.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScrapeError::Navigation { .. } | ScrapeError::Browser(_) | ScrapeError::InvalidUrl { .. }
        )
    }

    /// Classifies the error for retry-table lookup.
    pub fn outcome(&self) -> Outcome {
        match self {
            ScrapeError::Timeout(_) => Outcome::Timeout,
            ScrapeError::Connect(_) => Outcome::Connect,
            ScrapeError::Status(status) => Outcome::from_status(*status),
            ScrapeError::Parse(_) => Outcome::Malformed,
            _ => Outcome::Other,
        }
    }
}

impl From<wreq::Error> for ScrapeError {
    fn from(err: wreq::Error) -> Self {
        if err.is_timeout() {
            ScrapeError::Timeout(err.to_string())
        } else if err.is_connect() {
            ScrapeError::Connect(err.to_string())
        } else {
            ScrapeError::Http(err.to_string())
        }
    }
}
