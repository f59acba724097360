//! Shared retry driver with per-outcome backoff tables.
//!
//! Each stage describes its retry behaviour as a [`RetryPolicy`]: a table
//! mapping an [`Outcome`] class to a [`Backoff`] strategy. Delays are counted
//! in units (one second in production) so tests can shrink them.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Classified result of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// HTTP 429
    RateLimited,
    /// HTTP 403 / 503
    Blocked,
    /// Any other non-200 status
    UnexpectedStatus,
    /// The page loaded but had nothing usable on it
    Empty,
    /// Connection refused / reset
    Connect,
    /// Request or render deadline hit
    Timeout,
    /// Body could not be decoded
    Malformed,
    /// Anything else
    Other,
}

impl Outcome {
    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Outcome::RateLimited,
            403 | 503 => Outcome::Blocked,
            _ => Outcome::UnexpectedStatus,
        }
    }
}

/// Delay strategy, in backoff units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay every attempt
    Constant(u64),
    /// `base + attempt`
    Linear { base: u64 },
    /// `2^attempt`
    Exponential,
}

impl Backoff {
    /// Number of units to wait after the given zero-based attempt.
    pub fn units(&self, attempt: u32) -> u64 {
        match self {
            Backoff::Constant(n) => *n,
            Backoff::Linear { base } => base + u64::from(attempt),
            Backoff::Exponential => 1u64 << attempt.min(32),
        }
    }
}

/// Position of the current attempt within the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// Zero-based attempt number
    pub index: u32,
    /// True on the final attempt of the budget
    pub last: bool,
}

/// What the attempt closure wants the driver to do next.
#[derive(Debug)]
pub enum Step<T> {
    /// Finished with a value
    Done(T),
    /// Failed with the given outcome; back off and try again
    Retry(Outcome),
    /// Give up without further attempts
    Stop,
}

/// Declarative retry table evaluated by [`RetryPolicy::run`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    unit: Duration,
    rules: Vec<(Outcome, Backoff)>,
    fallback: Backoff,
}

impl RetryPolicy {
    /// Creates a policy with a flat one-unit fallback and no rules.
    pub fn new(max_retries: u32, unit: Duration) -> Self {
        Self { max_retries, unit, rules: Vec::new(), fallback: Backoff::Constant(1) }
    }

    /// Adds a rule for one outcome class.
    pub fn on(mut self, outcome: Outcome, backoff: Backoff) -> Self {
        self.rules.retain(|(o, _)| *o != outcome);
        self.rules.push((outcome, backoff));
        self
    }

    /// Sets the backoff used for outcomes without a rule.
    pub fn otherwise(mut self, backoff: Backoff) -> Self {
        self.fallback = backoff;
        self
    }

    /// Attempt ceiling.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Strategy for an outcome.
    pub fn backoff_for(&self, outcome: Outcome) -> Backoff {
        self.rules.iter().find(|(o, _)| *o == outcome).map(|(_, b)| *b).unwrap_or(self.fallback)
    }

    /// Concrete delay after a failed attempt.
    pub fn delay_for(&self, outcome: Outcome, attempt: u32) -> Duration {
        let units = self.backoff_for(outcome).units(attempt);
        self.unit.saturating_mul(u32::try_from(units).unwrap_or(u32::MAX))
    }

    /// Runs `op` until it returns [`Step::Done`], [`Step::Stop`], or the
    /// budget of `max_retries` attempts is spent. No sleep follows the final attempt.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Option<T>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Step<T>>,
    {
        for index in 0..self.max_retries {
            let attempt = Attempt { index, last: index + 1 == self.max_retries };
            debug!("{}: attempt {}/{}", label, index + 1, self.max_retries);

            match op(attempt).await {
                Step::Done(value) => return Some(value),
                Step::Stop => {
                    debug!("{}: stopped on attempt {}", label, index + 1);
                    return None;
                }
                Step::Retry(outcome) => {
                    if attempt.last {
                        break;
                    }
                    let delay = self.delay_for(outcome, index);
                    debug!("{}: {:?}, retrying in {:?}", label, outcome, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        warn!("{}: giving up after {} attempts", label, self.max_retries);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn category_like() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(1))
            .on(Outcome::RateLimited, Backoff::Exponential)
            .on(Outcome::Blocked, Backoff::Linear { base: 3 })
            .on(Outcome::Connect, Backoff::Constant(3))
            .otherwise(Backoff::Constant(2))
    }

    #[test]
    fn test_backoff_units() {
        assert_eq!(Backoff::Constant(2).units(0), 2);
        assert_eq!(Backoff::Constant(2).units(5), 2);
        assert_eq!(Backoff::Linear { base: 3 }.units(0), 3);
        assert_eq!(Backoff::Linear { base: 3 }.units(2), 5);
        assert_eq!(Backoff::Exponential.units(0), 1);
        assert_eq!(Backoff::Exponential.units(1), 2);
        assert_eq!(Backoff::Exponential.units(3), 8);
    }

    #[test]
    fn test_table_lookup() {
        let policy = category_like();
        assert_eq!(policy.delay_for(Outcome::RateLimited, 2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(Outcome::Blocked, 1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(Outcome::Connect, 0), Duration::from_secs(3));
        assert_eq!(policy.delay_for(Outcome::Timeout, 0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(Outcome::Empty, 1), Duration::from_secs(2));
    }

    #[test]
    fn test_later_rule_replaces_earlier() {
        let policy = RetryPolicy::new(1, Duration::from_secs(1))
            .on(Outcome::Timeout, Backoff::Constant(9))
            .on(Outcome::Timeout, Backoff::Constant(4));
        assert_eq!(policy.backoff_for(Outcome::Timeout), Backoff::Constant(4));
    }

    #[test]
    fn test_outcome_from_status() {
        assert_eq!(Outcome::from_status(429), Outcome::RateLimited);
        assert_eq!(Outcome::from_status(403), Outcome::Blocked);
        assert_eq!(Outcome::from_status(503), Outcome::Blocked);
        assert_eq!(Outcome::from_status(500), Outcome::UnexpectedStatus);
        assert_eq!(Outcome::from_status(404), Outcome::UnexpectedStatus);
    }

    #[tokio::test]
    async fn test_run_succeeds_after_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result = policy
            .run("test", |attempt| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if attempt.index < 2 {
                        Step::Retry(Outcome::RateLimited)
                    } else {
                        Step::Done(attempt.index)
                    }
                }
            })
            .await;

        assert_eq!(result, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_exhausts_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Option<()> = policy
            .run("test", |_| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Step::Retry(Outcome::Other)
                }
            })
            .await;

        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(1, Duration::from_secs(60));

        let started = std::time::Instant::now();
        let result: Option<()> = policy
            .run("test", |attempt| {
                let calls = Arc::clone(&calls);
                async move {
                    assert!(attempt.last);
                    calls.fetch_add(1, Ordering::SeqCst);
                    Step::Retry(Outcome::RateLimited)
                }
            })
            .await;

        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // no sleep after the final attempt
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_stop_short_circuits() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(5, Duration::from_millis(1));

        let result: Option<()> = policy
            .run("test", |_| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Step::Stop
                }
            })
            .await;

        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_budget_never_calls() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(0, Duration::from_millis(1));

        let result: Option<()> = policy
            .run("test", |_| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Step::Done(())
                }
            })
            .await;

        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
