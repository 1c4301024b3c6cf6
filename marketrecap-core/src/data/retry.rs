//! Bounded retry with exponential backoff around a single provider call.
//!
//! Every provider failure, and every empty result, counts as a failed attempt.
//! After the last attempt the error is surfaced as [`FetchError`] naming the
//! ticker. Waits between attempts are plain thread sleeps on the caller's
//! thread, so independent fetches can run on separate workers.

use super::provider::{HistoryRequest, PriceHistoryClient, ProviderError, RawPriceTable};
use super::ticker::Ticker;
use chrono::NaiveDate;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Retry budget and backoff bounds.
///
/// The wait after failed attempt `k` (1-based) is
/// `multiplier * 2^(k-1)` seconds, clamped to `[min_wait, max_wait]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_wait: Duration::from_secs(2),
            max_wait: Duration::from_secs(10),
            multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once and never waits.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before the attempt following failed attempt `attempt` (1-based).
    pub fn wait_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(62) as i32;
        let secs = self.multiplier * 2f64.powi(exponent);
        let min = self.min_wait.as_secs_f64();
        let max = self.max_wait.as_secs_f64().max(min);
        let clamped = if secs.is_finite() { secs.clamp(min, max) } else { max };
        Duration::from_secs_f64(clamped)
    }
}

/// How the fetcher waits between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// All attempts for a ticker failed.
#[derive(Debug, Error)]
#[error("failed to fetch {ticker} after {attempts} attempt(s): {source}")]
pub struct FetchError {
    pub ticker: String,
    pub attempts: u32,
    #[source]
    pub source: ProviderError,
}

/// Wraps a [`PriceHistoryClient`] with the retry policy.
pub struct RetryingFetcher<C> {
    client: C,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl<C: PriceHistoryClient> RetryingFetcher<C> {
    pub fn new(client: C) -> Self {
        Self::with_policy(client, RetryPolicy::default())
    }

    pub fn with_policy(client: C, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Replace the thread sleeper (tests record waits instead of blocking).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Download adjusted daily bars for `ticker` over `start..end`.
    pub fn fetch(&self, ticker: &Ticker, start: NaiveDate, end: NaiveDate) -> Result<RawPriceTable, FetchError> {
        let request = HistoryRequest::range(ticker.as_str(), start, end);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            info!(
                "[{}] downloading {ticker}: {start} -> {end} (attempt {attempt}/{max_attempts})",
                self.client.name()
            );

            let error = match self.client.download(&request) {
                Ok(table) if !table.is_empty() => return Ok(table),
                Ok(_) => ProviderError::NoData {
                    symbol: ticker.to_string(),
                },
                Err(e) => e,
            };

            if attempt >= max_attempts {
                warn!("[{}] giving up on {ticker} after {attempt} attempt(s): {error}", self.client.name());
                return Err(FetchError {
                    ticker: ticker.to_string(),
                    attempts: attempt,
                    source: error,
                });
            }

            let wait = self.policy.wait_after(attempt);
            warn!(
                "[{}] attempt {attempt}/{max_attempts} for {ticker} failed: {error}; retrying in {:.1}s",
                self.client.name(),
                wait.as_secs_f64()
            );
            self.sleeper.sleep(wait);
            attempt += 1;
        }
    }
}
