//! Fetcher facade: validate, download with retry, normalize.

use super::normalize::{CanonicalTable, NormalizationError, Normalizer};
use super::provider::PriceHistoryClient;
use super::retry::{FetchError, RetryPolicy, RetryingFetcher, Sleeper};
use super::ticker::{Ticker, ValidationError};
use super::yahoo::YahooClient;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Static identity used to rank fetchers. Lower priority is preferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetcherIdentity {
    pub name: String,
    pub priority: u32,
}

/// First failure of the validate -> fetch -> normalize pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),
}

impl PipelineError {
    /// Whether trying another source could help. Validation failures are
    /// about the input, not the source.
    pub fn is_source_failure(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }
}

/// A source of canonical daily price history.
pub trait HistoryFetcher: Send + Sync {
    fn identify(&self) -> FetcherIdentity;

    /// Canonical bars for `raw_code` over `start..end` (end exclusive).
    fn fetch_history(
        &self,
        raw_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CanonicalTable, PipelineError>;
}

/// Yahoo Finance backed fetcher.
pub struct YahooHistoryFetcher<C = YahooClient> {
    inner: RetryingFetcher<C>,
}

impl<C> YahooHistoryFetcher<C> {
    pub const NAME: &'static str = "yahoo_finance";
    pub const PRIORITY: u32 = 0;
}

impl<C: PriceHistoryClient> YahooHistoryFetcher<C> {
    pub fn new(client: C) -> Self {
        Self {
            inner: RetryingFetcher::new(client),
        }
    }

    pub fn with_policy(client: C, policy: RetryPolicy) -> Self {
        Self {
            inner: RetryingFetcher::with_policy(client, policy),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.inner = self.inner.with_sleeper(sleeper);
        self
    }

    pub fn client(&self) -> &C {
        self.inner.client()
    }
}

impl<C: PriceHistoryClient> HistoryFetcher for YahooHistoryFetcher<C> {
    fn identify(&self) -> FetcherIdentity {
        FetcherIdentity {
            name: Self::NAME.to_string(),
            priority: Self::PRIORITY,
        }
    }

    fn fetch_history(
        &self,
        raw_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CanonicalTable, PipelineError> {
        let ticker = Ticker::validate(raw_code)?;
        let raw = self.inner.fetch(&ticker, start, end)?;
        Ok(Normalizer::normalize(raw, &ticker)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_not_a_source_failure() {
        let err = PipelineError::from(Ticker::validate("appl3").unwrap_err());
        assert!(!err.is_source_failure());
        assert_eq!(err.to_string(), "invalid ticker symbol: \"appl3\"");
    }
}
