//! Priority-ordered fallback across several history fetchers.

use super::fetcher::{FetcherIdentity, HistoryFetcher, PipelineError};
use super::normalize::CanonicalTable;
use chrono::NaiveDate;
use log::{info, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetcherSetError {
    #[error("no history fetcher registered")]
    Empty,

    #[error("{source_name}: {error}")]
    Failed {
        source_name: String,
        #[source]
        error: PipelineError,
    },
}

impl FetcherSetError {
    /// The pipeline error of the last source tried, if any was.
    pub fn pipeline_error(&self) -> Option<&PipelineError> {
        match self {
            Self::Empty => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}

/// Successful fetch plus the source that produced it.
#[derive(Debug)]
pub struct SelectedHistory {
    pub table: CanonicalTable,
    pub source: FetcherIdentity,
    /// Names of every source tried, in order, the successful one last.
    pub source_chain: Vec<String>,
}

/// Fetchers ranked by ascending priority. Ties keep registration order.
#[derive(Default)]
pub struct FetcherSet {
    fetchers: Vec<(FetcherIdentity, Box<dyn HistoryFetcher>)>,
}

impl FetcherSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, fetcher: Box<dyn HistoryFetcher>) {
        let identity = fetcher.identify();
        self.fetchers.push((identity, fetcher));
        // stable sort keeps registration order for equal priorities
        self.fetchers.sort_by_key(|(identity, _)| identity.priority);
    }

    pub fn with(mut self, fetcher: Box<dyn HistoryFetcher>) -> Self {
        self.register(fetcher);
        self
    }

    /// Identities in the order they will be tried.
    pub fn identities(&self) -> Vec<FetcherIdentity> {
        self.fetchers.iter().map(|(identity, _)| identity.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }

    /// Try each fetcher in priority order and return the first success.
    ///
    /// A validation failure stops immediately since no other source would
    /// accept the same code. Otherwise the last source's error is returned.
    pub fn fetch_history(
        &self,
        raw_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SelectedHistory, FetcherSetError> {
        let mut source_chain = Vec::with_capacity(self.fetchers.len());
        let mut last_error = None;

        for (identity, fetcher) in &self.fetchers {
            source_chain.push(identity.name.clone());
            match fetcher.fetch_history(raw_code, start, end) {
                Ok(table) => {
                    info!("[{}] fetched {} rows for {raw_code}", identity.name, table.len());
                    return Ok(SelectedHistory {
                        table,
                        source: identity.clone(),
                        source_chain,
                    });
                }
                Err(error) if !error.is_source_failure() => {
                    return Err(FetcherSetError::Failed {
                        source_name: identity.name.clone(),
                        error,
                    });
                }
                Err(error) => {
                    warn!("[{}] failed for {raw_code}: {error}; trying next source", identity.name);
                    last_error = Some((identity.name.clone(), error));
                }
            }
        }

        match last_error {
            Some((source_name, error)) => Err(FetcherSetError::Failed { source_name, error }),
            None => Err(FetcherSetError::Empty),
        }
    }
}
