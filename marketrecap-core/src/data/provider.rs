//! Data provider client contract and the raw table it returns.
//!
//! The `PriceHistoryClient` trait abstracts over the remote price source
//! (Yahoo Finance today) so the retry layer and the normalizer can be exercised
//! against stubs in tests.

use chrono::NaiveDate;
use polars::prelude::*;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Days from 0001-01-01 (CE) to 1970-01-01.
pub(crate) const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Which span of daily bars to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryWindow {
    /// Explicit calendar range. `end` is exclusive.
    Range { start: NaiveDate, end: NaiveDate },
    /// The most recent `days` calendar days, ending today.
    Recent { days: u32 },
}

impl Display for HistoryWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Range { start, end } => write!(f, "{start} -> {end}"),
            Self::Recent { days } => write!(f, "last {days}d"),
        }
    }
}

/// One request against the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    /// Provider-native symbol (`AAPL`, `^GSPC`).
    pub symbol: String,
    pub window: HistoryWindow,
    /// Split/dividend adjusted prices.
    pub adjusted: bool,
    /// Show a progress indicator while downloading.
    pub progress: bool,
}

impl HistoryRequest {
    /// Adjusted daily bars over `start..end`, no progress reporting.
    pub fn range(symbol: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            window: HistoryWindow::Range { start, end },
            adjusted: true,
            progress: false,
        }
    }

    /// Adjusted daily bars for the last `days` calendar days.
    pub fn recent(symbol: impl Into<String>, days: u32) -> Self {
        Self {
            symbol: symbol.into(),
            window: HistoryWindow::Recent { days },
            adjusted: true,
            progress: false,
        }
    }
}

/// Failure of a single provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("HTTP {status} for {symbol}")]
    HttpStatus { status: u16, symbol: String },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("provider returned no data for {symbol}")]
    NoData { symbol: String },

    #[error("failed to build price table: {0}")]
    Table(#[from] PolarsError),
}

/// Provider-native price table for one symbol.
///
/// Column names are whatever the provider uses (`Open`, `Close`, ...). The
/// date may live in a separate index series rather than in the frame itself,
/// which is how Yahoo-shaped results arrive.
#[derive(Debug, Clone)]
pub struct RawPriceTable {
    index: Option<Series>,
    frame: DataFrame,
}

impl RawPriceTable {
    /// A table whose dates (if any) are ordinary columns.
    pub fn new(frame: DataFrame) -> Self {
        Self { index: None, frame }
    }

    /// A table keyed by a separate date index.
    pub fn with_index(index: Series, frame: DataFrame) -> Self {
        Self {
            index: Some(index),
            frame,
        }
    }

    pub fn empty() -> Self {
        Self::new(DataFrame::empty())
    }

    pub fn index(&self) -> Option<&Series> {
        self.index.as_ref()
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Number of rows (bars).
    pub fn height(&self) -> usize {
        match &self.index {
            Some(index) if self.frame.width() == 0 => index.len(),
            _ => self.frame.height(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    /// Move the date index (if any) into the frame as its first column.
    pub fn reset_index(self) -> PolarsResult<DataFrame> {
        let Some(index) = self.index else {
            return Ok(self.frame);
        };
        let mut columns = Vec::with_capacity(self.frame.width() + 1);
        columns.push(Column::from(index));
        columns.extend(self.frame.get_columns().iter().cloned());
        DataFrame::new(columns)
    }

    /// First column matching one of `names`, cast to f64.
    ///
    /// Returns `Ok(None)` when no such column exists.
    pub fn f64_column(&self, names: &[&str]) -> PolarsResult<Option<Vec<Option<f64>>>> {
        for name in names {
            if let Ok(column) = self.frame.column(name) {
                let values = column.cast(&DataType::Float64)?;
                let values: Vec<Option<f64>> = values.f64()?.into_iter().collect();
                return Ok(Some(values));
            }
        }
        Ok(None)
    }
}

/// Trait for remote price history sources.
///
/// Implementations perform exactly one network call per `download`; retrying
/// is layered on top by `RetryingFetcher`.
pub trait PriceHistoryClient: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily OHLCV bars. An empty table is a valid return here; callers
    /// decide whether empty is a failure.
    fn download(&self, request: &HistoryRequest) -> Result<RawPriceTable, ProviderError>;
}

impl<C: PriceHistoryClient + ?Sized> PriceHistoryClient for &C {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn download(&self, request: &HistoryRequest) -> Result<RawPriceTable, ProviderError> {
        (**self).download(request)
    }
}

impl<C: PriceHistoryClient + ?Sized> PriceHistoryClient for std::sync::Arc<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn download(&self, request: &HistoryRequest) -> Result<RawPriceTable, ProviderError> {
        (**self).download(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_request_is_adjusted_without_progress() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let req = HistoryRequest::range("AAPL", start, end);
        assert!(req.adjusted);
        assert!(!req.progress);
        assert_eq!(req.window.to_string(), "2024-01-01 -> 2024-02-01");
    }

    #[test]
    fn reset_index_prepends_date_column() {
        let index = Series::new("Date".into(), &["2024-01-02", "2024-01-03"]);
        let frame = df!("Close" => &[1.0, 2.0]).unwrap();
        let table = RawPriceTable::with_index(index, frame);
        assert_eq!(table.height(), 2);

        let df = table.reset_index().unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["Date", "Close"]);
    }

    #[test]
    fn empty_table_reports_empty() {
        assert!(RawPriceTable::empty().is_empty());
        let frame = df!("Close" => Vec::<f64>::new()).unwrap();
        assert!(RawPriceTable::new(frame).is_empty());
    }

    #[test]
    fn f64_column_casts_integers_and_falls_back_through_names() {
        let frame = df!("volume" => &[10i64, 20]).unwrap();
        let table = RawPriceTable::new(frame);
        let values = table.f64_column(&["Volume", "volume"]).unwrap().unwrap();
        assert_eq!(values, vec![Some(10.0), Some(20.0)]);
        assert!(table.f64_column(&["Close"]).unwrap().is_none());
    }
}
