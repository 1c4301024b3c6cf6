//! Index snapshot collection.
//!
//! Each configured index is fetched independently over a short recent window.
//! A failing index is logged and left out; the overview itself never fails.

use crate::config::TrackedIndex;
use chrono::{Local, NaiveDate};
use log::{info, warn};
use marketrecap_core::data::{HistoryRequest, PriceHistoryClient, ProviderError, RawPriceTable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why one index was left out of the overview.
#[derive(Debug, Error)]
pub enum OverviewError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("no bars returned for {code}")]
    Empty { code: String },

    #[error("{code}: column '{column}' missing or null on the latest bar")]
    MissingValue { code: String, column: &'static str },
}

/// Latest movement of one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIndex {
    pub code: String,
    pub name: String,
    pub current: f64,
    pub change: f64,
    pub change_pct: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub prev_close: f64,
}

impl MarketIndex {
    /// Snapshot from a `today` bar and the previous close.
    pub fn from_bars(tracked: &TrackedIndex, today: Bar, prev_close: f64) -> Self {
        let change = today.close - prev_close;
        let change_pct = if prev_close != 0.0 { change / prev_close * 100.0 } else { 0.0 };
        Self {
            code: tracked.code.clone(),
            name: tracked.name.clone(),
            current: today.close,
            change,
            change_pct,
            open: today.open,
            high: today.high,
            low: today.low,
            prev_close,
        }
    }
}

/// One daily bar as needed for the snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Dated snapshot of the configured indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    pub date: NaiveDate,
    /// Successfully fetched indices, in configured order.
    pub indices: Vec<MarketIndex>,
}

pub struct MarketOverviewBuilder<C> {
    client: C,
    indices: Vec<TrackedIndex>,
    window_days: u32,
}

impl<C: PriceHistoryClient> MarketOverviewBuilder<C> {
    pub fn new(client: C, indices: Vec<TrackedIndex>, window_days: u32) -> Self {
        Self {
            client,
            indices,
            window_days: window_days.max(1),
        }
    }

    pub fn indices(&self) -> &[TrackedIndex] {
        &self.indices
    }

    /// Overview stamped with today's local date.
    pub fn overview(&self) -> MarketOverview {
        self.build(Local::now().date_naive())
    }

    pub fn build(&self, as_of: NaiveDate) -> MarketOverview {
        info!("[overview] fetching {} indices", self.indices.len());
        let indices = self
            .indices
            .iter()
            .filter_map(|tracked| match self.snapshot(tracked) {
                Ok(index) => Some(index),
                Err(e) => {
                    warn!("[overview] skipping {} ({}): {e}", tracked.name, tracked.code);
                    None
                }
            })
            .collect();
        MarketOverview { date: as_of, indices }
    }

    /// Fetch and summarize a single index.
    pub fn snapshot(&self, tracked: &TrackedIndex) -> Result<MarketIndex, OverviewError> {
        let request = HistoryRequest::recent(tracked.code.as_str(), self.window_days);
        let table = self.client.download(&request)?;
        if table.is_empty() {
            return Err(OverviewError::Empty {
                code: tracked.code.clone(),
            });
        }

        let last = table.height() - 1;
        let today = Bar {
            open: value_at(&table, tracked, "Open", last)?,
            high: value_at(&table, tracked, "High", last)?,
            low: value_at(&table, tracked, "Low", last)?,
            close: value_at(&table, tracked, "Close", last)?,
        };
        // a single bar stands in as its own predecessor
        let prev_close = if last > 0 {
            value_at(&table, tracked, "Close", last - 1)?
        } else {
            today.close
        };
        Ok(MarketIndex::from_bars(tracked, today, prev_close))
    }
}

fn value_at(
    table: &RawPriceTable,
    tracked: &TrackedIndex,
    column: &'static str,
    row: usize,
) -> Result<f64, OverviewError> {
    let lower = column.to_ascii_lowercase();
    table
        .f64_column(&[column, lower.as_str()])
        .map_err(ProviderError::from)?
        .and_then(|values| values.get(row).copied().flatten())
        .ok_or_else(|| OverviewError::MissingValue {
            code: tracked.code.clone(),
            column,
        })
}
