//! Yahoo Finance price history client.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API and returns them as a
//! provider-shaped table: a `Date` index plus `Open/High/Low/Close/Volume`
//! columns. One HTTP request per call; retries live in `RetryingFetcher`.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::provider::{
    HistoryRequest, HistoryWindow, PriceHistoryClient, ProviderError, RawPriceTable,
    UNIX_EPOCH_DAYS_FROM_CE,
};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::Deserialize;
use std::time::Duration;

const CHART_ENDPOINT: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Yahoo Finance v8 chart API response.
///
/// Field names mirror the JSON payload one to one. Quote arrays are parallel
/// to `timestamp` and hold `null` for sessions without a print, so every
/// element is optional.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Column vectors accumulated while walking the chart payload.
#[derive(Debug, Default)]
struct Columns {
    days: Vec<i32>,
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

/// Yahoo Finance chart-API client.
pub struct YahooClient {
    client: reqwest::blocking::Client,
}

impl YahooClient {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Build the chart API URL for a request.
    fn chart_url(request: &HistoryRequest) -> String {
        let symbol = urlencoding::encode(&request.symbol);
        let span = match request.window {
            HistoryWindow::Range { start, end } => {
                format!("period1={}&period2={}", midnight_utc(start), midnight_utc(end))
            }
            HistoryWindow::Recent { days } => format!("range={days}d"),
        };
        format!("{CHART_ENDPOINT}/{symbol}?{span}&interval=1d&includeAdjustedClose=true")
    }

    /// Parse the chart API response into a raw table.
    fn parse_response(request: &HistoryRequest, resp: ChartResponse) -> Result<RawPriceTable, ProviderError> {
        let symbol = &request.symbol;
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    ProviderError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }
                } else {
                    ProviderError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
            } else {
                ProviderError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let Some(data) = result.into_iter().next() else {
            return Ok(RawPriceTable::empty());
        };

        // A range with no trading days comes back without timestamps.
        let Some(timestamps) = data.timestamp else {
            return Ok(RawPriceTable::empty());
        };

        let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut cols = Columns::default();
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| ProviderError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

            let mut open = quote.open.get(i).copied().flatten();
            let mut high = quote.high.get(i).copied().flatten();
            let mut low = quote.low.get(i).copied().flatten();
            let mut close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Skip bars where all OHLCV are None (holidays/non-trading days)
            if open.is_none() && high.is_none() && low.is_none() && close.is_none() && volume.is_none() {
                continue;
            }

            if request.adjusted {
                let adj_close = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());
                if let Some(factor) = adjustment_factor(close, adj_close) {
                    open = open.map(|p| p * factor);
                    high = high.map(|p| p * factor);
                    low = low.map(|p| p * factor);
                    close = close.map(|p| p * factor);
                }
            }

            cols.days.push(date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE);
            cols.open.push(open);
            cols.high.push(high);
            cols.low.push(low);
            cols.close.push(close);
            cols.volume.push(volume);
        }

        if cols.days.is_empty() {
            return Ok(RawPriceTable::empty());
        }

        let index = Series::new("Date".into(), cols.days).cast(&DataType::Date)?;
        let frame = DataFrame::new(vec![
            Column::from(Series::new("Open".into(), cols.open)),
            Column::from(Series::new("High".into(), cols.high)),
            Column::from(Series::new("Low".into(), cols.low)),
            Column::from(Series::new("Close".into(), cols.close)),
            Column::from(Series::new("Volume".into(), cols.volume)),
        ])?;
        Ok(RawPriceTable::with_index(index, frame))
    }
}

impl PriceHistoryClient for YahooClient {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn download(&self, request: &HistoryRequest) -> Result<RawPriceTable, ProviderError> {
        let url = Self::chart_url(request);
        let symbol = &request.symbol;

        let resp = self.client.get(&url).send().map_err(|e| {
            if e.is_timeout() {
                ProviderError::NetworkUnreachable(format!("request timed out for {symbol}: {e}"))
            } else {
                ProviderError::NetworkUnreachable(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ProviderError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::AuthenticationRequired(format!(
                "Yahoo Finance refused the request (HTTP {status})"
            )));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                symbol: symbol.to_string(),
            });
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            ProviderError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;
        Self::parse_response(request, chart)
    }
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Ratio that maps raw prices onto the split/dividend adjusted close.
fn adjustment_factor(close: Option<f64>, adj_close: Option<f64>) -> Option<f64> {
    match (close, adj_close) {
        (Some(c), Some(a)) if c != 0.0 && c.is_finite() && a.is_finite() => Some(a / c),
        _ => None,
    }
}
