//! Provider table -> canonical price rows.
//!
//! Steps, in order:
//! 1. move any date index into an explicit column
//! 2. rename provider columns onto canonical lowercase names
//! 3. parse dates into calendar dates and order rows by date
//! 4. derive `pct_chg` from consecutive closes (first row is 0.0)
//! 5. derive `amount = volume * close`
//! 6. stamp `code` with the canonical ticker
//! 7. project onto the canonical column set, dropping everything else
//!
//! `open`, `high` and `low` are optional and simply absent from the output
//! when the provider omits them. `date`, `close` and `volume` are required,
//! and a null in any of them fails normalization.
//! The output depends only on the input table.

use super::provider::{RawPriceTable, UNIX_EPOCH_DAYS_FROM_CE};
use super::schema::CanonicalColumn;
use super::ticker::Ticker;
use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("cannot normalize {ticker}: price table is empty")]
    Empty { ticker: String },

    #[error("cannot normalize {ticker}: missing required column '{column}'")]
    MissingColumn { ticker: String, column: &'static str },

    #[error("cannot normalize {ticker}: invalid date at row {row}")]
    InvalidDate { ticker: String, row: usize },

    #[error("cannot normalize {ticker}: null '{column}' at row {row}")]
    NullValue {
        ticker: String,
        column: &'static str,
        row: usize,
    },

    #[error("cannot normalize {ticker}: unsupported date type {dtype}")]
    UnsupportedDateType { ticker: String, dtype: String },

    #[error("table error: {0}")]
    Frame(#[from] PolarsError),
}

/// One normalized daily bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
    pub code: String,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: f64,
    pub pct_chg: f64,
    pub amount: f64,
}

/// Normalized rows plus the set of columns actually present.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTable {
    columns: Vec<CanonicalColumn>,
    rows: Vec<CanonicalRow>,
}

impl CanonicalTable {
    /// Present columns, in canonical order.
    pub fn columns(&self) -> &[CanonicalColumn] {
        &self.columns
    }

    pub fn has_column(&self, column: CanonicalColumn) -> bool {
        self.columns.contains(&column)
    }

    pub fn rows(&self) -> &[CanonicalRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<CanonicalRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Build a polars frame holding exactly the present columns, in order.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let mut columns = Vec::with_capacity(self.columns.len());
        for &column in &self.columns {
            let name: PlSmallStr = column.name().into();
            let series = match column {
                CanonicalColumn::Code => {
                    Series::new(name, self.rows.iter().map(|r| r.code.as_str()).collect::<Vec<_>>())
                }
                CanonicalColumn::Date => {
                    let days: Vec<i32> = self
                        .rows
                        .iter()
                        .map(|r| r.date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
                        .collect();
                    Series::new(name, days).cast(&DataType::Date)?
                }
                CanonicalColumn::Open => Series::new(name, self.optional(|r| r.open)),
                CanonicalColumn::High => Series::new(name, self.optional(|r| r.high)),
                CanonicalColumn::Low => Series::new(name, self.optional(|r| r.low)),
                CanonicalColumn::Close => Series::new(name, self.required(|r| r.close)),
                CanonicalColumn::Volume => Series::new(name, self.required(|r| r.volume)),
                CanonicalColumn::PctChg => Series::new(name, self.required(|r| r.pct_chg)),
                CanonicalColumn::Amount => Series::new(name, self.required(|r| r.amount)),
            };
            columns.push(Column::from(series));
        }
        DataFrame::new(columns)
    }

    fn optional(&self, f: impl Fn(&CanonicalRow) -> Option<f64>) -> Vec<Option<f64>> {
        self.rows.iter().map(f).collect()
    }

    fn required(&self, f: impl Fn(&CanonicalRow) -> f64) -> Vec<f64> {
        self.rows.iter().map(f).collect()
    }
}

/// Percent change of `close` against `prev`, rounded to 2 decimals with
/// ties to even.
///
/// Undefined changes (no predecessor, null or zero predecessor) are 0.0.
pub fn pct_change(prev: Option<f64>, close: Option<f64>) -> f64 {
    match (prev, close) {
        (Some(prev), Some(close)) => {
            let pct = (close / prev - 1.0) * 100.0;
            if pct.is_finite() {
                round2(pct)
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Normalizer for provider price tables
pub struct Normalizer;

impl Normalizer {
    pub fn normalize(raw: RawPriceTable, ticker: &Ticker) -> Result<CanonicalTable, NormalizationError> {
        let code = ticker.to_string();
        if raw.is_empty() {
            return Err(NormalizationError::Empty { ticker: code });
        }

        let df = raw.reset_index()?;
        log_dropped_columns(&df, &code);

        let Some(date_col) = source_column(&df, CanonicalColumn::Date) else {
            return Err(NormalizationError::MissingColumn {
                ticker: code,
                column: CanonicalColumn::Date.name(),
            });
        };
        let dates = parse_dates(date_col, &code)?;

        let close = required_f64(&df, CanonicalColumn::Close, &code)?;
        let volume = required_f64(&df, CanonicalColumn::Volume, &code)?;
        let open = optional_f64(&df, CanonicalColumn::Open, &code)?;
        let high = optional_f64(&df, CanonicalColumn::High, &code)?;
        let low = optional_f64(&df, CanonicalColumn::Low, &code)?;

        let mut order: Vec<usize> = (0..dates.len()).collect();
        order.sort_by_key(|&i| dates[i]);

        let mut rows = Vec::with_capacity(order.len());
        let mut prev_close = None;
        for &i in &order {
            let close_value = required_value(&close, i, CanonicalColumn::Close, &code)?;
            let volume_value = required_value(&volume, i, CanonicalColumn::Volume, &code)?;
            let pct_chg = pct_change(prev_close, Some(close_value));
            prev_close = Some(close_value);

            rows.push(CanonicalRow {
                code: code.clone(),
                date: dates[i],
                open: open.as_ref().and_then(|v| v[i]),
                high: high.as_ref().and_then(|v| v[i]),
                low: low.as_ref().and_then(|v| v[i]),
                close: close_value,
                volume: volume_value,
                pct_chg,
                amount: volume_value * close_value,
            });
        }

        let columns = CanonicalColumn::ALL
            .into_iter()
            .filter(|c| match c {
                CanonicalColumn::Open => open.is_some(),
                CanonicalColumn::High => high.is_some(),
                CanonicalColumn::Low => low.is_some(),
                _ => true,
            })
            .collect();

        Ok(CanonicalTable { columns, rows })
    }
}

/// First frame column that renames onto `canonical`.
fn source_column(df: &DataFrame, canonical: CanonicalColumn) -> Option<&Column> {
    canonical
        .source_names()
        .iter()
        .find_map(|name| df.column(name).ok())
}

fn column_f64(column: &Column) -> PolarsResult<Vec<Option<f64>>> {
    let values = column.cast(&DataType::Float64)?;
    let values: Vec<Option<f64>> = values.f64()?.into_iter().collect();
    Ok(values)
}

fn required_f64(
    df: &DataFrame,
    canonical: CanonicalColumn,
    ticker: &str,
) -> Result<Vec<Option<f64>>, NormalizationError> {
    match source_column(df, canonical) {
        Some(column) => Ok(column_f64(column)?),
        None => {
            warn!(
                "[normalize] {ticker}: source column '{}' is missing, pct_chg/amount cannot be derived",
                canonical.name()
            );
            Err(NormalizationError::MissingColumn {
                ticker: ticker.to_string(),
                column: canonical.name(),
            })
        }
    }
}

/// Non-null value of a required column at `row`.
fn required_value(
    values: &[Option<f64>],
    row: usize,
    canonical: CanonicalColumn,
    ticker: &str,
) -> Result<f64, NormalizationError> {
    values[row].ok_or_else(|| {
        warn!("[normalize] {ticker}: null '{}' at row {row}", canonical.name());
        NormalizationError::NullValue {
            ticker: ticker.to_string(),
            column: canonical.name(),
            row,
        }
    })
}

fn optional_f64(
    df: &DataFrame,
    canonical: CanonicalColumn,
    ticker: &str,
) -> Result<Option<Vec<Option<f64>>>, NormalizationError> {
    match source_column(df, canonical) {
        Some(column) => Ok(Some(column_f64(column)?)),
        None => {
            debug!("[normalize] {ticker}: no '{}' column, omitting it", canonical.name());
            Ok(None)
        }
    }
}

fn log_dropped_columns(df: &DataFrame, ticker: &str) {
    let dropped: Vec<&str> = df
        .get_column_names()
        .into_iter()
        .map(|n| n.as_str())
        .filter(|name| {
            !CanonicalColumn::ALL
                .iter()
                .any(|c| c.source_names().iter().any(|s| s == name))
        })
        .collect();
    if !dropped.is_empty() {
        debug!("[normalize] {ticker}: dropping non-canonical columns {dropped:?}");
    }
}

fn parse_dates(column: &Column, ticker: &str) -> Result<Vec<NaiveDate>, NormalizationError> {
    let invalid = |row| NormalizationError::InvalidDate {
        ticker: ticker.to_string(),
        row,
    };

    match column.dtype() {
        DataType::Date => {
            let days = column.cast(&DataType::Int32)?;
            let dates = days
                .i32()?
                .into_iter()
                .enumerate()
                .map(|(row, d)| d.and_then(date_from_epoch_days).ok_or_else(|| invalid(row)))
                .collect();
            dates
        }
        DataType::Datetime(unit, _) => {
            let per_second: i64 = match unit {
                TimeUnit::Nanoseconds => 1_000_000_000,
                TimeUnit::Microseconds => 1_000_000,
                TimeUnit::Milliseconds => 1_000,
            };
            let ticks = column.cast(&DataType::Int64)?;
            let dates = ticks
                .i64()?
                .into_iter()
                .enumerate()
                .map(|(row, t)| {
                    t.and_then(|t| chrono::DateTime::from_timestamp(t.div_euclid(per_second), 0))
                        .map(|dt| dt.date_naive())
                        .ok_or_else(|| invalid(row))
                })
                .collect();
            dates
        }
        DataType::String => column
            .str()?
            .into_iter()
            .enumerate()
            .map(|(row, s)| s.and_then(parse_date_prefix).ok_or_else(|| invalid(row)))
            .collect(),
        other => Err(NormalizationError::UnsupportedDateType {
            ticker: ticker.to_string(),
            dtype: other.to_string(),
        }),
    }
}

fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// Parse `YYYY-MM-DD`, ignoring any time-of-day suffix.
fn parse_date_prefix(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let prefix = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker() -> Ticker {
        Ticker::validate("SPY").unwrap()
    }

    #[test]
    fn pct_change_rules() {
        assert_eq!(pct_change(Some(100.0), Some(110.0)), 10.0);
        assert_eq!(pct_change(Some(110.0), Some(99.0)), -10.0);
        assert_eq!(pct_change(Some(3.0), Some(4.0)), 33.33);
        assert_eq!(pct_change(None, Some(4.0)), 0.0);
        assert_eq!(pct_change(Some(0.0), Some(4.0)), 0.0);
        assert_eq!(pct_change(Some(4.0), None), 0.0);
    }

    #[test]
    fn pct_change_rounds_ties_to_even() {
        assert_eq!(pct_change(Some(8.0), Some(8.25)), 3.12);
        assert_eq!(pct_change(Some(8.0), Some(8.75)), 9.38);
        assert_eq!(pct_change(Some(16.0), Some(15.5)), -3.12);
    }

    #[test]
    fn null_close_is_rejected() {
        let frame = df!(
            "Date" => &["2024-01-02", "2024-01-03", "2024-01-04"],
            "Close" => &[Some(100.0), None, Some(99.0)],
            "Volume" => &[1.0, 1.0, 1.0]
        )
        .unwrap();
        let err = Normalizer::normalize(RawPriceTable::new(frame), &ticker()).unwrap_err();
        assert!(matches!(
            err,
            NormalizationError::NullValue { column: "close", row: 1, .. }
        ));
    }

    #[test]
    fn null_volume_is_rejected() {
        let frame = df!(
            "Date" => &["2024-01-02", "2024-01-03", "2024-01-04"],
            "Close" => &[100.0, 101.0, 99.0],
            "Volume" => &[Some(1.0), Some(1.0), None]
        )
        .unwrap();
        let err = Normalizer::normalize(RawPriceTable::new(frame), &ticker()).unwrap_err();
        assert!(matches!(
            err,
            NormalizationError::NullValue { column: "volume", row: 2, .. }
        ));
    }

    #[test]
    fn null_row_is_reported_by_source_position() {
        let frame = df!(
            "Date" => &["2024-01-04", "2024-01-02"],
            "Close" => &[Some(99.0), None],
            "Volume" => &[1.0, 1.0]
        )
        .unwrap();
        let err = Normalizer::normalize(RawPriceTable::new(frame), &ticker()).unwrap_err();
        assert!(matches!(err, NormalizationError::NullValue { row: 1, .. }));
    }

    #[test]
    fn parses_date_prefixes() {
        assert_eq!(
            parse_date_prefix("2024-01-02 00:00:00"),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
        assert_eq!(parse_date_prefix("2024-01-02"), NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(parse_date_prefix("01/02/2024"), None);
    }

    #[test]
    fn epoch_days_round_trip_through_chrono() {
        assert_eq!(date_from_epoch_days(0), NaiveDate::from_ymd_opt(1970, 1, 1));
        assert_eq!(date_from_epoch_days(19724), NaiveDate::from_ymd_opt(2024, 1, 2));
    }

    #[test]
    fn datetime_index_is_truncated_to_calendar_date() {
        let ms = Series::new("Date".into(), &[1704205800000i64, 1704292200000])
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        let frame = df!("Close" => &[1.0, 2.0], "Volume" => &[5.0, 5.0]).unwrap();
        let table = Normalizer::normalize(RawPriceTable::with_index(ms, frame), &ticker()).unwrap();
        let dates: Vec<NaiveDate> = table.rows().iter().map(|r| r.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
            ]
        );
    }

    #[test]
    fn unsupported_date_dtype_is_rejected() {
        let frame = df!("Date" => &[true, false], "Close" => &[1.0, 2.0], "Volume" => &[5.0, 5.0]).unwrap();
        let err = Normalizer::normalize(RawPriceTable::new(frame), &ticker()).unwrap_err();
        assert!(matches!(err, NormalizationError::UnsupportedDateType { .. }));
    }

    #[test]
    fn null_date_is_invalid() {
        let frame = df!(
            "Date" => &[Some("2024-01-02"), None],
            "Close" => &[1.0, 2.0],
            "Volume" => &[5.0, 5.0]
        )
        .unwrap();
        let err = Normalizer::normalize(RawPriceTable::new(frame), &ticker()).unwrap_err();
        assert!(matches!(err, NormalizationError::InvalidDate { row: 1, .. }));
    }

    #[test]
    fn rows_are_ordered_by_date_before_deriving() {
        let frame = df!(
            "Date" => &["2024-01-03", "2024-01-02"],
            "Close" => &[110.0, 100.0],
            "Volume" => &[1.0, 1.0]
        )
        .unwrap();
        let table = Normalizer::normalize(RawPriceTable::new(frame), &ticker()).unwrap();
        let pct: Vec<f64> = table.rows().iter().map(|r| r.pct_chg).collect();
        assert_eq!(pct, vec![0.0, 10.0]);
        assert_eq!(table.rows()[0].close, 100.0);
    }
}
