use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One column of the canonical price table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalColumn {
    Code,
    Date,
    Open,
    High,
    Low,
    Close,
    Volume,
    PctChg,
    Amount,
}

impl CanonicalColumn {
    /// Fixed output order.
    pub const ALL: [Self; 9] = [
        Self::Code,
        Self::Date,
        Self::Open,
        Self::High,
        Self::Low,
        Self::Close,
        Self::Volume,
        Self::PctChg,
        Self::Amount,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Date => "date",
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Volume => "volume",
            Self::PctChg => "pct_chg",
            Self::Amount => "amount",
        }
    }

    /// Provider column names that rename onto this column, most specific first.
    ///
    /// Derived and stamped columns have no source.
    pub const fn source_names(self) -> &'static [&'static str] {
        match self {
            Self::Date => &["Date", "Datetime", "date"],
            Self::Open => &["Open", "open"],
            Self::High => &["High", "high"],
            Self::Low => &["Low", "low"],
            Self::Close => &["Close", "close"],
            Self::Volume => &["Volume", "volume"],
            Self::Code | Self::PctChg | Self::Amount => &[],
        }
    }

    pub fn dtype(self) -> DataType {
        match self {
            Self::Code => DataType::String,
            Self::Date => DataType::Date,
            _ => DataType::Float64,
        }
    }
}

/// Expected schema for normalized price data
pub struct CanonicalSchema;

impl CanonicalSchema {
    /// Full canonical schema, every column present.
    pub fn schema() -> Schema {
        Schema::from_iter(
            CanonicalColumn::ALL
                .iter()
                .map(|c| Field::new(c.name().into(), c.dtype())),
        )
    }

    /// Validate a DataFrame: known columns only, canonical order, canonical
    /// dtypes, and the always-present columns exist.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let mut last_position = None;
        for column in df.get_columns() {
            let name = column.name().as_str();
            let Some(position) = CanonicalColumn::ALL.iter().position(|c| c.name() == name) else {
                return Err(SchemaError::UnexpectedColumn(name.to_string()));
            };
            if last_position.is_some_and(|last| position <= last) {
                return Err(SchemaError::OutOfOrder(name.to_string()));
            }
            last_position = Some(position);

            let expected = CanonicalColumn::ALL[position].dtype();
            if column.dtype() != &expected {
                return Err(SchemaError::TypeMismatch {
                    column: name.to_string(),
                    expected,
                    actual: column.dtype().clone(),
                });
            }
        }

        for required in [
            CanonicalColumn::Code,
            CanonicalColumn::Date,
            CanonicalColumn::Close,
            CanonicalColumn::Volume,
            CanonicalColumn::PctChg,
            CanonicalColumn::Amount,
        ] {
            if df.column(required.name()).is_err() {
                return Err(SchemaError::MissingColumn(required.name().to_string()));
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Unexpected column: {0}")]
    UnexpectedColumn(String),

    #[error("Column {0} is out of canonical order")]
    OutOfOrder(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date_series(days: &[i32]) -> Series {
        Series::new("date".into(), days).cast(&DataType::Date).unwrap()
    }

    #[test]
    fn test_schema_has_all_columns_in_order() {
        let schema = CanonicalSchema::schema();
        let names: Vec<&str> = schema.iter_names().map(|n| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["code", "date", "open", "high", "low", "close", "volume", "pct_chg", "amount"]
        );
    }

    #[test]
    fn test_validate_accepts_subset_without_optional_prices() {
        let df = DataFrame::new(vec![
            Column::from(Series::new("code".into(), &["SPY"])),
            Column::from(date_series(&[19724])),
            Column::from(Series::new("close".into(), &[403.0])),
            Column::from(Series::new("volume".into(), &[1000000.0])),
            Column::from(Series::new("pct_chg".into(), &[0.0])),
            Column::from(Series::new("amount".into(), &[403000000.0])),
        ])
        .unwrap();

        assert!(CanonicalSchema::validate(&df).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_column() {
        let df = DataFrame::new(vec![
            Column::from(Series::new("code".into(), &["SPY"])),
            Column::from(date_series(&[19724])),
            Column::from(Series::new("close".into(), &[403.0])),
        ])
        .unwrap();

        let result = CanonicalSchema::validate(&df);
        assert!(matches!(result.unwrap_err(), SchemaError::MissingColumn(_)));
    }

    #[test]
    fn test_validate_rejects_wrong_type() {
        let df = DataFrame::new(vec![
            Column::from(Series::new("code".into(), &["SPY"])),
            Column::from(date_series(&[19724])),
            Column::from(Series::new("open".into(), &["not_a_number"])),
        ])
        .unwrap();

        let result = CanonicalSchema::validate(&df);
        assert!(matches!(result.unwrap_err(), SchemaError::TypeMismatch { .. }));
    }

    #[test]
    fn test_validate_rejects_reordered_and_foreign_columns() {
        let reordered = DataFrame::new(vec![
            Column::from(date_series(&[19724])),
            Column::from(Series::new("code".into(), &["SPY"])),
        ])
        .unwrap();
        assert!(matches!(
            CanonicalSchema::validate(&reordered).unwrap_err(),
            SchemaError::OutOfOrder(_)
        ));

        let foreign = df!("adj_close" => &[1.0]).unwrap();
        assert!(matches!(
            CanonicalSchema::validate(&foreign).unwrap_err(),
            SchemaError::UnexpectedColumn(_)
        ));
    }

    #[test]
    fn source_names_cover_provider_casing() {
        assert!(CanonicalColumn::Close.source_names().contains(&"Close"));
        assert!(CanonicalColumn::Date.source_names().contains(&"Datetime"));
        assert!(CanonicalColumn::PctChg.source_names().is_empty());
    }
}
