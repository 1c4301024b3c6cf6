//! Ticker validation.
//!
//! A ticker is 1-6 ASCII letters, optionally followed by a dot and a 1-2 letter
//! share-class suffix (`AAPL`, `SPY`, `BRK.B`). Input is matched
//! case-insensitively after trimming; the canonical form is uppercase.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;
use thiserror::Error;

static TICKER_GRAMMAR: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Z]{1,6}(\.[A-Z]{1,2})?$").expect("ticker grammar is a valid regex")
});

/// Malformed ticker. Raised before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid ticker symbol: {input:?}")]
pub struct ValidationError {
    /// The caller's input exactly as given (untrimmed).
    pub input: String,
}

/// Validated, canonical (uppercase) ticker symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Trim, uppercase and match against the ticker grammar.
    pub fn validate(raw: &str) -> Result<Self, ValidationError> {
        let code = raw.trim().to_ascii_uppercase();
        if TICKER_GRAMMAR.is_match(&code) {
            Ok(Self(code))
        } else {
            Err(ValidationError {
                input: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Ticker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Ticker {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::validate(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::validate(&value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}
