//! Recap configuration loaded from TOML.
//!
//! Every section is optional; a missing file section falls back to the
//! defaults below, so an empty document is a valid configuration.

use marketrecap_core::data::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One index tracked by the overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedIndex {
    /// Provider symbol (`^GSPC`).
    pub code: String,
    /// Display name (`S&P 500`).
    pub name: String,
}

impl TrackedIndex {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Top-level configuration for the daily review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecapConfig {
    /// Tracked indices, in report order.
    pub indices: Vec<TrackedIndex>,
    pub retry: RetryConfig,
    pub news: NewsConfig,
    pub generation: GenerationConfig,
    pub provider: ProviderConfig,
    pub log: LogConfig,
}

impl Default for RecapConfig {
    fn default() -> Self {
        Self {
            indices: vec![
                TrackedIndex::new("^GSPC", "S&P 500"),
                TrackedIndex::new("^IXIC", "NASDAQ Composite"),
                TrackedIndex::new("^DJI", "Dow Jones"),
                TrackedIndex::new("^VIX", "VIX Volatility"),
            ],
            retry: RetryConfig::default(),
            news: NewsConfig::default(),
            generation: GenerationConfig::default(),
            provider: ProviderConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl RecapConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(format!("serialize config: {e}")))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indices.is_empty() {
            return Err(ConfigError::Invalid("at least one index is required".into()));
        }
        if let Some(blank) = self.indices.iter().find(|i| i.code.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("index '{}' has an empty code", blank.name)));
        }
        self.retry.validate()?;
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::Invalid(format!(
                "generation.temperature must be within [0, 2], got {}",
                self.generation.temperature
            )));
        }
        if self.provider.overview_window_days == 0 {
            return Err(ConfigError::Invalid("provider.overview_window_days must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub min_wait_secs: f64,
    pub max_wait_secs: f64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_wait_secs: 2.0,
            max_wait_secs: 10.0,
            multiplier: 1.0,
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts < 1 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if !(self.min_wait_secs.is_finite() && self.min_wait_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "retry.min_wait_secs must be positive, got {}",
                self.min_wait_secs
            )));
        }
        if !(self.max_wait_secs.is_finite() && self.max_wait_secs >= self.min_wait_secs) {
            return Err(ConfigError::Invalid(format!(
                "retry.max_wait_secs ({}) must be >= min_wait_secs ({})",
                self.max_wait_secs, self.min_wait_secs
            )));
        }
        if !(self.multiplier.is_finite() && self.multiplier > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "retry.multiplier must be positive, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }

    /// Backoff policy for the fetch pipeline. Call after validation.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            min_wait: Duration::from_secs_f64(self.min_wait_secs),
            max_wait: Duration::from_secs_f64(self.max_wait_secs),
            multiplier: self.multiplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub enabled: bool,
    pub queries: Vec<String>,
    /// Results requested per query.
    pub max_results: usize,
    pub subject_code: String,
    pub subject_name: String,
    /// News titles included in the prompt.
    pub prompt_items: usize,
    /// Titles are cut to this many characters.
    pub title_chars: usize,
    /// Environment variable holding the search API key.
    pub api_key_env: String,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queries: vec![
                "US stock market news today".into(),
                "Wall Street market recap".into(),
                "NASDAQ S&P500 market analysis".into(),
            ],
            max_results: 3,
            subject_code: "market".into(),
            subject_name: "US Market".into(),
            prompt_items: 5,
            title_chars: 60,
            api_key_env: "TAVILY_API_KEY".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// OpenAI-compatible API root, without the `/chat/completions` suffix.
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            temperature: 0.7,
            max_output_tokens: 1500,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub timeout_secs: u64,
    /// Calendar days requested per index for the overview.
    pub overview_window_days: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            overview_window_days: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `env_logger` filter, e.g. `info` or `marketrecap_core=debug`.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}
