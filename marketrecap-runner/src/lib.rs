//! MarketRecap Runner — daily US market review.
//!
//! This crate builds on `marketrecap-core` to provide:
//! - TOML configuration with defaults for every section
//! - Index overview built from short recent price windows
//! - Best-effort news search with a single adapted result shape
//! - Text generation through an OpenAI-compatible endpoint
//! - Report assembly with a deterministic template fallback

pub mod config;
pub mod generation;
pub mod news;
pub mod overview;
pub mod report;

pub use config::{ConfigError, RecapConfig, TrackedIndex};
pub use generation::{GenerationError, GenerationOptions, OpenAiCompatibleGenerator, TextGenerator};
pub use news::{NewsDigest, NewsItem, NewsQuery, NewsSearch, QueryOutcome, SearchError, TavilySearch};
pub use overview::{MarketIndex, MarketOverview, MarketOverviewBuilder, OverviewError};
pub use report::{build_prompt, fallback_report, MarketRecap, RecapError};
