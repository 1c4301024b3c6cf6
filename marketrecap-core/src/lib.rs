//! MarketRecap Core — ticker validation, price download and normalization.
//!
//! This crate contains the data pipeline:
//! - Ticker validation against a fixed symbol grammar
//! - Provider client contract and a Yahoo Finance chart client
//! - Bounded retry with exponential backoff
//! - Normalization into the canonical daily-bar schema
//! - Fetcher facade and priority-ordered fallback between fetchers

pub mod data;

pub use data::{
    CanonicalRow, CanonicalTable, FetchError, FetcherIdentity, FetcherSet, HistoryFetcher,
    NormalizationError, PipelineError, Ticker, ValidationError, YahooHistoryFetcher,
};
