//! Price data acquisition and normalization

pub mod fetcher;
pub mod normalize;
pub mod provider;
pub mod retry;
pub mod schema;
pub mod selection;
pub mod ticker;
pub mod yahoo;

pub use fetcher::{FetcherIdentity, HistoryFetcher, PipelineError, YahooHistoryFetcher};
pub use normalize::{pct_change, CanonicalRow, CanonicalTable, NormalizationError, Normalizer};
pub use provider::{HistoryRequest, HistoryWindow, PriceHistoryClient, ProviderError, RawPriceTable};
pub use retry::{FetchError, RetryPolicy, RetryingFetcher, Sleeper, ThreadSleeper};
pub use schema::{CanonicalColumn, CanonicalSchema, SchemaError};
pub use selection::{FetcherSet, FetcherSetError, SelectedHistory};
pub use ticker::{Ticker, ValidationError};
pub use yahoo::YahooClient;
