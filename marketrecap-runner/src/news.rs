//! Best-effort market news search.
//!
//! Search backends return loosely shaped hits. They are adapted into
//! [`NewsItem`] at the boundary so the report only deals with one shape.
//! A failing query is recorded as [`QueryOutcome::Failed`] and contributes no
//! items; it never fails the digest.

use crate::config::NewsConfig;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search backend unavailable: {0}")]
    Unavailable(String),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("unexpected search response: {0}")]
    Response(String),
}

/// Query context handed to the search backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub subject_code: String,
    pub subject_name: String,
    pub max_results: usize,
    pub keywords: Vec<String>,
}

impl NewsQuery {
    /// Query for one configured search phrase; keywords are its words.
    pub fn from_phrase(config: &NewsConfig, phrase: &str) -> Self {
        Self {
            subject_code: config.subject_code.clone(),
            subject_name: config.subject_name.clone(),
            max_results: config.max_results,
            keywords: phrase.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn text(&self) -> String {
        self.keywords.join(" ")
    }
}

/// One search hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: Option<String>,
    pub url: Option<String>,
    pub snippet: Option<String>,
}

impl NewsItem {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Adapt a raw hit. Objects contribute `title`, `url` and
    /// `content`/`snippet`; a bare string is taken as the title.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(title) => Some(Self::titled(title.as_str())),
            Value::Object(map) => {
                let field = |keys: &[&str]| {
                    keys.iter()
                        .find_map(|k| map.get(*k).and_then(Value::as_str))
                        .map(str::to_string)
                };
                Some(Self {
                    title: field(&["title"]),
                    url: field(&["url", "link"]),
                    snippet: field(&["content", "snippet", "description"]),
                })
            }
            _ => None,
        }
    }

    /// Title cut to at most `max_chars` characters, or empty when untitled.
    pub fn short_title(&self, max_chars: usize) -> String {
        self.title
            .as_deref()
            .map(|t| t.chars().take(max_chars).collect())
            .unwrap_or_default()
    }
}

/// Trait for news search backends.
pub trait NewsSearch: Send + Sync {
    fn name(&self) -> &str;

    fn search(&self, query: &NewsQuery) -> Result<Vec<NewsItem>, SearchError>;
}

/// Result of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Found(usize),
    Empty,
    Failed(String),
}

/// Items gathered across all queries, in query order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsDigest {
    pub items: Vec<NewsItem>,
    /// `(query text, outcome)` per configured query.
    pub outcomes: Vec<(String, QueryOutcome)>,
}

impl NewsDigest {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn failed_queries(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, QueryOutcome::Failed(_)))
            .count()
    }

    /// Run every configured query against `search`.
    pub fn collect(search: &dyn NewsSearch, config: &NewsConfig) -> Self {
        let mut digest = Self::default();
        for phrase in &config.queries {
            let query = NewsQuery::from_phrase(config, phrase);
            let outcome = match search.search(&query) {
                Ok(items) if items.is_empty() => QueryOutcome::Empty,
                Ok(items) => {
                    let found = items.len();
                    digest.items.extend(items);
                    QueryOutcome::Found(found)
                }
                Err(e) => {
                    warn!("[news] {} query {phrase:?} failed: {e}", search.name());
                    QueryOutcome::Failed(e.to_string())
                }
            };
            debug!("[news] {phrase:?}: {outcome:?}");
            digest.outcomes.push((phrase.clone(), outcome));
        }
        digest
    }
}

/// Tavily search API backend.
pub struct TavilySearch {
    client: reqwest::blocking::Client,
    api_key: String,
    endpoint: String,
}

impl TavilySearch {
    pub const ENDPOINT: &'static str = "https://api.tavily.com/search";

    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, SearchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: Self::ENDPOINT.to_string(),
        })
    }

    /// Build from the API key in the environment variable `key_env`.
    ///
    /// Returns `None` when the variable is unset or blank.
    pub fn from_env(key_env: &str, timeout: Duration) -> Option<Result<Self, SearchError>> {
        let key = std::env::var(key_env).ok().filter(|k| !k.trim().is_empty())?;
        Some(Self::new(key, timeout))
    }

    fn request_body(&self, query: &NewsQuery) -> Value {
        serde_json::json!({
            "api_key": self.api_key,
            "query": format!("{} {}", query.subject_name, query.text()),
            "topic": "news",
            "max_results": query.max_results,
        })
    }
}

impl NewsSearch for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    fn search(&self, query: &NewsQuery) -> Result<Vec<NewsItem>, SearchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.request_body(query))
            .send()
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Request(format!("HTTP {}", status.as_u16())));
        }

        let body: Value = response
            .json()
            .map_err(|e| SearchError::Response(e.to_string()))?;
        parse_results(&body, query.max_results)
    }
}

/// Pull hits out of a `{"results": [...]}` response.
fn parse_results(body: &Value, max_results: usize) -> Result<Vec<NewsItem>, SearchError> {
    let results = body
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::Response("missing 'results' array".into()))?;
    Ok(results
        .iter()
        .filter_map(NewsItem::from_value)
        .take(max_results)
        .collect())
}
