//! Integration tests for the daily review path with stubbed collaborators.

use chrono::NaiveDate;
use marketrecap_core::data::{
    HistoryRequest, HistoryWindow, PriceHistoryClient, ProviderError, RawPriceTable,
};
use marketrecap_runner::{
    GenerationError, GenerationOptions, MarketOverviewBuilder, MarketRecap, NewsItem, NewsQuery,
    NewsSearch, QueryOutcome, RecapConfig, SearchError, TextGenerator,
};
use polars::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Stubs ────────────────────────────────────────────────────────────

/// Returns fixed closes per symbol; symbols in `failing` error out.
struct IndexStub {
    closes: HashMap<String, Vec<f64>>,
    failing: Vec<String>,
    requests: Mutex<Vec<HistoryRequest>>,
}

impl IndexStub {
    fn new(closes: Vec<(&str, Vec<f64>)>, failing: &[&str]) -> Self {
        Self {
            closes: closes
                .into_iter()
                .map(|(code, c)| (code.to_string(), c))
                .collect(),
            failing: failing.iter().map(|s| s.to_string()).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl PriceHistoryClient for IndexStub {
    fn name(&self) -> &str {
        "index-stub"
    }

    fn download(&self, request: &HistoryRequest) -> Result<RawPriceTable, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing.contains(&request.symbol) {
            return Err(ProviderError::NetworkUnreachable("stub outage".into()));
        }
        let closes = self.closes.get(&request.symbol).cloned().unwrap_or_default();
        let volumes = vec![0.0; closes.len()];
        let opens: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 2.0).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 3.0).collect();
        let frame = df!(
            "Open" => opens,
            "High" => highs,
            "Low" => lows,
            "Close" => closes,
            "Volume" => volumes
        )?;
        Ok(RawPriceTable::new(frame))
    }
}

struct StubSearch {
    fail_on: Option<String>,
    calls: AtomicUsize,
}

impl NewsSearch for StubSearch {
    fn name(&self) -> &str {
        "stub-search"
    }

    fn search(&self, query: &NewsQuery) -> Result<Vec<NewsItem>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = query.text();
        if self.fail_on.as_deref() == Some(text.as_str()) {
            return Err(SearchError::Request("timeout".into()));
        }
        Ok(vec![NewsItem::titled(format!("headline for {text}"))])
    }
}

struct StubGenerator {
    available: bool,
    fail: bool,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl TextGenerator for StubGenerator {
    fn is_available(&self) -> bool {
        self.available
    }

    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        assert_eq!(options.max_output_tokens, 1500);
        if self.fail {
            Err(GenerationError::Status {
                status: 500,
                body: "boom".into(),
            })
        } else {
            Ok("## Generated recap".into())
        }
    }
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 8).unwrap()
}

fn four_indices(failing: &[&str]) -> Arc<IndexStub> {
    Arc::new(IndexStub::new(
        vec![
            ("^GSPC", vec![5000.0, 5050.0]),
            ("^IXIC", vec![16000.0, 15840.0]),
            ("^DJI", vec![39000.0, 39000.0]),
            ("^VIX", vec![15.0]),
        ],
        failing,
    ))
}

fn recap(client: Arc<IndexStub>) -> MarketRecap {
    MarketRecap::new(client, &RecapConfig::default())
}

// ── Overview ─────────────────────────────────────────────────────────

#[test]
fn one_failing_index_is_omitted_and_order_kept() {
    let client = four_indices(&["^IXIC"]);
    let builder = MarketOverviewBuilder::new(client.clone(), RecapConfig::default().indices, 2);

    let overview = builder.build(as_of());

    let codes: Vec<&str> = overview.indices.iter().map(|i| i.code.as_str()).collect();
    assert_eq!(codes, vec!["^GSPC", "^DJI", "^VIX"]);
    assert_eq!(overview.date, as_of());

    let requests = client.requests.lock().unwrap();
    assert_eq!(requests.len(), 4);
    assert!(requests
        .iter()
        .all(|r| r.window == HistoryWindow::Recent { days: 2 }));
}

#[test]
fn changes_come_from_the_last_two_bars() {
    let overview = MarketOverviewBuilder::new(four_indices(&[]), RecapConfig::default().indices, 2)
        .build(as_of());

    let spx = &overview.indices[0];
    assert_eq!(spx.current, 5050.0);
    assert_eq!(spx.prev_close, 5000.0);
    assert_eq!(spx.change, 50.0);
    assert!((spx.change_pct - 1.0).abs() < 1e-12);
    assert_eq!(spx.open, 5049.0);
    assert_eq!(spx.high, 5052.0);
    assert_eq!(spx.low, 5047.0);

    let nasdaq = &overview.indices[1];
    assert!((nasdaq.change_pct + 1.0).abs() < 1e-12);

    // single bar: today doubles as previous
    let vix = &overview.indices[3];
    assert_eq!(vix.current, 15.0);
    assert_eq!(vix.prev_close, 15.0);
    assert_eq!(vix.change, 0.0);
    assert_eq!(vix.change_pct, 0.0);
}

#[test]
fn empty_history_omits_the_index() {
    let client = Arc::new(IndexStub::new(vec![("^GSPC", vec![1.0, 2.0])], &[]));
    let overview =
        MarketOverviewBuilder::new(client, RecapConfig::default().indices, 2).build(as_of());
    assert_eq!(overview.indices.len(), 1);
    assert_eq!(overview.indices[0].code, "^GSPC");
}

// ── News ─────────────────────────────────────────────────────────────

#[test]
fn failing_news_query_is_recorded_not_raised() {
    let search = StubSearch {
        fail_on: Some("Wall Street market recap".into()),
        calls: AtomicUsize::new(0),
    };
    let recap = recap(four_indices(&[])).with_search(Box::new(search));

    let digest = recap.search_market_news();

    assert_eq!(digest.items.len(), 2);
    assert_eq!(digest.failed_queries(), 1);
    assert_eq!(digest.outcomes[0].1, QueryOutcome::Found(1));
    assert!(matches!(digest.outcomes[1].1, QueryOutcome::Failed(_)));
    assert_eq!(
        digest.items[1].title.as_deref(),
        Some("headline for NASDAQ S&P500 market analysis")
    );
}

#[test]
fn no_search_backend_means_no_news() {
    assert!(recap(four_indices(&[])).search_market_news().is_empty());
}

// ── Report ───────────────────────────────────────────────────────────

#[test]
fn unavailable_generator_falls_back_to_template() {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let recap = recap(four_indices(&["^DJI"])).with_generator(Box::new(StubGenerator {
        available: false,
        fail: false,
        prompts: prompts.clone(),
    }));

    let report = recap.run_daily_review_for(as_of());

    assert_eq!(
        report,
        "### US Market Recap (2024-03-08)\n\
         - S&P 500: 5050.00 (+1.00%)\n\
         - NASDAQ Composite: 15840.00 (-1.00%)\n\
         - VIX Volatility: 15.00 (+0.00%)"
    );
    assert!(prompts.lock().unwrap().is_empty());
}

#[test]
fn generator_error_falls_back_to_template() {
    let recap = recap(four_indices(&[])).with_generator(Box::new(StubGenerator {
        available: true,
        fail: true,
        prompts: Arc::new(Mutex::new(Vec::new())),
    }));

    let report = recap.run_daily_review_for(as_of());
    assert!(report.starts_with("### US Market Recap (2024-03-08)"));
}

#[test]
fn available_generator_receives_indices_and_news() {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let recap = recap(four_indices(&[]))
        .with_search(Box::new(StubSearch {
            fail_on: None,
            calls: AtomicUsize::new(0),
        }))
        .with_generator(Box::new(StubGenerator {
            available: true,
            fail: false,
            prompts: prompts.clone(),
        }));

    let report = recap.run_daily_review_for(as_of());

    assert_eq!(report, "## Generated recap");
    let prompts = prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Market Date: 2024-03-08"));
    assert!(prompts[0].contains("- Dow Jones: 39000.00 (+0.00%)"));
    assert!(prompts[0].contains("headline for US stock market news today"));
}
