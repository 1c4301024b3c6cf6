//! Daily review: overview + news -> recap text.

use crate::config::{NewsConfig, RecapConfig};
use crate::generation::{GenerationError, GenerationOptions, OpenAiCompatibleGenerator, TextGenerator};
use crate::news::{NewsDigest, NewsSearch, TavilySearch};
use crate::overview::{MarketOverview, MarketOverviewBuilder};
use chrono::{Local, NaiveDate};
use log::{info, warn};
use marketrecap_core::data::{PriceHistoryClient, ProviderError, YahooClient};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecapError {
    #[error("price provider setup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("text generator setup failed: {0}")]
    Generation(#[from] GenerationError),
}

/// `- {name}: {current} ({change_pct}%)` per index, newline separated.
pub fn index_lines(overview: &MarketOverview) -> String {
    overview
        .indices
        .iter()
        .map(|i| format!("- {}: {:.2} ({:+.2}%)", i.name, i.current, i.change_pct))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The first `prompt_items` news titles, each cut to `title_chars`.
pub fn news_lines(digest: &NewsDigest, config: &NewsConfig) -> String {
    digest
        .items
        .iter()
        .take(config.prompt_items)
        .map(|item| item.short_title(config.title_chars))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(overview: &MarketOverview, digest: &NewsDigest, config: &NewsConfig) -> String {
    format!(
        "\nYou are a professional US stock market analyst.\n\n\
         Market Date: {date}\n\n\
         Indices:\n{indices}\n\n\
         News:\n{news}\n\n\
         Write a concise US market recap in Markdown.\n",
        date = overview.date,
        indices = index_lines(overview),
        news = news_lines(digest, config),
    )
}

/// Deterministic recap used when no narrative can be generated.
pub fn fallback_report(overview: &MarketOverview) -> String {
    format!("### US Market Recap ({})\n{}", overview.date, index_lines(overview))
}

/// Orchestrates the daily review.
pub struct MarketRecap {
    overview: MarketOverviewBuilder<Arc<dyn PriceHistoryClient>>,
    search: Option<Box<dyn NewsSearch>>,
    generator: Option<Box<dyn TextGenerator>>,
    news: NewsConfig,
    options: GenerationOptions,
}

impl MarketRecap {
    pub fn new(client: Arc<dyn PriceHistoryClient>, config: &RecapConfig) -> Self {
        Self {
            overview: MarketOverviewBuilder::new(
                client,
                config.indices.clone(),
                config.provider.overview_window_days,
            ),
            search: None,
            generator: None,
            news: config.news.clone(),
            options: GenerationOptions::from(&config.generation),
        }
    }

    /// Wire the bundled Yahoo, Tavily and OpenAI-compatible backends.
    ///
    /// News search is skipped when disabled or when its API key is unset.
    pub fn from_config(config: &RecapConfig) -> Result<Self, RecapError> {
        let timeout = Duration::from_secs(config.provider.timeout_secs);
        let client: Arc<dyn PriceHistoryClient> = Arc::new(YahooClient::new(timeout)?);
        let mut recap = Self::new(client, config);

        if config.news.enabled {
            match TavilySearch::from_env(&config.news.api_key_env, timeout) {
                Some(Ok(search)) => recap = recap.with_search(Box::new(search)),
                Some(Err(e)) => warn!("[recap] news search disabled: {e}"),
                None => info!("[recap] {} not set, skipping news search", config.news.api_key_env),
            }
        }

        let generator = OpenAiCompatibleGenerator::from_config(&config.generation)?;
        Ok(recap.with_generator(Box::new(generator)))
    }

    pub fn with_search(mut self, search: Box<dyn NewsSearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_generator(mut self, generator: Box<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn without_news(mut self) -> Self {
        self.search = None;
        self
    }

    pub fn market_overview(&self) -> MarketOverview {
        self.overview.overview()
    }

    pub fn overview_for(&self, as_of: NaiveDate) -> MarketOverview {
        self.overview.build(as_of)
    }

    pub fn search_market_news(&self) -> NewsDigest {
        match &self.search {
            Some(search) => NewsDigest::collect(search.as_ref(), &self.news),
            None => NewsDigest::default(),
        }
    }

    /// Generated narrative, or the template when generation is unavailable
    /// or fails.
    pub fn generate_report(&self, overview: &MarketOverview, digest: &NewsDigest) -> String {
        let Some(generator) = self.generator.as_deref().filter(|g| g.is_available()) else {
            info!("[recap] text generation unavailable, using template report");
            return fallback_report(overview);
        };

        let prompt = build_prompt(overview, digest, &self.news);
        match generator.generate(&prompt, &self.options) {
            Ok(text) => text,
            Err(e) => {
                warn!("[recap] text generation failed, using template report: {e}");
                fallback_report(overview)
            }
        }
    }

    pub fn run_daily_review(&self) -> String {
        self.run_daily_review_for(Local::now().date_naive())
    }

    pub fn run_daily_review_for(&self, as_of: NaiveDate) -> String {
        info!("========== US market daily review: start ==========");
        let overview = self.overview_for(as_of);
        let digest = self.search_market_news();
        if digest.failed_queries() > 0 {
            warn!("[recap] {} news queries failed", digest.failed_queries());
        }
        let report = self.generate_report(&overview, &digest);
        info!(
            "========== US market daily review: done ({} indices, {} news items) ==========",
            overview.indices.len(),
            digest.items.len()
        );
        report
    }
}
