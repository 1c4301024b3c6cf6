//! MarketRecap CLI — price history and daily market recap commands.
//!
//! Commands:
//! - `fetch`: download, validate and normalize daily bars for one ticker
//! - `recap`: build the US market overview and print the daily recap

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use marketrecap_core::data::{
    CanonicalColumn, CanonicalRow, CanonicalTable, HistoryFetcher, YahooClient, YahooHistoryFetcher,
};
use marketrecap_runner::{MarketRecap, RecapConfig};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "marketrecap",
    about = "MarketRecap CLI — daily price history and US market recap"
)]
struct Cli {
    /// Log filter (e.g. `debug`, `marketrecap_core=debug`). Overrides the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch normalized daily bars for one ticker.
    Fetch {
        /// Ticker symbol (e.g., AAPL, BRK.B).
        ticker: String,

        /// Start date (YYYY-MM-DD). Defaults to one year ago.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD), exclusive. Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Path to a TOML config file (retry and provider settings).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the daily US market recap.
    Recap {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Skip the news search.
        #[arg(long, default_value_t = false)]
        no_news: bool,

        /// Print the index overview as JSON instead of the report.
        #[arg(long, default_value_t = false)]
        overview_only: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            ticker,
            start,
            end,
            format,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            init_logging(cli.log_level.as_deref(), &config);
            run_fetch(&ticker, start.as_deref(), end.as_deref(), format, &config)
        }
        Commands::Recap {
            config,
            no_news,
            overview_only,
        } => {
            let config = load_config(config.as_deref())?;
            init_logging(cli.log_level.as_deref(), &config);
            run_recap(&config, no_news, overview_only)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RecapConfig> {
    match path {
        Some(path) => RecapConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(RecapConfig::default()),
    }
}

/// `RUST_LOG` wins; otherwise `--log-level`, then the config's level.
fn init_logging(cli_level: Option<&str>, config: &RecapConfig) {
    let level = cli_level.unwrap_or(&config.log.level);
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
}

fn parse_date(value: Option<&str>, default: NaiveDate) -> Result<NaiveDate> {
    value
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date {s:?}")))
        .transpose()
        .map(|d| d.unwrap_or(default))
}

fn run_fetch(
    ticker: &str,
    start: Option<&str>,
    end: Option<&str>,
    format: OutputFormat,
    config: &RecapConfig,
) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let start_date = parse_date(start, today - chrono::Duration::days(365))?;
    let end_date = parse_date(end, today)?;

    let client = YahooClient::new(Duration::from_secs(config.provider.timeout_secs))?;
    let fetcher = YahooHistoryFetcher::with_policy(client, config.retry.policy());
    let table = fetcher.fetch_history(ticker, start_date, end_date)?;

    let mut out = std::io::stdout().lock();
    match format {
        OutputFormat::Table => print_table(&mut out, &table)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, table.rows())?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(out, &table)?,
    }
    Ok(())
}

fn run_recap(config: &RecapConfig, no_news: bool, overview_only: bool) -> Result<()> {
    let mut recap = MarketRecap::from_config(config)?;
    if no_news {
        recap = recap.without_news();
    }

    if overview_only {
        let overview = recap.market_overview();
        println!("{}", serde_json::to_string_pretty(&overview)?);
    } else {
        println!("{}", recap.run_daily_review());
    }
    Ok(())
}

fn cell(row: &CanonicalRow, column: CanonicalColumn) -> String {
    let price = |v: Option<f64>| v.map(|v| format!("{v:.4}")).unwrap_or_default();
    match column {
        CanonicalColumn::Code => row.code.clone(),
        CanonicalColumn::Date => row.date.to_string(),
        CanonicalColumn::Open => price(row.open),
        CanonicalColumn::High => price(row.high),
        CanonicalColumn::Low => price(row.low),
        CanonicalColumn::Close => format!("{:.4}", row.close),
        CanonicalColumn::Volume => format!("{:.0}", row.volume),
        CanonicalColumn::PctChg => format!("{:.2}", row.pct_chg),
        CanonicalColumn::Amount => format!("{:.2}", row.amount),
    }
}

fn print_table(out: &mut impl Write, table: &CanonicalTable) -> Result<()> {
    let columns = table.columns();
    let cells: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| columns.iter().map(|&c| cell(row, c)).collect())
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].len())
                .chain(std::iter::once(c.name().len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:>w$}", c.name(), w = *w))
        .collect();
    writeln!(out, "{}", header.join("  "))?;
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{v:>w$}", w = *w))
            .collect();
        writeln!(out, "{}", line.join("  "))?;
    }
    writeln!(out, "{} rows", cells.len())?;
    Ok(())
}

fn write_csv(out: impl Write, table: &CanonicalTable) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(table.columns().iter().map(|c| c.name()))?;
    for row in table.rows() {
        writer.write_record(table.columns().iter().map(|&c| cell(row, c)))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn recap_flags_parse() {
        let cli = Cli::try_parse_from(["marketrecap", "--log-level", "debug", "recap", "--no-news"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(
            cli.command,
            Commands::Recap {
                no_news: true,
                overview_only: false,
                ..
            }
        ));
    }

    #[test]
    fn dates_default_and_reject_garbage() {
        let default = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(parse_date(None, default).unwrap(), default);
        assert_eq!(
            parse_date(Some("2023-06-30"), default).unwrap(),
            NaiveDate::from_ymd_opt(2023, 6, 30).unwrap()
        );
        assert!(parse_date(Some("06/30/2023"), default).is_err());
    }
}
