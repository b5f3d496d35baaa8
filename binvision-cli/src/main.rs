//! BinVision CLI — mirror Binance public-archive files into a local store.
//!
//! Commands:
//! - `fetch` — download archives for a symbol over a date range, skipping
//!   files already present locally
//! - `url` — print the download URL for one archive
//! - `path` — print the vendor-relative directory for a descriptor

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use binvision_core::archive::binance::{daily_file_name, monthly_file_name};
use binvision_core::archive::{fetch_many, ArchiveRequest, StdoutProgress};
use binvision_core::{ArchiveLoader, BinanceLoader, FetchConfig};

#[derive(Parser)]
#[command(
    name = "binvision",
    about = "BinVision CLI — Binance public data archive fetcher"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download archives for a symbol over a date range.
    Fetch {
        /// Trading symbol (e.g. BTCUSDT; case-insensitive).
        symbol: String,

        /// Market data type as named by the vendor (klines, aggTrades, trades).
        #[arg(long, default_value = "klines")]
        market_data_type: String,

        /// Archive granularity: one file per day or per month.
        #[arg(long, value_enum, default_value = "daily")]
        period: Period,

        /// Kline interval (e.g. 1m, 1h, 1d).
        #[arg(long, default_value = "1d")]
        interval: String,

        /// First date (YYYY-MM-DD). Defaults to the end date.
        #[arg(long)]
        start: Option<String>,

        /// Last date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Store directory. Overrides the config file.
        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Archive base URL. Overrides the config file.
        #[arg(long)]
        base_url: Option<String>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the download URL for one archive.
    Url {
        /// Trading symbol (e.g. BTCUSDT; case-insensitive).
        symbol: String,

        /// Archive date: YYYY-MM-DD (daily) or YYYY-MM (monthly).
        date: String,

        /// Market data type as named by the vendor.
        #[arg(long, default_value = "klines")]
        market_data_type: String,

        /// Archive granularity.
        #[arg(long, value_enum, default_value = "daily")]
        period: Period,

        /// Kline interval.
        #[arg(long, default_value = "1d")]
        interval: String,

        /// Archive base URL. Overrides the config file.
        #[arg(long)]
        base_url: Option<String>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the vendor-relative directory for a descriptor.
    Path {
        /// Trading symbol (e.g. BTCUSDT; case-insensitive).
        symbol: String,

        /// Market data type as named by the vendor.
        #[arg(long, default_value = "klines")]
        market_data_type: String,

        /// Archive granularity.
        #[arg(long, value_enum, default_value = "daily")]
        period: Period,

        /// Kline interval.
        #[arg(long, default_value = "1d")]
        interval: String,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Period {
    Daily,
    Monthly,
}

impl Period {
    fn as_str(self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Monthly => "monthly",
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            symbol,
            market_data_type,
            period,
            interval,
            start,
            end,
            store_dir,
            base_url,
            config,
        } => run_fetch(
            symbol,
            market_data_type,
            period,
            interval,
            start,
            end,
            store_dir,
            base_url,
            config,
        ),
        Commands::Url {
            symbol,
            date,
            market_data_type,
            period,
            interval,
            base_url,
            config,
        } => {
            let loader = BinanceLoader::new(&load_config(config, None, base_url)?);
            let rel = loader.relative_path(&market_data_type, period.as_str(), &symbol, &interval);
            let file_name = file_name_for(&symbol, &interval, period, parse_date(&date)?);
            println!("{}", loader.download_url(&format!("{rel}{file_name}")));
            Ok(())
        }
        Commands::Path {
            symbol,
            market_data_type,
            period,
            interval,
            config,
        } => {
            let loader = BinanceLoader::new(&load_config(config, None, None)?);
            println!(
                "{}",
                loader.relative_path(&market_data_type, period.as_str(), &symbol, &interval)
            );
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_fetch(
    symbol: String,
    market_data_type: String,
    period: Period,
    interval: String,
    start: Option<String>,
    end: Option<String>,
    store_dir: Option<PathBuf>,
    base_url: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path, store_dir, base_url)?;

    // Resolve the store directory once, up front.
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    config.store_dir = config.resolved_store_dir(&cwd);

    let end_date = match end {
        Some(s) => parse_date(&s)?,
        None => chrono::Local::now().date_naive(),
    };
    let start_date = match start {
        Some(s) => parse_date(&s)?,
        None => end_date,
    };
    if start_date > end_date {
        anyhow::bail!("start date {start_date} is after end date {end_date}");
    }

    let loader = BinanceLoader::new(&config);
    let rel = loader.relative_path(&market_data_type, period.as_str(), &symbol, &interval);

    let requests: Vec<ArchiveRequest> = match period {
        Period::Daily => day_span(start_date, end_date)
            .into_iter()
            .map(|d| ArchiveRequest::new(rel.clone(), daily_file_name(&symbol, &interval, d)))
            .collect(),
        Period::Monthly => month_span(start_date, end_date)
            .into_iter()
            .map(|(y, m)| ArchiveRequest::new(rel.clone(), monthly_file_name(&symbol, &interval, y, m)))
            .collect(),
    };

    let summary = fetch_many(&loader, &requests, &StdoutProgress);

    if !summary.all_succeeded() {
        for (file, err) in &summary.errors {
            eprintln!("Error for {file}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Config file (or defaults) with command-line overrides applied.
///
/// Shared by every subcommand so `url` and `path` preview exactly what
/// `fetch` would do with the same flags.
fn load_config(
    config_path: Option<PathBuf>,
    store_dir: Option<PathBuf>,
    base_url: Option<String>,
) -> Result<FetchConfig> {
    let mut config = match config_path {
        Some(path) => FetchConfig::from_toml_file(&path)?,
        None => FetchConfig::default(),
    };
    if let Some(dir) = store_dir {
        config.store_dir = dir;
    }
    if let Some(url) = base_url {
        config.base_url = url;
    }
    Ok(config)
}

fn file_name_for(symbol: &str, interval: &str, period: Period, date: NaiveDate) -> String {
    match period {
        Period::Daily => daily_file_name(symbol, interval, date),
        Period::Monthly => monthly_file_name(symbol, interval, date.year(), date.month()),
    }
}

/// Parse `YYYY-MM-DD`, accepting bare `YYYY-MM` as the first of the month.
fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d"))
        .with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD or YYYY-MM)"))
}

/// Every calendar day from `start` to `end`, inclusive.
fn day_span(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = start;
    while day <= end {
        days.push(day);
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    days
}

/// Every (year, month) from `start`'s month to `end`'s month, inclusive.
fn month_span(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    let (mut year, mut month) = (start.year(), start.month());
    while (year, month) <= (end.year(), end.month()) {
        months.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    months
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn day_span_is_inclusive() {
        let days = day_span(date("2025-02-27"), date("2025-03-02"));
        assert_eq!(
            days,
            vec![
                date("2025-02-27"),
                date("2025-02-28"),
                date("2025-03-01"),
                date("2025-03-02"),
            ]
        );
    }

    #[test]
    fn month_span_crosses_year_boundaries() {
        let months = month_span(date("2024-11-15"), date("2025-02-03"));
        assert_eq!(months, vec![(2024, 11), (2024, 12), (2025, 1), (2025, 2)]);
    }

    #[test]
    fn load_config_applies_flag_overrides_over_file() {
        let path = std::env::temp_dir().join(format!(
            "binvision_cli_config_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "base_url = \"https://mirror.example/\"\n").unwrap();

        // File alone.
        let config = load_config(Some(path.clone()), None, None).unwrap();
        assert_eq!(config.base_url, "https://mirror.example/");

        // Flags win over the file; store dir override is applied too.
        let config = load_config(
            Some(path.clone()),
            Some(PathBuf::from("/srv/archive")),
            Some("http://localhost:9000/".to_string()),
        )
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:9000/");
        assert_eq!(config.store_dir, PathBuf::from("/srv/archive"));

        let _ = std::fs::remove_file(&path);

        // No file, no flags: defaults.
        let config = load_config(None, None, None).unwrap();
        assert_eq!(config, FetchConfig::default());
    }

    #[test]
    fn parse_date_accepts_month_precision() {
        assert_eq!(parse_date("2025-02-01").unwrap(), date("2025-02-01"));
        assert_eq!(parse_date("2025-02").unwrap(), date("2025-02-01"));
        assert!(parse_date("february").is_err());
    }
}
