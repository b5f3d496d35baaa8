//! Binance spot-archive loader.
//!
//! Builds vendor-relative paths and download URLs for the Binance public data
//! store (<https://data.binance.vision>) and streams archive files into a
//! local mirror of the vendor's directory layout. The cache policy is
//! presence-based: an existing target file is proof of a prior complete
//! download, so the file body streams into a `.part` sidecar and is renamed
//! onto the final path only once the whole body arrived.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use tracing::{error, info};

use super::loader::{ArchiveLoader, DownloadError, FetchOutcome};
use crate::config::FetchConfig;

/// Root of the Binance public data store.
pub const BASE_URL: &str = "https://data.binance.vision/";

/// Daily archive bundles (one file per calendar day).
pub const PERIOD_DAILY: &str = "daily";

/// Monthly archive bundles (one file per calendar month).
pub const PERIOD_MONTHLY: &str = "monthly";

/// Floor for the streaming read buffer.
const MIN_BUFFER: usize = 4096;

/// Archive loader for the Binance spot market.
pub struct BinanceLoader {
    client: Client,
    base_url: String,
    store_dir: PathBuf,
}

impl BinanceLoader {
    /// Build a loader from resolved configuration.
    ///
    /// The base URL, store directory, and client timeout are fixed here;
    /// nothing is read from the environment afterwards.
    pub fn new(config: &FetchConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: config.base_url.clone(),
            store_dir: config.store_dir.clone(),
        }
    }

    /// Stream `url` into `target`, publishing the file only on success.
    ///
    /// The body is written to `{target}.part` and renamed into place after the
    /// stream ends cleanly. On any failure the sidecar is removed, so a
    /// truncated download never occupies the final path.
    fn stream_to_file(&self, url: &str, target: &Path) -> Result<(), FetchFailure> {
        let resp = self.client.get(url).send().map_err(FetchFailure::other)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(FetchFailure::NotFound);
        }
        let mut resp = resp.error_for_status().map_err(FetchFailure::other)?;

        let total = resp.content_length();
        let tmp = part_path(target);

        match copy_body(&mut resp, &tmp, total) {
            Ok(()) => fs::rename(&tmp, target).map_err(|e| {
                let _ = fs::remove_file(&tmp);
                FetchFailure::other(e)
            }),
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                Err(e)
            }
        }
    }
}

impl ArchiveLoader for BinanceLoader {
    fn relative_path(
        &self,
        market_data_type: &str,
        time_period: &str,
        symbol: &str,
        interval: &str,
    ) -> String {
        let symbol = symbol.to_uppercase();
        let parts = ["spot", time_period, market_data_type, &symbol, interval];
        let mut path = parts.join("/");
        path.push('/');
        path
    }

    fn download_url(&self, relative_file: &str) -> String {
        format!("{}data/{relative_file}", self.base_url)
    }

    fn download_file(
        &self,
        relative_path: &str,
        file_name: &str,
    ) -> Result<FetchOutcome, DownloadError> {
        self.download_file_to(relative_path, file_name, &self.store_dir)
    }

    fn download_file_to(
        &self,
        relative_path: &str,
        file_name: &str,
        folder: &Path,
    ) -> Result<FetchOutcome, DownloadError> {
        let target = folder.join(relative_path).join(file_name);
        let url = self.download_url(&format!("{relative_path}{file_name}"));

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                error!(url = %url, error = %e, "failed to create target directory");
                DownloadError::new(&url, Some(Box::new(e)))
            })?;
        }

        if target.exists() {
            info!(path = %target.display(), "file already cached");
            return Ok(FetchOutcome::AlreadyCached);
        }

        info!(url = %url, "starting download");

        match self.stream_to_file(&url, &target) {
            Ok(()) => {
                info!(path = %target.display(), "download completed");
                Ok(FetchOutcome::Downloaded)
            }
            Err(FetchFailure::NotFound) => {
                error!(url = %url, "file not found");
                Err(DownloadError::new(&url, None))
            }
            Err(FetchFailure::Other(e)) => {
                error!(url = %url, error = %e, "download failed");
                Err(DownloadError::new(&url, Some(e)))
            }
        }
    }

    fn target_path(&self, relative_path: &str, file_name: &str) -> PathBuf {
        self.store_dir.join(relative_path).join(file_name)
    }
}

/// Internal failure triage: "not found" is split out for the log message
/// only; both collapse into the same DownloadError at the boundary.
enum FetchFailure {
    NotFound,
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl FetchFailure {
    fn other(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        FetchFailure::Other(Box::new(e))
    }
}

/// Sidecar path for an in-flight download: `{file_name}.part`.
fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Stream the response body into `tmp`, logging decile progress.
fn copy_body(resp: &mut Response, tmp: &Path, total: Option<u64>) -> Result<(), FetchFailure> {
    let mut out = fs::File::create(tmp).map_err(FetchFailure::other)?;
    let mut buf = vec![0u8; read_buffer_size(total)];
    let mut ticker = ProgressTicker::new(total);

    loop {
        let n = resp.read(&mut buf).map_err(FetchFailure::other)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n]).map_err(FetchFailure::other)?;
        if let Some(percent) = ticker.advance(n as u64) {
            info!(percent, "downloading");
        }
    }

    Ok(())
}

/// Read buffer size: roughly 1% of the declared length so large files report
/// progress about once per percent, floored to avoid pathologically small
/// reads. Unknown length falls back to the floor.
fn read_buffer_size(total: Option<u64>) -> usize {
    match total {
        Some(t) => MIN_BUFFER.max((t / 100) as usize),
        None => MIN_BUFFER,
    }
}

/// Tracks download progress and gates reporting to decile crossings.
///
/// `advance` returns the percentage to report when it has moved at least 10
/// points past the last reported value, at most once per chunk. With an
/// unknown (or zero) total it never reports.
struct ProgressTicker {
    total: Option<u64>,
    downloaded: u64,
    last_percent: u64,
}

impl ProgressTicker {
    fn new(total: Option<u64>) -> Self {
        Self {
            total,
            downloaded: 0,
            last_percent: 0,
        }
    }

    fn advance(&mut self, bytes: u64) -> Option<u64> {
        self.downloaded += bytes;
        let total = self.total?;
        if total == 0 {
            return None;
        }
        let percent = self.downloaded * 100 / total;
        if percent >= self.last_percent + 10 {
            self.last_percent = percent;
            Some(percent)
        } else {
            None
        }
    }
}

// ── Vendor file-naming helpers ──────────────────────────────────────

/// File name of a daily kline archive: `{SYMBOL}-{interval}-{YYYY-MM-DD}.zip`.
pub fn daily_file_name(symbol: &str, interval: &str, date: NaiveDate) -> String {
    format!(
        "{}-{interval}-{}.zip",
        symbol.to_uppercase(),
        date.format("%Y-%m-%d")
    )
}

/// File name of a monthly kline archive: `{SYMBOL}-{interval}-{YYYY-MM}.zip`.
pub fn monthly_file_name(symbol: &str, interval: &str, year: i32, month: u32) -> String {
    format!("{}-{interval}-{year:04}-{month:02}.zip", symbol.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn loader() -> BinanceLoader {
        BinanceLoader::new(&FetchConfig::default())
    }

    #[test]
    fn relative_path_follows_vendor_layout() {
        let path = loader().relative_path("klines", "daily", "btcusdt", "1m");
        assert_eq!(path, "spot/daily/klines/BTCUSDT/1m/");
    }

    #[test]
    fn relative_path_uppercases_symbol_only() {
        let path = loader().relative_path("aggTrades", "monthly", "ethusdt", "1h");
        assert_eq!(path, "spot/monthly/aggTrades/ETHUSDT/1h/");
    }

    #[test]
    fn empty_interval_leaves_a_double_slash() {
        // Interval is required by the contract but never validated; an empty
        // string produces a trailing empty segment, embedded literally.
        let path = loader().relative_path("klines", "daily", "btcusdt", "");
        assert_eq!(path, "spot/daily/klines/BTCUSDT//");
    }

    #[test]
    fn download_url_prepends_base_and_data_segment() {
        let rel = "spot/daily/klines/BTCUSDT/1m/BTCUSDT-1m-2025-02-01.zip";
        let url = loader().download_url(rel);
        assert_eq!(url, format!("{BASE_URL}data/{rel}"));
    }

    #[test]
    fn target_path_mirrors_vendor_layout_under_store_dir() {
        let config = FetchConfig {
            store_dir: PathBuf::from("/srv/archive"),
            ..FetchConfig::default()
        };
        let loader = BinanceLoader::new(&config);
        let target = loader.target_path("spot/daily/klines/BTCUSDT/1m/", "BTCUSDT-1m-2025-02-01.zip");
        assert_eq!(
            target,
            PathBuf::from("/srv/archive/spot/daily/klines/BTCUSDT/1m/BTCUSDT-1m-2025-02-01.zip")
        );
    }

    #[test]
    fn buffer_size_is_floored_at_4096() {
        assert_eq!(read_buffer_size(None), 4096);
        assert_eq!(read_buffer_size(Some(0)), 4096);
        assert_eq!(read_buffer_size(Some(100_000)), 4096);
        assert_eq!(read_buffer_size(Some(409_600)), 4096);
    }

    #[test]
    fn buffer_size_targets_one_percent_of_large_bodies() {
        assert_eq!(read_buffer_size(Some(1_000_000)), 10_000);
        assert_eq!(read_buffer_size(Some(50_000_000)), 500_000);
    }

    #[test]
    fn ticker_reports_each_crossed_decile_once() {
        let total = 1000u64;
        let mut ticker = ProgressTicker::new(Some(total));
        let mut reports = Vec::new();

        for _ in 0..10 {
            if let Some(p) = ticker.advance(100) {
                reports.push(p);
            }
        }

        assert_eq!(reports, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn ticker_skips_intermediate_deciles_on_large_chunks() {
        let mut ticker = ProgressTicker::new(Some(100));
        assert_eq!(ticker.advance(55), Some(55));
        assert_eq!(ticker.advance(5), None);
        assert_eq!(ticker.advance(40), Some(100));
    }

    #[test]
    fn ticker_is_silent_without_a_total() {
        let mut ticker = ProgressTicker::new(None);
        for _ in 0..100 {
            assert_eq!(ticker.advance(4096), None);
        }
    }

    #[test]
    fn ticker_reports_at_least_once_for_any_positive_total() {
        // The read buffer is at least 1% of a known total, so percent always
        // reaches 100 and at most 11 deciles can ever be crossed.
        for total in [1u64, 7, 4096, 123_457, 9_999_999] {
            let chunk = read_buffer_size(Some(total)) as u64;
            let mut ticker = ProgressTicker::new(Some(total));
            let mut remaining = total;
            let mut reports = 0;

            while remaining > 0 {
                let n = chunk.min(remaining);
                if ticker.advance(n).is_some() {
                    reports += 1;
                }
                remaining -= n;
            }

            assert!(reports >= 1, "no report for total {total}");
            assert!(reports <= 11, "{reports} reports for total {total}");
        }
    }

    #[test]
    fn part_path_appends_suffix_to_full_name() {
        let p = part_path(Path::new("/tmp/a/BTCUSDT-1m-2025-02-01.zip"));
        assert_eq!(p, PathBuf::from("/tmp/a/BTCUSDT-1m-2025-02-01.zip.part"));
    }

    #[test]
    fn daily_and_monthly_file_names() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert_eq!(
            daily_file_name("btcusdt", "1m", date),
            "BTCUSDT-1m-2025-02-01.zip"
        );
        assert_eq!(
            monthly_file_name("btcusdt", "1m", 2025, 2),
            "BTCUSDT-1m-2025-02.zip"
        );
    }

    proptest! {
        #[test]
        fn relative_path_shape_holds_for_arbitrary_inputs(
            mdt in "[a-zA-Z]{1,12}",
            period in "(daily|monthly)",
            symbol in "[a-zA-Z0-9]{1,12}",
            interval in "[a-z0-9]{0,4}",
        ) {
            let path = loader().relative_path(&mdt, &period, &symbol, &interval);
            prop_assert!(path.starts_with("spot/"));
            prop_assert!(path.ends_with('/'));
            prop_assert!(path.contains(&symbol.to_uppercase()));
        }
    }
}
