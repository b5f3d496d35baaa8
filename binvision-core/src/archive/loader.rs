//! Loader capability trait, the domain error, and progress callbacks.
//!
//! The ArchiveLoader trait abstracts over vendor archive layouts so additional
//! vendors can be added later without touching callers. There is exactly one
//! implementation today (Binance spot) and exactly one error kind: callers
//! cannot distinguish a missing remote file from a transient network failure,
//! only the log message does.

use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// The single failure kind surfaced by a download.
///
/// Covers remote not-found responses and every other network/IO failure
/// alike. The underlying error, when there is one, is preserved as the
/// source for diagnostic chaining.
#[derive(Debug, Error)]
#[error("download failed for {url}")]
pub struct DownloadError {
    url: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl DownloadError {
    pub(crate) fn new(
        url: impl Into<String>,
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            url: url.into(),
            source,
        }
    }

    /// The URL whose download failed.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// How a successful fetch concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The file was streamed from the remote archive and written locally.
    Downloaded,
    /// The file was already present locally; no network request was made.
    AlreadyCached,
}

/// Trait for vendor archive loaders.
///
/// Implementations own their base URL, store directory, and HTTP client;
/// callers only describe the file they want.
pub trait ArchiveLoader {
    /// Vendor-relative directory for a data file, with a trailing slash.
    ///
    /// The symbol is uppercased; every other segment is embedded verbatim,
    /// unvalidated. Callers are responsible for values that exist in the
    /// vendor's archive.
    fn relative_path(
        &self,
        market_data_type: &str,
        time_period: &str,
        symbol: &str,
        interval: &str,
    ) -> String;

    /// Absolute download URL for a relative path + file name.
    ///
    /// Pure string composition, no escaping: inputs must already be URL-safe.
    fn download_url(&self, relative_file: &str) -> String;

    /// Fetch a file into the configured store directory.
    ///
    /// Returns `AlreadyCached` without touching the network when the target
    /// file exists.
    fn download_file(
        &self,
        relative_path: &str,
        file_name: &str,
    ) -> Result<FetchOutcome, DownloadError>;

    /// Fetch a file into an explicit target folder.
    fn download_file_to(
        &self,
        relative_path: &str,
        file_name: &str,
        folder: &Path,
    ) -> Result<FetchOutcome, DownloadError>;

    /// Absolute local path a fetch of this file would produce.
    fn target_path(&self, relative_path: &str, file_name: &str) -> PathBuf;
}

/// Progress callback for multi-file operations.
pub trait FetchProgress {
    /// Called before each file is fetched.
    fn on_start(&self, file_name: &str, index: usize, total: usize);

    /// Called when a file fetch completes.
    fn on_complete(
        &self,
        file_name: &str,
        index: usize,
        total: usize,
        result: &Result<FetchOutcome, DownloadError>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, downloaded: usize, cached: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_start(&self, file_name: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {file_name}...", index + 1, total);
    }

    fn on_complete(
        &self,
        file_name: &str,
        _index: usize,
        _total: usize,
        result: &Result<FetchOutcome, DownloadError>,
    ) {
        match result {
            Ok(FetchOutcome::Downloaded) => println!("  OK: {file_name}"),
            Ok(FetchOutcome::AlreadyCached) => println!("  CACHED: {file_name}"),
            Err(e) => println!("  FAIL: {file_name}: {e}"),
        }
    }

    fn on_batch_complete(&self, downloaded: usize, cached: usize, failed: usize, total: usize) {
        println!(
            "\nFetch complete: {downloaded} downloaded, {cached} already cached, \
             {failed} failed ({total} total)"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_error_exposes_url_and_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset");
        let err = DownloadError::new("https://example.test/data/x.zip", Some(Box::new(io)));

        assert_eq!(err.url(), "https://example.test/data/x.zip");
        assert!(err.to_string().contains("https://example.test/data/x.zip"));
        assert!(err.source().is_some());
    }

    #[test]
    fn download_error_without_cause_has_no_source() {
        let err = DownloadError::new("https://example.test/data/x.zip", None);
        assert!(err.source().is_none());
    }
}
