//! BinVision Core — fetcher for the Binance public data archive.
//!
//! This crate contains the file-acquisition machinery:
//! - Loader capability trait (path building, URL building, cache-aware download)
//! - Binance spot-archive implementation over blocking HTTP
//! - Batch orchestrator with progress callbacks
//! - TOML configuration (base URL, store directory, client timeout)
//!
//! Downloads are idempotent: a file already present under the store directory
//! is never re-fetched, and failed downloads never leave a file at the final
//! target path.

pub mod archive;
pub mod config;

pub use archive::{ArchiveLoader, BinanceLoader, DownloadError, FetchOutcome};
pub use config::FetchConfig;
