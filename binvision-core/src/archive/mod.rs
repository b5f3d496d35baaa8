//! Archive acquisition: loader trait, Binance implementation, batch download.

pub mod batch;
pub mod binance;
pub mod loader;

pub use batch::{fetch_many, ArchiveRequest, FetchSummary};
pub use binance::{BinanceLoader, BASE_URL};
pub use loader::{ArchiveLoader, DownloadError, FetchOutcome, FetchProgress, StdoutProgress};
