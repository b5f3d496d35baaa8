//! Batch orchestrator — fetches a list of archive files with progress reporting.

use super::loader::{ArchiveLoader, DownloadError, FetchOutcome, FetchProgress};

/// One file to fetch: vendor-relative directory plus file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRequest {
    pub relative_path: String,
    pub file_name: String,
}

impl ArchiveRequest {
    pub fn new(relative_path: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            file_name: file_name.into(),
        }
    }
}

/// Fetch every requested file sequentially into the loader's store directory.
///
/// A failed file does not abort the batch; failures are collected into the
/// summary. Returns counts of downloaded, already-cached, and failed files.
pub fn fetch_many(
    loader: &dyn ArchiveLoader,
    requests: &[ArchiveRequest],
    progress: &dyn FetchProgress,
) -> FetchSummary {
    let total = requests.len();
    let mut downloaded = 0;
    let mut cached = 0;
    let mut failed = 0;
    let mut errors: Vec<(String, DownloadError)> = Vec::new();

    for (i, req) in requests.iter().enumerate() {
        progress.on_start(&req.file_name, i, total);

        let result = loader.download_file(&req.relative_path, &req.file_name);
        progress.on_complete(&req.file_name, i, total, &result);

        match result {
            Ok(FetchOutcome::Downloaded) => downloaded += 1,
            Ok(FetchOutcome::AlreadyCached) => cached += 1,
            Err(e) => {
                errors.push((req.file_name.clone(), e));
                failed += 1;
            }
        }
    }

    progress.on_batch_complete(downloaded, cached, failed, total);

    FetchSummary {
        total,
        downloaded,
        cached,
        failed,
        errors,
    }
}

/// Summary of a batch fetch operation.
#[derive(Debug)]
pub struct FetchSummary {
    pub total: usize,
    pub downloaded: usize,
    pub cached: usize,
    pub failed: usize,
    pub errors: Vec<(String, DownloadError)>,
}

impl FetchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
