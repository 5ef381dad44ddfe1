use decant_staging::{DownloadStatus, SyncMode};

/// Pick the sync mode for a kind.
///
/// Incremental only builds on a previous attempt that finished cleanly; no
/// status, an incomplete status, a completion stamp missing or older than
/// the start stamp, or `force_full` all mean a full sync.
pub fn plan(status: Option<&DownloadStatus>, force_full: bool) -> SyncMode {
    match status {
        _ if force_full => SyncMode::Full,
        Some(status) if status.finished_cleanly() => SyncMode::Incremental,
        _ => SyncMode::Full,
    }
}
