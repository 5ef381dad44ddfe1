//! Per-kind download status.
//!
//! One `_status.json` per resource kind records how far the last attempt got.
//! Older records predate several fields; they are backfilled on every read
//! instead of being rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    #[default]
    Full,
    Incremental,
}
impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        })
    }
}

/// Counters for the most recent run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub new: u64,
    pub updated: u64,
    pub deleted: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredStatus")]
pub struct DownloadStatus {
    pub total_items: u64,
    /// Always `downloaded_ids.len()`.
    pub downloaded_items: u64,
    pub downloaded_ids: BTreeSet<u64>,
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Value>,
    pub sync_mode: SyncMode,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_sync_started: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_sync_completed: Option<OffsetDateTime>,
    /// Ids found deleted remotely by the most recent run.
    pub deleted_ids: BTreeSet<u64>,
    pub sync_stats: SyncStats,
}
impl Default for DownloadStatus {
    fn default() -> Self {
        Self {
            total_items: 0,
            downloaded_items: 0,
            downloaded_ids: BTreeSet::new(),
            is_complete: false,
            filters: None,
            sync_mode: SyncMode::Full,
            last_updated: None,
            last_sync_started: None,
            last_sync_completed: None,
            deleted_ids: BTreeSet::new(),
            sync_stats: SyncStats::default(),
        }
    }
}
impl DownloadStatus {
    /// Begin a new attempt.
    ///
    /// A full attempt forgets which ids were downloaded; an incremental one
    /// builds on them. Either way the attempt counts as unfinished until
    /// [`complete()`](Self::complete), so an interrupted run leaves
    /// `last_sync_started` set and `last_sync_completed` unset.
    pub fn start(&mut self, mode: SyncMode, now: OffsetDateTime) {
        self.sync_mode = mode;
        self.is_complete = false;
        self.last_sync_started = Some(now);
        self.last_sync_completed = None;
        self.last_updated = Some(now);
        self.deleted_ids.clear();
        self.sync_stats = SyncStats::default();
        if mode == SyncMode::Full {
            self.downloaded_ids.clear();
            self.downloaded_items = 0;
        }
    }

    /// Note one stored record. `known` is whether the id existed before this
    /// run, which decides between the `new` and `updated` counters.
    pub fn record(&mut self, id: u64, known: bool) {
        self.downloaded_ids.insert(id);
        self.downloaded_items = self.downloaded_ids.len() as u64;
        if known {
            self.sync_stats.updated += 1;
        } else {
            self.sync_stats.new += 1;
        }
    }

    /// Note records removed because the remote no longer has them.
    pub fn record_deleted(&mut self, ids: impl IntoIterator<Item = u64>) {
        for id in ids {
            self.downloaded_ids.remove(&id);
            if self.deleted_ids.insert(id) {
                self.sync_stats.deleted += 1;
            }
        }
        self.downloaded_items = self.downloaded_ids.len() as u64;
    }

    pub fn complete(&mut self, now: OffsetDateTime) {
        self.is_complete = true;
        self.last_updated = Some(now);
        self.last_sync_completed = Some(now);
    }

    /// The last attempt ran to the end: it is complete and its completion
    /// is not older than its start.
    pub fn finished_cleanly(&self) -> bool {
        if !self.is_complete {
            return false;
        }
        match (self.last_sync_started, self.last_sync_completed) {
            (Some(started), Some(completed)) => completed >= started,
            (None, Some(_)) => true,
            (_, None) => false,
        }
    }
}

/// On-disk shape, every field optional.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredStatus {
    #[serde(default)]
    total_items: u64,
    #[serde(default)]
    downloaded_items: Option<u64>,
    #[serde(default)]
    downloaded_ids: Vec<u64>,
    #[serde(default)]
    is_complete: bool,
    #[serde(default)]
    filters: Option<Value>,
    #[serde(default)]
    sync_mode: Option<SyncMode>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    last_updated: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    last_sync_started: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    last_sync_completed: Option<OffsetDateTime>,
    #[serde(default)]
    deleted_ids: Option<Vec<u64>>,
    #[serde(default)]
    sync_stats: Option<SyncStats>,
}
impl From<StoredStatus> for DownloadStatus {
    fn from(stored: StoredStatus) -> Self {
        // Records written before sync modes existed.
        let legacy = stored.sync_mode.is_none();
        if legacy {
            tracing::warn!(complete = stored.is_complete, "backfilling legacy download status");
        }
        let downloaded_ids: BTreeSet<u64> = stored.downloaded_ids.into_iter().collect();
        let downloaded_items = downloaded_ids.len() as u64;
        if let Some(claimed) = stored.downloaded_items
            && claimed != downloaded_items
        {
            tracing::warn!(claimed, actual = downloaded_items, "download count disagrees with id set, recomputed");
        }
        let last_sync_completed = match stored.last_sync_completed {
            None if legacy && stored.is_complete => stored.last_updated,
            completed => completed,
        };
        Self {
            total_items: stored.total_items,
            downloaded_items,
            downloaded_ids,
            is_complete: stored.is_complete,
            filters: stored.filters,
            sync_mode: stored.sync_mode.unwrap_or_default(),
            last_updated: stored.last_updated,
            last_sync_started: stored.last_sync_started.or(stored.last_updated),
            last_sync_completed,
            deleted_ids: stored.deleted_ids.unwrap_or_default().into_iter().collect(),
            sync_stats: stored.sync_stats.unwrap_or_default(),
        }
    }
}
