use decant_gateway::models::Space;
use decant_staging::{ResourceKind, SyncMode, SyncStats};
use decant_transform::{DataWarning, TransformResult};
use serde::Serialize;
use std::collections::BTreeSet;

/// Outcome of syncing one resource kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub kind: ResourceKind,
    pub mode: SyncMode,
    /// List requests issued, including the id listing of an incremental run.
    pub pages: u32,
    pub total_items: u64,
    pub downloaded_items: u64,
    pub stats: SyncStats,
    pub deleted_ids: BTreeSet<u64>,
    /// Deletions were checked against a listing that reached its end.
    pub reconciled: bool,
    /// Assets whose binary could not be downloaded; the next run retries them.
    pub failed_downloads: BTreeSet<u64>,
}
impl SyncReport {
    pub(crate) fn new(kind: ResourceKind, mode: SyncMode) -> Self {
        Self {
            kind,
            mode,
            pages: 0,
            total_items: 0,
            downloaded_items: 0,
            stats: SyncStats::default(),
            deleted_ids: BTreeSet::new(),
            reconciled: false,
            failed_downloads: BTreeSet::new(),
        }
    }
}

/// A stored story the transform pass left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    pub source_id: u64,
    pub category: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransformReport {
    pub results: Vec<TransformResult>,
    pub skipped: Vec<SkippedRecord>,
}
impl TransformReport {
    pub fn warnings(&self) -> impl Iterator<Item = &DataWarning> {
        self.results.iter().flat_map(|r| r.warnings.iter())
    }
}

/// Everything one [`Migration::run()`](crate::Migration::run) did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    pub space: Space,
    /// One entry per synced kind, in [`ResourceKind::ALL`] order.
    pub syncs: Vec<SyncReport>,
    pub transform: TransformReport,
}
impl MigrationReport {
    pub fn sync(&self, kind: ResourceKind) -> Option<&SyncReport> {
        self.syncs.iter().find(|s| s.kind == kind)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DataWarning> {
        self.transform.warnings()
    }
}
