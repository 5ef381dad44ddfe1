//! The per-kind sync loop, shared by every [`Resource`].

use crate::error::{ErrorKind, Result};
use crate::plan::plan;
use crate::report::SyncReport;
use crate::resource::Resource;
use decant_gateway::{Gateway, ListQuery};
use decant_staging::{DownloadStatus, StagingStore, SyncMode};
use exn::ResultExt;
use std::collections::BTreeSet;
use time::OffsetDateTime;
use tracing::instrument;

pub(crate) struct Driver<'a> {
    gateway: &'a Gateway,
    staging: &'a StagingStore,
}
impl<'a> Driver<'a> {
    pub fn new(gateway: &'a Gateway, staging: &'a StagingStore) -> Self {
        Self { gateway, staging }
    }

    /// Bring one kind up to date, checkpointing its status after every page.
    ///
    /// A failure leaves the last checkpoint behind: started, not completed,
    /// so the next run plans a full sync. Deletions are only reconciled
    /// against a listing that reached its end.
    #[instrument(level = "debug", skip(self, resource), fields(kind = %R::KIND))]
    pub async fn sync<R: Resource>(&self, mut resource: R, force_full: bool) -> Result<SyncReport> {
        let kind = R::KIND;
        let previous = self.staging.read_status(kind).await.or_raise(|| ErrorKind::Staging)?;
        let mode = plan(previous.as_ref(), force_full);
        let since = match mode {
            SyncMode::Incremental if R::CHANGE_FILTER => previous.as_ref().and_then(|s| s.last_sync_completed),
            _ => None,
        };
        let known = self.staging.stored_ids(kind).await.or_raise(|| ErrorKind::Staging)?;
        resource.prepare(self.staging).await?;

        tracing::info!(%kind, %mode, stored = known.len(), ?since, "sync started");
        let mut status = previous.unwrap_or_default();
        status.start(mode, OffsetDateTime::now_utc());
        self.checkpoint(kind, &status).await?;

        let mut report = SyncReport::new(kind, mode);
        let seen = self.download(&mut resource, &mut status, &known, since, &mut report).await?;
        // Without a change filter the download already listed everything.
        let remote = match since {
            Some(_) => self.remote_ids(&resource, &mut report).await?,
            None => seen.clone(),
        };

        if remote.complete {
            let stale: Vec<u64> = known.union(&seen.ids).filter(|id| !remote.ids.contains(id)).copied().collect();
            for id in &stale {
                if self.staging.remove(kind, *id).await.or_raise(|| ErrorKind::Staging)? {
                    tracing::debug!(%kind, id, "removed record deleted remotely");
                }
            }
            status.record_deleted(stale);
            status.total_items = remote.ids.len() as u64;
        } else {
            tracing::warn!(%kind, listed = remote.ids.len(), "listing never reached its end, deletions not reconciled");
        }
        // A cut-short download stays interrupted so the next run starts over.
        if seen.complete {
            status.complete(OffsetDateTime::now_utc());
        }
        self.checkpoint(kind, &status).await?;

        report.total_items = status.total_items;
        report.downloaded_items = status.downloaded_items;
        report.stats = status.sync_stats;
        report.deleted_ids = status.deleted_ids.clone();
        report.reconciled = remote.complete;
        tracing::info!(
            %kind,
            new = report.stats.new,
            updated = report.stats.updated,
            deleted = report.stats.deleted,
            failed_downloads = report.failed_downloads.len(),
            "sync completed"
        );
        Ok(report)
    }

    async fn checkpoint(&self, kind: decant_staging::ResourceKind, status: &DownloadStatus) -> Result<()> {
        self.staging.write_status(kind, status).await.or_raise(|| ErrorKind::Staging)?;
        Ok(())
    }

    /// Page through the list endpoint storing every record.
    async fn download<R: Resource>(
        &self,
        resource: &mut R,
        status: &mut DownloadStatus,
        known: &BTreeSet<u64>,
        since: Option<OffsetDateTime>,
        report: &mut SyncReport,
    ) -> Result<Listing> {
        let mut listed = Listing::default();
        let mut page = 1;
        loop {
            let query = ListQuery::page(page).updated_since(since);
            let listing = resource.list(self.gateway, query).await.or_raise(|| ErrorKind::Gateway)?;
            report.pages += 1;
            let more = listing.has_more(page);
            let total = listing.total;
            if !listed.admit(listing.data.iter().map(R::id)) {
                tracing::warn!(kind = %R::KIND, page, "page repeats records already listed, stopping");
                break;
            }
            for record in listing.data {
                let id = R::id(&record);
                resource.store(self.gateway, self.staging, record, report).await?;
                status.record(id, known.contains(&id));
            }
            status.total_items = if total == 0 { listed.ids.len() as u64 } else { total };
            self.checkpoint(R::KIND, status).await?;
            tracing::debug!(kind = %R::KIND, page, stored = listed.ids.len(), total, "page stored");
            if !more {
                listed.complete = true;
                break;
            }
            page += 1;
        }
        Ok(listed)
    }

    /// Every id the remote currently has, fetched without a change filter.
    async fn remote_ids<R: Resource>(&self, resource: &R, report: &mut SyncReport) -> Result<Listing> {
        let mut listed = Listing::default();
        let mut page = 1;
        loop {
            let listing = resource.list(self.gateway, ListQuery::page(page)).await.or_raise(|| ErrorKind::Gateway)?;
            report.pages += 1;
            if !listed.admit(listing.data.iter().map(R::id)) {
                tracing::warn!(kind = %R::KIND, page, "page repeats records already listed, stopping");
                break;
            }
            if !listing.has_more(page) {
                listed.complete = true;
                break;
            }
            page += 1;
        }
        Ok(listed)
    }
}

/// Ids collected by paging a list endpoint.
#[derive(Debug, Clone, Default)]
struct Listing {
    ids: BTreeSet<u64>,
    /// Paging stopped at an empty page or at the page count `total` implies.
    complete: bool,
}
impl Listing {
    /// Add one page of ids. A non-empty page that brings nothing new means the
    /// remote is serving the same page again, so it is refused.
    fn admit(&mut self, page: impl Iterator<Item = u64>) -> bool {
        let before = self.ids.len();
        let mut empty = true;
        for id in page {
            empty = false;
            self.ids.insert(id);
        }
        empty || self.ids.len() > before
    }
}
