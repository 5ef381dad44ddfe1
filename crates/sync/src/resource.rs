//! What differs between resource kinds: the list endpoint, whether it can
//! filter by update time, and what else storing one record takes.

use crate::error::{ErrorKind, Result};
use crate::report::SyncReport;
use async_trait::async_trait;
use decant_gateway::models::{Asset, Component, Datasource, DatasourceEntry, Story};
use decant_gateway::{Gateway, ListQuery, Page};
use decant_staging::{ResourceKind, StagingStore};
use exn::ResultExt;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[async_trait]
pub(crate) trait Resource: Send + Sync {
    type Record: Send + Sync + 'static;
    const KIND: ResourceKind;
    /// Whether the list endpoint honors `updated_at_gt`.
    const CHANGE_FILTER: bool;

    fn id(record: &Self::Record) -> u64;

    /// Load whatever per-run state storing needs.
    async fn prepare(&mut self, _staging: &StagingStore) -> Result<()> {
        Ok(())
    }

    async fn list(&self, gateway: &Gateway, query: ListQuery) -> decant_gateway::error::Result<Page<Vec<Self::Record>>>;

    async fn store(
        &mut self,
        gateway: &Gateway,
        staging: &StagingStore,
        record: Self::Record,
        report: &mut SyncReport,
    ) -> Result<()>;
}

pub(crate) struct Stories;

#[async_trait]
impl Resource for Stories {
    type Record = Story;
    const KIND: ResourceKind = ResourceKind::Stories;
    const CHANGE_FILTER: bool = true;

    fn id(record: &Story) -> u64 {
        record.id
    }

    async fn list(&self, gateway: &Gateway, query: ListQuery) -> decant_gateway::error::Result<Page<Vec<Story>>> {
        gateway.stories_page(query).await
    }

    async fn store(&mut self, gateway: &Gateway, staging: &StagingStore, story: Story, _: &mut SyncReport) -> Result<()> {
        let story = if story.is_missing_content() {
            tracing::debug!(id = story.id, "list response left out content, fetching story");
            gateway.story(story.id).await.or_raise(|| ErrorKind::Gateway)?
        } else {
            story
        };
        staging.write_story(&story).await.or_raise(|| ErrorKind::Staging)?;
        Ok(())
    }
}

/// Assets keep their metadata in sync every run; the binary is only fetched
/// while staging has none under the asset's current file name.
#[derive(Default)]
pub(crate) struct Assets {
    binaries: BTreeSet<PathBuf>,
}

#[async_trait]
impl Resource for Assets {
    type Record = Asset;
    const KIND: ResourceKind = ResourceKind::Assets;
    const CHANGE_FILTER: bool = true;

    fn id(record: &Asset) -> u64 {
        record.id
    }

    async fn prepare(&mut self, staging: &StagingStore) -> Result<()> {
        self.binaries = staging.asset_binary_paths().await.or_raise(|| ErrorKind::Staging)?;
        Ok(())
    }

    async fn list(&self, gateway: &Gateway, query: ListQuery) -> decant_gateway::error::Result<Page<Vec<Asset>>> {
        gateway.assets_page(query).await
    }

    async fn store(
        &mut self,
        gateway: &Gateway,
        staging: &StagingStore,
        asset: Asset,
        report: &mut SyncReport,
    ) -> Result<()> {
        staging.write_asset(&asset).await.or_raise(|| ErrorKind::Staging)?;
        if self.binaries.contains(&StagingStore::asset_binary_path(&asset)) {
            return Ok(());
        }
        match gateway.download(&asset.filename).await {
            Ok(bytes) => {
                let path = staging.write_asset_binary(&asset, &bytes).await.or_raise(|| ErrorKind::Staging)?;
                self.binaries.insert(path);
            },
            Err(err) => {
                tracing::warn!(id = asset.id, url = %asset.filename, "binary download failed, left for the next run: {err}");
                report.failed_downloads.insert(asset.id);
            },
        }
        Ok(())
    }
}

pub(crate) struct Components;

#[async_trait]
impl Resource for Components {
    type Record = Component;
    const KIND: ResourceKind = ResourceKind::Components;
    const CHANGE_FILTER: bool = false;

    fn id(record: &Component) -> u64 {
        record.id
    }

    async fn list(&self, gateway: &Gateway, query: ListQuery) -> decant_gateway::error::Result<Page<Vec<Component>>> {
        gateway.components_page(query).await
    }

    async fn store(&mut self, _: &Gateway, staging: &StagingStore, component: Component, _: &mut SyncReport) -> Result<()> {
        staging.write_component(&component).await.or_raise(|| ErrorKind::Staging)?;
        Ok(())
    }
}

/// Datasources are stored together with every page of their entries.
pub(crate) struct Datasources;

impl Datasources {
    async fn entries(gateway: &Gateway, datasource_id: u64) -> Result<Vec<DatasourceEntry>> {
        let mut entries: Vec<DatasourceEntry> = Vec::new();
        let mut ids = BTreeSet::new();
        let mut page = 1;
        loop {
            let listing = gateway.datasource_entries_page(datasource_id, page).await.or_raise(|| ErrorKind::Gateway)?;
            let more = listing.has_more(page);
            let fresh: Vec<_> = listing.data.into_iter().filter(|entry| ids.insert(entry.id)).collect();
            if fresh.is_empty() {
                break;
            }
            entries.extend(fresh);
            if !more {
                break;
            }
            page += 1;
        }
        Ok(entries)
    }
}

#[async_trait]
impl Resource for Datasources {
    type Record = Datasource;
    const KIND: ResourceKind = ResourceKind::Datasources;
    const CHANGE_FILTER: bool = false;

    fn id(record: &Datasource) -> u64 {
        record.id
    }

    async fn list(&self, gateway: &Gateway, query: ListQuery) -> decant_gateway::error::Result<Page<Vec<Datasource>>> {
        gateway.datasources_page(query).await
    }

    async fn store(
        &mut self,
        gateway: &Gateway,
        staging: &StagingStore,
        mut datasource: Datasource,
        _: &mut SyncReport,
    ) -> Result<()> {
        datasource.entries = Self::entries(gateway, datasource.id).await?;
        tracing::debug!(slug = %datasource.slug, entries = datasource.entries.len(), "fetched datasource entries");
        staging.write_datasource(&datasource).await.or_raise(|| ErrorKind::Staging)?;
        Ok(())
    }
}
