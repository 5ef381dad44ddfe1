use crate::driver::Driver;
use crate::error::{ErrorKind, Result};
use crate::report::{MigrationReport, SkippedRecord, SyncReport, TransformReport};
use crate::resource::{Assets, Components, Datasources, Stories};
use decant_gateway::Gateway;
use decant_staging::{MappingEntry, MappingManifest, ResourceKind, StagingStore};
use decant_transform::{Registry, TransformContext, TransformOptions};
use exn::ResultExt;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Ignore previous status records and resync everything.
    pub force_full: bool,
    /// Kinds to sync. The transform pass always runs over every stored story.
    pub kinds: Vec<ResourceKind>,
    pub transform: TransformOptions,
}
impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            force_full: false,
            kinds: ResourceKind::ALL.to_vec(),
            transform: TransformOptions::default(),
        }
    }
}

/// One migration root fed from one space.
pub struct Migration {
    gateway: Gateway,
    staging: Arc<StagingStore>,
    registry: Registry,
    options: MigrationOptions,
}
impl Migration {
    pub fn new(gateway: Gateway, staging: Arc<StagingStore>, options: MigrationOptions) -> Self {
        Self {
            gateway,
            staging,
            registry: Registry::default(),
            options,
        }
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn staging(&self) -> &Arc<StagingStore> {
        &self.staging
    }

    /// Snapshot the space, sync every selected kind concurrently, then
    /// transform every stored story and write the mapping manifest.
    #[instrument(level = "info", skip(self), fields(force_full = self.options.force_full))]
    pub async fn run(&self) -> Result<MigrationReport> {
        let space = self.gateway.space().await.or_raise(|| ErrorKind::Gateway)?;
        self.staging.write_space(&space).await.or_raise(|| ErrorKind::Staging)?;
        tracing::info!(space = space.id, name = %space.name, "space snapshot written");

        let (components, stories, assets, datasources) = tokio::try_join!(
            self.sync_selected(ResourceKind::Components),
            self.sync_selected(ResourceKind::Stories),
            self.sync_selected(ResourceKind::Assets),
            self.sync_selected(ResourceKind::Datasources),
        )?;
        let syncs = [components, stories, assets, datasources].into_iter().flatten().collect();

        let transform = self.transform().await?;
        Ok(MigrationReport {
            space,
            syncs,
            transform,
        })
    }

    async fn sync_selected(&self, kind: ResourceKind) -> Result<Option<SyncReport>> {
        if !self.options.kinds.contains(&kind) {
            return Ok(None);
        }
        self.sync(kind).await.map(Some)
    }

    /// Sync a single kind, full or incremental as its status allows.
    pub async fn sync(&self, kind: ResourceKind) -> Result<SyncReport> {
        let driver = Driver::new(&self.gateway, &self.staging);
        let force_full = self.options.force_full;
        match kind {
            ResourceKind::Components => driver.sync(Components, force_full).await,
            ResourceKind::Stories => driver.sync(Stories, force_full).await,
            ResourceKind::Assets => driver.sync(Assets::default(), force_full).await,
            ResourceKind::Datasources => driver.sync(Datasources, force_full).await,
        }
    }

    /// Transform every stored story and write `mapping.json`.
    ///
    /// Records no transform can handle are skipped and reported; data
    /// quality problems are logged and kept on their result.
    #[instrument(level = "info", skip(self))]
    pub async fn transform(&self) -> Result<TransformReport> {
        let mut ctx = TransformContext::new(self.staging.backend().clone(), self.options.transform.clone());
        for document_type in self.registry.document_types() {
            let translations = self.staging.read_translations(document_type).await.or_raise(|| ErrorKind::Staging)?;
            ctx = ctx.with_translations(document_type, translations);
        }

        let mut report = TransformReport::default();
        for story in self.staging.stories().await.or_raise(|| ErrorKind::Staging)? {
            if story.is_folder {
                continue;
            }
            match self.registry.transform(&story, &ctx).await {
                Ok(result) => {
                    for warning in &result.warnings {
                        tracing::warn!(id = story.id, "{warning}");
                    }
                    report.results.push(result);
                },
                Err(err) if err.is_skippable() => {
                    tracing::warn!(id = story.id, category = story.category(), "skipped: {err}");
                    report.skipped.push(SkippedRecord {
                        source_id: story.id,
                        category: story.category().to_string(),
                        reason: err.to_string(),
                    });
                },
                Err(err) => return Err(err).or_raise(|| ErrorKind::Transform),
            }
        }

        let entries = report
            .results
            .iter()
            .map(|result| MappingEntry {
                source_id: result.source_id,
                kind: ResourceKind::Stories,
                category: result.category.clone(),
                natural_key: result.natural_key.clone(),
                destination_id: result.destination_id.clone(),
            })
            .collect();
        let manifest = MappingManifest::new(OffsetDateTime::now_utc(), entries);
        self.staging.write_manifest(&manifest).await.or_raise(|| ErrorKind::Staging)?;
        tracing::info!(
            transformed = report.results.len(),
            skipped = report.skipped.len(),
            warnings = report.warnings().count(),
            "transform pass completed"
        );
        Ok(report)
    }
}
