//! Components and datasources: flat `<id>-<name>.json` files.

use crate::error::Result;
use crate::kind::ResourceKind;
use crate::naming::{id_of, record_file_name};
use crate::store::StagingStore;
use decant_gateway::models::{Component, Datasource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

impl StagingStore {
    /// Write `<kind>/<id>-<name>.json`, dropping any file of the same id
    /// stored under an older name.
    async fn replace_record<T: Serialize>(&self, kind: ResourceKind, id: u64, name: &str, value: &T) -> Result<PathBuf> {
        let path = kind.dir().join(record_file_name(id, name));
        for stale in self.files_for_id(kind.dir(), id).await?.into_iter().filter(|p| *p != path) {
            self.delete_file(&stale).await?;
        }
        self.write_json(&path, value).await?;
        Ok(path)
    }

    async fn records<T: DeserializeOwned>(&self, kind: ResourceKind) -> Result<Vec<T>> {
        let mut records = Vec::new();
        for file in self.list_files(kind.dir()).await? {
            let is_record = file.is_child_of(kind.dir()) && file.file_name().and_then(id_of).is_some();
            if is_record && let Some(record) = self.read_json(&file.path).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub async fn write_component(&self, component: &Component) -> Result<PathBuf> {
        self.replace_record(ResourceKind::Components, component.id, &component.name, component).await
    }

    pub async fn components(&self) -> Result<Vec<Component>> {
        self.records(ResourceKind::Components).await
    }

    pub async fn write_datasource(&self, datasource: &Datasource) -> Result<PathBuf> {
        self.replace_record(ResourceKind::Datasources, datasource.id, &datasource.slug, datasource).await
    }

    pub async fn datasources(&self) -> Result<Vec<Datasource>> {
        self.records(ResourceKind::Datasources).await
    }
}
