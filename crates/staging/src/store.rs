use crate::error::{ErrorKind, Result};
use crate::kind::{ResourceKind, STATUS_FILE};
use crate::manifest::MappingManifest;
use crate::naming::id_of;
use crate::status::DownloadStatus;
use crate::translations::Translations;
use decant_gateway::models::Space;
use decant_storage::{BackendHandle, FileInfo};
use exn::ResultExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::instrument;

pub const SPACE_FILE: &str = "space-info.json";
pub const MANIFEST_FILE: &str = "mapping.json";

/// Durable home of everything fetched from the source.
///
/// Layout below the backend root:
///
/// ```text
/// space-info.json
/// mapping.json
/// <kind>/_status.json
/// stories/<category>/<id>-<slug>.json
/// assets/metadata/<id>.json
/// assets/files/<id>-<filename>
/// components/<id>-<name>.json
/// datasources/<id>-<slug>.json
/// translations/<kind>-translations.json
/// ```
///
/// Each kind only ever touches its own directory, so drivers for different
/// kinds can share one store concurrently. Within a kind there must be a
/// single writer.
pub struct StagingStore {
    pub(crate) backend: BackendHandle,
    /// Story id → key, built by one scan over every category partition.
    pub(crate) story_index: Mutex<Option<HashMap<u64, PathBuf>>>,
}
impl StagingStore {
    pub fn new(backend: BackendHandle) -> Self {
        Self {
            backend,
            story_index: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// Read a payload; absence is `None`, not an error.
    pub(crate) async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match self.backend.read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e).or_raise(|| ErrorKind::Storage),
        }
    }

    pub(crate) async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        let Some(bytes) = self.read_bytes(path).await? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Corrupt(path.to_path_buf()))?;
        Ok(Some(value))
    }

    pub(crate) async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value).or_raise(|| ErrorKind::Encode(path.display().to_string()))?;
        self.backend.write(path, &bytes).await.or_raise(|| ErrorKind::Storage)
    }

    /// Delete a key; `false` if it was already gone.
    pub(crate) async fn delete_file(&self, path: &Path) -> Result<bool> {
        match self.backend.delete(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e).or_raise(|| ErrorKind::Storage),
        }
    }

    pub(crate) async fn list_files(&self, dir: &Path) -> Result<Vec<FileInfo>> {
        let mut files = self.backend.list(Some(dir)).await.or_raise(|| ErrorKind::Storage)?;
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Files directly inside `dir` whose name starts with `id`.
    pub(crate) async fn files_for_id(&self, dir: &Path, id: u64) -> Result<Vec<PathBuf>> {
        Ok(self
            .list_files(dir)
            .await?
            .into_iter()
            .filter(|f| f.is_child_of(dir) && f.file_name().and_then(id_of) == Some(id))
            .map(|f| f.path)
            .collect())
    }

    /// Ids of the files directly inside `dir`.
    pub(crate) async fn ids_in(&self, dir: &Path) -> Result<BTreeSet<u64>> {
        Ok(self
            .list_files(dir)
            .await?
            .iter()
            .filter(|f| f.is_child_of(dir))
            .filter_map(|f| f.file_name().and_then(id_of))
            .collect())
    }

    fn key_path(kind: ResourceKind, key: &str) -> Result<PathBuf> {
        let trimmed = key.trim_matches('/');
        if trimmed.is_empty() || trimmed == STATUS_FILE {
            exn::bail!(ErrorKind::InvalidKey(key.to_string()));
        }
        Ok(kind.dir().join(trimmed))
    }

    /// Store a raw payload under `<kind>/<key>`.
    pub async fn write(&self, kind: ResourceKind, key: &str, payload: &[u8]) -> Result<()> {
        let path = Self::key_path(kind, key)?;
        self.backend.write(&path, payload).await.or_raise(|| ErrorKind::Storage)
    }

    pub async fn read(&self, kind: ResourceKind, key: &str) -> Result<Option<Vec<u8>>> {
        self.read_bytes(&Self::key_path(kind, key)?).await
    }

    /// Every key stored for `kind`, relative to its directory, `/`-separated.
    /// The status record is not a key.
    pub async fn list(&self, kind: ResourceKind) -> Result<BTreeSet<String>> {
        let dir = kind.dir();
        Ok(self
            .list_files(dir)
            .await?
            .into_iter()
            .filter_map(|f| {
                let relative = f.path.strip_prefix(dir).ok()?;
                let key = relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
                (key != STATUS_FILE).then_some(key)
            })
            .collect())
    }

    /// Source ids currently stored for `kind`.
    pub async fn stored_ids(&self, kind: ResourceKind) -> Result<BTreeSet<u64>> {
        match kind {
            ResourceKind::Stories => self.story_ids().await,
            ResourceKind::Assets => self.asset_ids().await,
            ResourceKind::Components | ResourceKind::Datasources => self.ids_in(kind.dir()).await,
        }
    }

    /// Remove everything stored for one source id of `kind`.
    pub async fn remove(&self, kind: ResourceKind, id: u64) -> Result<bool> {
        match kind {
            ResourceKind::Stories => self.remove_by_id(id).await,
            ResourceKind::Assets => self.remove_asset(id).await,
            ResourceKind::Components | ResourceKind::Datasources => {
                let mut removed = false;
                for path in self.files_for_id(kind.dir(), id).await? {
                    removed |= self.delete_file(&path).await?;
                }
                Ok(removed)
            },
        }
    }

    /// Load the status record of `kind`, backfilling legacy fields.
    #[instrument(level = "debug", skip(self))]
    pub async fn read_status(&self, kind: ResourceKind) -> Result<Option<DownloadStatus>> {
        self.read_json(&kind.status_path()).await
    }

    /// Replace the status record of `kind`. The backend swaps the file
    /// atomically; a crash leaves the previous record readable.
    pub async fn write_status(&self, kind: ResourceKind, status: &DownloadStatus) -> Result<()> {
        self.write_json(&kind.status_path(), status).await
    }

    pub async fn write_space(&self, space: &Space) -> Result<()> {
        self.write_json(Path::new(SPACE_FILE), space).await
    }

    pub async fn read_space(&self) -> Result<Option<Space>> {
        self.read_json(Path::new(SPACE_FILE)).await
    }

    /// Side-loaded translations for `kind`; an absent file is an empty table.
    pub async fn read_translations(&self, kind: &str) -> Result<Translations> {
        let path = PathBuf::from("translations").join(format!("{kind}-translations.json"));
        Ok(self.read_json(&path).await?.unwrap_or_default())
    }

    pub async fn write_manifest(&self, manifest: &MappingManifest) -> Result<()> {
        self.write_json(Path::new(MANIFEST_FILE), manifest).await
    }

    pub async fn read_manifest(&self) -> Result<Option<MappingManifest>> {
        self.read_json(Path::new(MANIFEST_FILE)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::MappingEntry;
    use crate::status::SyncMode;
    use decant_storage::backend::{LocalBackend, MemoryBackend};
    use std::sync::Arc;
    use time::macros::datetime;

    fn store() -> StagingStore {
        StagingStore::new(Arc::new(MemoryBackend::default()))
    }

    #[tokio::test]
    async fn test_generic_read_write_list() {
        let store = store();
        store.write(ResourceKind::Components, "1-hero.json", b"{}").await.unwrap();
        store.write(ResourceKind::Components, "2-teaser.json", b"{}").await.unwrap();
        store.write_status(ResourceKind::Components, &DownloadStatus::default()).await.unwrap();

        assert_eq!(store.read(ResourceKind::Components, "1-hero.json").await.unwrap(), Some(b"{}".to_vec()));
        assert_eq!(store.read(ResourceKind::Components, "3-missing.json").await.unwrap(), None);
        let keys = store.list(ResourceKind::Components).await.unwrap();
        assert_eq!(keys, BTreeSet::from(["1-hero.json".to_string(), "2-teaser.json".to_string()]));
        assert!(store.list(ResourceKind::Datasources).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_key_reserved() {
        let store = store();
        let err = store.write(ResourceKind::Stories, "_status.json", b"{}").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_status_round_trip_on_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(Arc::new(LocalBackend::new("migration", temp_dir.path()).unwrap()));
        assert_eq!(store.read_status(ResourceKind::Assets).await.unwrap(), None);

        let mut status = DownloadStatus::default();
        status.start(SyncMode::Full, datetime!(2024-03-01 10:00 UTC));
        status.record(7, false);
        status.complete(datetime!(2024-03-01 10:01 UTC));
        store.write_status(ResourceKind::Assets, &status).await.unwrap();

        assert!(temp_dir.path().join("assets/_status.json").is_file());
        assert_eq!(store.read_status(ResourceKind::Assets).await.unwrap(), Some(status));
    }

    #[tokio::test]
    async fn test_legacy_status_backfilled_on_read() {
        let backend = Arc::new(MemoryBackend::with_files([(
            "stories/_status.json",
            r#"{"totalItems": 2, "downloadedItems": 2, "downloadedIds": [1, 2], "isComplete": true, "lastUpdated": "2024-01-01T00:00:00Z"}"#,
        )]));
        let status = StagingStore::new(backend).read_status(ResourceKind::Stories).await.unwrap().unwrap();
        assert_eq!(status.sync_mode, SyncMode::Full);
        assert_eq!(status.last_sync_started, Some(datetime!(2024-01-01 0:00 UTC)));
        assert!(status.deleted_ids.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_status() {
        let backend = Arc::new(MemoryBackend::with_files([("stories/_status.json", "{\"totalItems\": ")]));
        let err = StagingStore::new(backend).read_status(ResourceKind::Stories).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_translations() {
        let backend = Arc::new(MemoryBackend::with_files([(
            "translations/person-translations.json",
            r#"{"jane-doe": {"role": "Technische Direktorin"}}"#,
        )]));
        let store = StagingStore::new(backend);
        let translations = store.read_translations("person").await.unwrap();
        assert_eq!(translations.get("jane-doe", "role"), Some("Technische Direktorin"));
        assert!(store.read_translations("article").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manifest() {
        let store = store();
        assert_eq!(store.read_manifest().await.unwrap(), None);
        let manifest = MappingManifest::new(
            datetime!(2024-03-01 10:00 UTC),
            vec![
                MappingEntry {
                    source_id: 43,
                    kind: ResourceKind::Stories,
                    category: "article".to_string(),
                    natural_key: "hello".to_string(),
                    destination_id: "b".to_string(),
                },
                MappingEntry {
                    source_id: 42,
                    kind: ResourceKind::Stories,
                    category: "person".to_string(),
                    natural_key: "jane-doe".to_string(),
                    destination_id: "a".to_string(),
                },
            ],
        );
        store.write_manifest(&manifest).await.unwrap();
        let read = store.read_manifest().await.unwrap().unwrap();
        assert_eq!(read.entries[0].source_id, 42);
        assert_eq!(read.destination_id(ResourceKind::Stories, 43), Some("b"));
    }

    #[tokio::test]
    async fn test_remove_component_by_id() {
        let store = store();
        store.write(ResourceKind::Components, "1-hero.json", b"{}").await.unwrap();
        store.write(ResourceKind::Components, "11-other.json", b"{}").await.unwrap();
        assert!(store.remove(ResourceKind::Components, 1).await.unwrap());
        assert!(!store.remove(ResourceKind::Components, 1).await.unwrap());
        assert_eq!(store.stored_ids(ResourceKind::Components).await.unwrap(), BTreeSet::from([11]));
    }
}
