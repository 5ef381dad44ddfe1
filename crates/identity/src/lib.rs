//! Stable destination identifiers.
//!
//! The destination system identifies documents by opaque ids, the source by
//! natural keys (slugs). An [`IdentityMap`] pins each natural key to a UUID
//! v4 the first time it is seen and hands back that same id forever after,
//! across runs and process restarts, so re-importing never duplicates a
//! document.
//!
//! One table per kind lives at `id-maps/<kind>-ids.json` and is always
//! rewritten whole.

pub mod error;

use crate::error::{ErrorKind, Result};
use decant_storage::BackendHandle;
use exn::ResultExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::instrument;

type Table = BTreeMap<String, String>;

/// Natural key → destination id table for one kind.
///
/// # Concurrency
/// Loading, minting and persisting all happen under one async mutex, so
/// concurrent callers never interleave rewrites of the same file. Two
/// `IdentityMap`s for the same kind in one process do *not* coordinate;
/// share one behind an `Arc` instead.
pub struct IdentityMap {
    backend: BackendHandle,
    kind: String,
    path: PathBuf,
    table: Mutex<Option<Table>>,
}
impl IdentityMap {
    pub fn new(backend: BackendHandle, kind: impl Into<String>) -> Self {
        let kind = kind.into();
        let path = PathBuf::from("id-maps").join(format!("{kind}-ids.json"));
        Self {
            backend,
            kind,
            path,
            table: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Storage key of the table.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Table> {
        let bytes = match self.backend.read(&self.path).await {
            Ok(bytes) => bytes,
            // No table yet is just an empty table.
            Err(e) if e.is_not_found() => return Ok(Table::new()),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Storage),
        };
        let table: Table = serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Corrupt(self.path.clone()))?;
        tracing::debug!(kind = %self.kind, entries = table.len(), "loaded identity table");
        Ok(table)
    }

    async fn loaded<'g>(&self, slot: &'g mut Option<Table>) -> Result<&'g mut Table> {
        if slot.is_none() {
            *slot = Some(self.load().await?);
        }
        Ok(slot.get_or_insert_with(Table::new))
    }

    /// Return the id for `natural_key`, minting and persisting one if the key
    /// is new.
    ///
    /// The new id only becomes visible once the whole table has been written;
    /// if the write fails, nothing is cached and the next call mints afresh.
    #[instrument(level = "debug", skip(self), fields(kind = %self.kind))]
    pub async fn id_for(&self, natural_key: &str) -> Result<String> {
        if natural_key.trim().is_empty() {
            exn::bail!(ErrorKind::EmptyKey);
        }
        let mut guard = self.table.lock().await;
        let table = self.loaded(&mut guard).await?;
        if let Some(id) = table.get(natural_key) {
            return Ok(id.clone());
        }

        let id = uuid::Uuid::new_v4().to_string();
        let mut updated = table.clone();
        updated.insert(natural_key.to_string(), id.clone());
        let bytes = serde_json::to_vec_pretty(&updated).or_raise(|| ErrorKind::Storage)?;
        self.backend.write(&self.path, &bytes).await.or_raise(|| ErrorKind::Storage)?;
        *table = updated;
        tracing::debug!(natural_key, %id, "minted destination id");
        Ok(id)
    }

    /// The id already assigned to `natural_key`, without minting.
    pub async fn get(&self, natural_key: &str) -> Result<Option<String>> {
        let mut guard = self.table.lock().await;
        Ok(self.loaded(&mut guard).await?.get(natural_key).cloned())
    }

    /// Number of assigned ids.
    pub async fn len(&self) -> Result<usize> {
        let mut guard = self.table.lock().await;
        Ok(self.loaded(&mut guard).await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Drop the in-memory copy. The on-disk table is untouched and is
    /// re-read on next use.
    pub async fn clear_cache(&self) {
        *self.table.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decant_storage::backend::{LocalBackend, MemoryBackend};
    use decant_storage::StorageBackend;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn memory() -> Arc<MemoryBackend> {
        Arc::new(MemoryBackend::default())
    }

    #[tokio::test]
    async fn test_same_key_same_id() {
        let map = IdentityMap::new(memory(), "stories");
        let first = map.id_for("slug-a").await.unwrap();
        let second = map.id_for("slug-a").await.unwrap();
        assert_eq!(first, second);
        assert!(uuid::Uuid::parse_str(&first).is_ok());
    }

    #[tokio::test]
    async fn test_distinct_keys_distinct_ids() {
        let map = IdentityMap::new(memory(), "stories");
        let a = map.id_for("slug-a").await.unwrap();
        let b = map.id_for("slug-b").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(map.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_survives_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(LocalBackend::new("migration", temp_dir.path()).unwrap());
        let original = IdentityMap::new(backend.clone(), "stories").id_for("slug-a").await.unwrap();

        // A fresh map (another process, say) reads the persisted table.
        let reloaded = IdentityMap::new(backend, "stories");
        assert_eq!(reloaded.get("slug-a").await.unwrap(), Some(original.clone()));
        assert_eq!(reloaded.id_for("slug-a").await.unwrap(), original);
        assert!(temp_dir.path().join("id-maps/stories-ids.json").is_file());
    }

    #[tokio::test]
    async fn test_clear_cache_rereads() {
        let backend = memory();
        let map = IdentityMap::new(backend.clone(), "stories");
        let id = map.id_for("slug-a").await.unwrap();
        // Somebody else extends the table on disk.
        let other = IdentityMap::new(backend, "stories");
        let b = other.id_for("slug-b").await.unwrap();

        assert_eq!(map.get("slug-b").await.unwrap(), None);
        map.clear_cache().await;
        assert_eq!(map.get("slug-b").await.unwrap(), Some(b));
        assert_eq!(map.id_for("slug-a").await.unwrap(), id);
    }

    #[tokio::test]
    async fn test_missing_table_is_empty() {
        let map = IdentityMap::new(memory(), "assets");
        assert!(map.is_empty().await.unwrap());
        assert_eq!(map.get("anything").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_kinds_are_separate() {
        let backend = memory();
        let stories = IdentityMap::new(backend.clone(), "stories");
        let assets = IdentityMap::new(backend.clone(), "assets");
        let a = stories.id_for("logo").await.unwrap();
        let b = assets.id_for("logo").await.unwrap();
        assert_ne!(a, b);
        assert!(backend.exists(Path::new("id-maps/assets-ids.json")).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let map = IdentityMap::new(memory(), "stories");
        let err = map.id_for("  ").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::EmptyKey));
    }

    #[tokio::test]
    async fn test_corrupt_table() {
        let backend = Arc::new(MemoryBackend::with_files([("id-maps/stories-ids.json", "[1, 2]")]));
        let err = IdentityMap::new(backend, "stories").id_for("slug-a").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_failed_persist_assigns_nothing() {
        let backend = Arc::new(MemoryBackend::default().with_write_limit(0));
        let map = IdentityMap::new(backend.clone(), "stories");
        assert!(map.id_for("slug-a").await.is_err());
        assert_eq!(map.get("slug-a").await.unwrap(), None);
        backend.lift_write_limit();
        assert!(map.id_for("slug-a").await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers() {
        let backend = memory();
        let map = Arc::new(IdentityMap::new(backend.clone(), "stories"));
        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let map = map.clone();
                tokio::spawn(async move { map.id_for(&format!("slug-{}", i % 8)).await.unwrap() })
            })
            .collect();
        let mut ids = HashSet::new();
        for task in tasks {
            ids.insert(task.await.unwrap());
        }
        assert_eq!(ids.len(), 8);

        let fresh = IdentityMap::new(backend, "stories");
        assert_eq!(fresh.len().await.unwrap(), 8);
    }
}
