//! Assets: metadata and binary stored apart.
//!
//! Metadata lives at `assets/metadata/<id>.json`, the binary at
//! `assets/files/<id>-<filename>`. [`has_asset_binary()`] answers by id
//! prefix alone, so a run interrupted between metadata and binary picks up
//! where it left off. Writing a binary replaces any file stored for the same
//! id under an older name.
//!
//! [`has_asset_binary()`]: StagingStore::has_asset_binary

use crate::error::{ErrorKind, Result};
use crate::kind::ResourceKind;
use crate::naming::sanitize;
use crate::store::StagingStore;
use decant_gateway::models::Asset;
use exn::ResultExt;
use std::collections::BTreeSet;
use std::path::PathBuf;

fn metadata_dir() -> PathBuf {
    ResourceKind::Assets.dir().join("metadata")
}

fn files_dir() -> PathBuf {
    ResourceKind::Assets.dir().join("files")
}

impl StagingStore {
    pub fn asset_metadata_path(id: u64) -> PathBuf {
        metadata_dir().join(format!("{id}.json"))
    }

    pub fn asset_binary_path(asset: &Asset) -> PathBuf {
        let name = sanitize(asset.basename());
        match name.trim_matches('.') {
            "" => files_dir().join(format!("{}.bin", asset.id)),
            _ => files_dir().join(format!("{}-{name}", asset.id)),
        }
    }

    pub async fn write_asset(&self, asset: &Asset) -> Result<()> {
        self.write_json(&Self::asset_metadata_path(asset.id), asset).await
    }

    pub async fn read_asset(&self, id: u64) -> Result<Option<Asset>> {
        self.read_json(&Self::asset_metadata_path(id)).await
    }

    /// Ids with stored metadata.
    pub async fn asset_ids(&self) -> Result<BTreeSet<u64>> {
        self.ids_in(&metadata_dir()).await
    }

    /// Ids with a stored binary, whatever its file name.
    pub async fn asset_binary_ids(&self) -> Result<BTreeSet<u64>> {
        self.ids_in(&files_dir()).await
    }

    /// Keys of every stored binary.
    pub async fn asset_binary_paths(&self) -> Result<BTreeSet<PathBuf>> {
        let dir = files_dir();
        Ok(self.list_files(&dir).await?.into_iter().filter(|f| f.is_child_of(&dir)).map(|f| f.path).collect())
    }

    pub async fn has_asset_binary(&self, id: u64) -> Result<bool> {
        Ok(!self.files_for_id(&files_dir(), id).await?.is_empty())
    }

    /// Store the binary under the asset's current name, then drop files left
    /// from earlier names.
    pub async fn write_asset_binary(&self, asset: &Asset, bytes: &[u8]) -> Result<PathBuf> {
        let path = Self::asset_binary_path(asset);
        self.backend.write(&path, bytes).await.or_raise(|| ErrorKind::Storage)?;
        for stale in self.files_for_id(&files_dir(), asset.id).await? {
            if stale != path {
                tracing::debug!(id = asset.id, stale = %stale.display(), "replaced renamed binary");
                self.delete_file(&stale).await?;
            }
        }
        Ok(path)
    }

    /// Remove metadata and every binary of an asset. `false` if neither
    /// existed.
    pub async fn remove_asset(&self, id: u64) -> Result<bool> {
        let mut removed = self.delete_file(&Self::asset_metadata_path(id)).await?;
        for path in self.files_for_id(&files_dir(), id).await? {
            removed |= self.delete_file(&path).await?;
        }
        Ok(removed)
    }

    /// Raw binary of an asset, if downloaded.
    pub async fn read_asset_binary(&self, id: u64) -> Result<Option<Vec<u8>>> {
        match self.files_for_id(&files_dir(), id).await?.first() {
            Some(path) => self.read_bytes(path).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::store::StagingStore;
    use decant_gateway::models::Asset;
    use decant_storage::StorageBackend;
    use decant_storage::backend::MemoryBackend;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn asset(id: u64, url: &str) -> Asset {
        serde_json::from_value(json!({"id": id, "filename": url, "alt": "Logo"})).unwrap()
    }

    #[test]
    fn test_binary_path() {
        let logo = asset(7, "https://a.example.com/f/1/logo final.png");
        assert_eq!(StagingStore::asset_binary_path(&logo), Path::new("assets/files/7-logo_final.png"));
        let bare = asset(8, "https://a.example.com/f/1/");
        assert_eq!(StagingStore::asset_binary_path(&bare), Path::new("assets/files/8.bin"));
    }

    #[tokio::test]
    async fn test_metadata_and_binary_independent() {
        let backend = Arc::new(MemoryBackend::default());
        let store = StagingStore::new(backend.clone());
        let logo = asset(7, "https://a.example.com/f/1/logo.png");
        store.write_asset(&logo).await.unwrap();
        assert!(!store.has_asset_binary(7).await.unwrap());

        store.write_asset_binary(&logo, b"PNG").await.unwrap();
        assert!(store.has_asset_binary(7).await.unwrap());
        assert_eq!(store.read_asset(7).await.unwrap().unwrap().alt.as_deref(), Some("Logo"));
        assert_eq!(store.read_asset_binary(7).await.unwrap(), Some(b"PNG".to_vec()));
        assert!(backend.exists(Path::new("assets/metadata/7.json")).await.unwrap());
    }

    #[tokio::test]
    async fn test_binary_presence_by_id_prefix() {
        // Uploaded under another name in an earlier run.
        let backend = Arc::new(MemoryBackend::with_files([
            ("assets/files/7-old-name.png", "PNG"),
            ("assets/files/77-other.png", "PNG"),
        ]));
        let store = StagingStore::new(backend);
        assert!(store.has_asset_binary(7).await.unwrap());
        assert!(!store.has_asset_binary(777).await.unwrap());
        assert_eq!(store.asset_binary_ids().await.unwrap(), BTreeSet::from([7, 77]));
    }

    #[tokio::test]
    async fn test_renamed_binary_replaces_old_file() {
        let backend = Arc::new(MemoryBackend::with_files([
            ("assets/files/7-old-name.png", "OLD"),
            ("assets/files/77-other.png", "PNG"),
        ]));
        let store = StagingStore::new(backend.clone());
        let renamed = asset(7, "https://a.example.com/f/1/new-name.png");

        let path = store.write_asset_binary(&renamed, b"NEW").await.unwrap();
        assert_eq!(path, Path::new("assets/files/7-new-name.png"));
        assert!(!backend.exists(Path::new("assets/files/7-old-name.png")).await.unwrap());
        assert_eq!(store.read_asset_binary(7).await.unwrap(), Some(b"NEW".to_vec()));
        assert_eq!(
            store.asset_binary_paths().await.unwrap(),
            BTreeSet::from([PathBuf::from("assets/files/7-new-name.png"), PathBuf::from("assets/files/77-other.png")])
        );
    }

    #[tokio::test]
    async fn test_remove_asset() {
        let store = StagingStore::new(Arc::new(MemoryBackend::default()));
        let logo = asset(7, "https://a.example.com/f/1/logo.png");
        store.write_asset(&logo).await.unwrap();
        store.write_asset_binary(&logo, b"PNG").await.unwrap();
        assert!(store.remove_asset(7).await.unwrap());
        assert!(!store.has_asset_binary(7).await.unwrap());
        assert_eq!(store.read_asset(7).await.unwrap(), None);
        assert!(!store.remove_asset(7).await.unwrap());
    }
}
