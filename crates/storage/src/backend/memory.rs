//! In-memory storage backend, used by tests across the workspace.

use super::FileInfoStream;
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::file::FileInfo;
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use time::UtcDateTime;
use tokio::sync::RwLock;

/// In-memory storage backend.
///
/// Payloads live in a `HashMap` behind a [`RwLock`]. Replacing a value is a
/// single map insert, which trivially satisfies the durability contract.
///
/// # Examples
///
/// ```ignore
/// use decant_storage::backend::{MemoryBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MemoryBackend::with_files([
///     ("stories/_status.json", b"{}"),
/// ]);
/// assert!(backend.exists(Path::new("stories/_status.json")).await?);
///
/// backend.write(Path::new("mapping.json"), b"[]").await?;
/// assert!(backend.exists(Path::new("mapping.json")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MemoryBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, (UtcDateTime, Vec<u8>)>>,
    /// Remaining writes and deletes before every one fails; simulates a crash
    /// mid-run.
    write_budget: Option<AtomicUsize>,
}
impl MemoryBackend {
    /// Create a memory backend pre-populated with payloads.
    ///
    /// Panics if any key fails validation. Broken test setup should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = UtcDateTime::now();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MemoryBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self {
            name: "memory".to_string(),
            storage: RwLock::new(map),
            write_budget: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Allow `writes` successful mutations (writes and deletes), then fail
    /// every following one with a [`BackendError`](ErrorKind::BackendError).
    pub fn with_write_limit(mut self, writes: usize) -> Self {
        self.write_budget = Some(AtomicUsize::new(writes));
        self
    }

    /// Lift a limit set by [`with_write_limit()`](Self::with_write_limit).
    pub fn lift_write_limit(&self) {
        if let Some(budget) = &self.write_budget {
            budget.store(usize::MAX, Ordering::SeqCst);
        }
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.storage.read().await.is_empty()
    }

    fn take_write_budget(&self) -> bool {
        match &self.write_budget {
            None => true,
            Some(budget) => budget.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok(),
        }
    }
}
impl Default for MemoryBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot under the read lock; never hold it across a yield.
            let entries: Vec<(PathBuf, UtcDateTime, u64)> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .filter(|(path, _)| match &validated_prefix {
                        Some(pfx) => path.starts_with(pfx),
                        None => true,
                    })
                    .map(|(path, (inserted, data))| (path.clone(), *inserted, data.len() as u64))
                    .collect()
            };
            for (path, inserted, size) in entries {
                yield Ok(FileInfo::new(path, size, inserted));
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.storage.read().await.contains_key(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let (_inserted, data) =
            self.storage.read().await.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))?;
        Ok(data)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        if !self.take_write_budget() {
            exn::bail!(ErrorKind::BackendError(format!("write limit reached at {}", path.display())));
        }
        self.storage.write().await.insert(path, (UtcDateTime::now(), data.to_vec()));
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        if !self.take_write_budget() {
            exn::bail!(ErrorKind::BackendError(format!("write limit reached deleting {}", path.display())));
        }
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }
}
