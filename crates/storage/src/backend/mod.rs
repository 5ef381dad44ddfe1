//! Storage backend trait and implementations.
//!
//! This module defines the [`StorageBackend`] trait: the key-value interface
//! (get/set/list/delete) the rest of the migration engine persists through.

mod local;
#[cfg(any(test, feature = "memory"))]
mod memory;

pub use self::local::LocalBackend;
#[cfg(any(test, feature = "memory"))]
pub use self::memory::MemoryBackend;
use crate::error::Result;
use crate::file::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface for storage backends.
///
/// Keys are relative paths below the backend's root and are validated with
/// [`validate_path`](crate::validate_path) by every implementation.
///
/// # Durability
/// [`write()`](Self::write) must replace the previous payload as a whole:
/// a reader (or a process restarted after a crash) sees either the old or
/// the new payload, never a mix or a truncated file. Status records and
/// identity tables rely on this.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use decant_storage::{backend::StorageBackend, error::Result};
///
/// async fn status_size(backend: &dyn StorageBackend) -> Result<u64> {
///     let key = Path::new("stories/_status.json");
///     if backend.exists(key).await? {
///         Ok(backend.read(key).await?.len() as u64)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend, for logging only.
    fn name(&self) -> &str;

    /// List all keys below an optional prefix.
    ///
    /// Default implementation collects [`list_stream()`](Self::list_stream)
    /// into a [`Vec`].
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream metadata for all keys below an optional prefix.
    ///
    /// The prefix is matched per path component, so `stories/person` matches
    /// `stories/person/42-jane-doe.json` but not `stories/personnel/…`.
    /// Listing a prefix that doesn't exist yields nothing rather than an
    /// error.
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// use std::path::Path;
    /// # use decant_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut stream = backend.list_stream(Some(Path::new("stories")));
    /// while let Some(info) = stream.try_next().await? {
    ///     println!("{}: {} bytes", info.path.display(), info.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Check if a key exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read a payload.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the key
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create or replace a payload.
    ///
    /// Implementations create intermediate directories as needed and must
    /// honour the durability contract described on the trait.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Delete a payload.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the key
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;
}
