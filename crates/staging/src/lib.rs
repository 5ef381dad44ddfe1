//! Durable staging of fetched content.
//!
//! [`StagingStore`] sits on top of a [`StorageBackend`](decant_storage::StorageBackend)
//! and knows where each resource kind lives, how stories are partitioned,
//! how assets split metadata from binaries and how the per-kind
//! [`DownloadStatus`] is read back (backfilling older records). Absence is
//! always `None`, never an error.

mod assets;
pub mod error;
mod kind;
mod manifest;
pub mod naming;
mod records;
mod status;
mod store;
mod stories;
mod translations;

pub use crate::kind::{ResourceKind, STATUS_FILE};
pub use crate::manifest::{MappingEntry, MappingManifest};
pub use crate::status::{DownloadStatus, SyncMode, SyncStats};
pub use crate::store::{MANIFEST_FILE, SPACE_FILE, StagingStore};
pub use crate::translations::Translations;
