//! Key-value storage for migration state.
//!
//! Everything the migration engine persists (raw records, status files,
//! identity tables, side-loaded lookup tables) goes through a
//! [`StorageBackend`]: a tiny get/set/list/delete interface keyed by relative
//! paths. There is no database; the production backend is a directory on
//! disk, and tests use an in-memory map.

pub mod backend;
pub mod error;
pub mod file;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::file::FileInfo;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
