//! Sync orchestration: brings each resource kind of a space up to date in
//! staging, full or incremental, then runs the transform pass.
//!
//! ```no_run
//! use decant_gateway::{Credentials, Gateway, GatewayOptions};
//! use decant_staging::StagingStore;
//! use decant_storage::backend::LocalBackend;
//! use decant_sync::error::ErrorKind;
//! use decant_sync::{Migration, MigrationOptions};
//! use exn::ResultExt;
//! use std::sync::Arc;
//!
//! # async fn example() -> decant_sync::error::Result<()> {
//! let credentials = Credentials::new("token", "12345");
//! let gateway = Gateway::http(credentials, GatewayOptions::default()).or_raise(|| ErrorKind::Gateway)?;
//! let backend = LocalBackend::new("migration", "/var/lib/decant/12345").or_raise(|| ErrorKind::Staging)?;
//! let backend = Arc::new(backend);
//! let migration = Migration::new(gateway, Arc::new(StagingStore::new(backend)), MigrationOptions::default());
//! let report = migration.run().await?;
//! for sync in &report.syncs {
//!     println!("{}: {} new, {} deleted", sync.kind, sync.stats.new, sync.stats.deleted);
//! }
//! # Ok(())
//! # }
//! ```

mod driver;
pub mod error;
mod migration;
mod plan;
mod report;
mod resource;

pub use crate::migration::{Migration, MigrationOptions};
pub use crate::plan::plan;
pub use crate::report::{MigrationReport, SkippedRecord, SyncReport, TransformReport};
