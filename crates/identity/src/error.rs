//! Identity Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An identity mapping error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for identity mapping operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading or writing the table through the storage backend failed.
    #[display("identity table storage failed")]
    Storage,
    /// The on-disk table isn't a JSON object of strings.
    #[display("identity table is corrupt: {}", _0.display())]
    Corrupt(#[error(not(source))] PathBuf),
    /// Natural keys must not be empty.
    #[display("empty natural key")]
    EmptyKey,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }
}
