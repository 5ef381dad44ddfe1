//! Staging Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A staging error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for staging operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The storage backend failed; the error tree holds the cause.
    #[display("staging storage failed")]
    Storage,
    /// A stored payload could not be decoded.
    #[display("corrupt staging file: {}", _0.display())]
    Corrupt(#[error(not(source))] PathBuf),
    /// A payload could not be encoded for storage.
    #[display("cannot encode {_0}")]
    Encode(#[error(not(source))] String),
    /// The key is reserved or otherwise unusable.
    #[display("invalid staging key: {_0}")]
    InvalidKey(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }
}
