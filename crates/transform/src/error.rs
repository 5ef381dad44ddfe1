//! Transform Error Types
//!
//! Only structurally unusable records are errors. Everything recoverable is a
//! [`DataWarning`](crate::DataWarning) on the result instead.

use derive_more::{Display, Error};

/// A transform error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for transform operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The record has no natural key (empty slug) to identify it by.
    #[display("story {id} has no natural key")]
    MissingNaturalKey { id: u64 },
    /// No transform is registered for the record's category.
    #[display("no transform registered for content type `{_0}`")]
    UnsupportedContentType(#[error(not(source))] String),
    /// Looking up or minting the destination id failed.
    #[display("destination id assignment failed")]
    Identity,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Returns `true` if the record should be skipped rather than abort a
    /// transform pass.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::MissingNaturalKey { .. } | Self::UnsupportedContentType(_))
    }
}
