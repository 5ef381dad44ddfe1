//! Sync Error Types

use derive_more::{Display, Error};

/// A sync error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which collaborator failed. The error tree carries the details; a failed
/// kind leaves its status record marked as started but not completed.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Talking to the remote API failed.
    #[display("remote API request failed")]
    Gateway,
    /// Reading or writing staged content failed.
    #[display("staging store failed")]
    Staging,
    /// A record could not be transformed and could not be skipped.
    #[display("transform failed")]
    Transform,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Every sync is resumable, so rerunning after any failure is safe; this
    /// only says whether it's likely to help without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway | Self::Staging)
    }
}
