//! Gateway Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A gateway error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies what went wrong talking to the remote API.
///
/// ### Fatal before any request
/// - [`ErrorKind::Configuration`]
///
/// ### Transient (retried internally)
/// - [`ErrorKind::RateLimited`]
/// - [`ErrorKind::Connection`]
///
/// ### Fatal
/// - [`ErrorKind::RetryExhausted`], wrapping the last transient failure
/// - [`ErrorKind::Http`]
/// - [`ErrorKind::Validation`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Credentials or options are missing or unusable.
    #[display("configuration error: {_0}")]
    Configuration(#[error(not(source))] String),
    /// The remote answered `429 Too Many Requests`.
    #[display("rate limited")]
    RateLimited,
    /// The request never produced an HTTP response.
    #[display("connection failed: {_0}")]
    Connection(#[error(not(source))] String),
    /// Transient failures persisted for every permitted attempt.
    #[display("gave up after {attempts} attempts")]
    RetryExhausted { attempts: u32 },
    /// Any other non-2xx status.
    #[display("HTTP {status} from {url}")]
    Http {
        status: u16,
        #[error(not(source))]
        url: String,
    },
    /// The response body does not have the expected shape.
    #[display("unexpected response shape: {_0}")]
    Validation(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// The gateway already retries these itself; callers seeing one directly
    /// got it from a [`Transport`](crate::Transport) without the retry loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Connection(_))
    }

    /// The HTTP status for [`Http`](Self::Http) errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
