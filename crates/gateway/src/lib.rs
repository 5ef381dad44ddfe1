//! Client for the source CMS management API.
//!
//! A [`Gateway`] is bound to one space and gives paginated, authenticated
//! access to its stories, components, assets and datasources. Rate limiting
//! (`429`) and dropped connections are absorbed by a bounded exponential
//! backoff; everything else surfaces as a typed [`error::ErrorKind`].
//!
//! Nothing is cached: every call is a fresh read.

mod client;
pub mod error;
pub mod models;
mod transport;

pub use crate::client::{
    Credentials, DEFAULT_BASE_URL, FALLBACK_PER_PAGE, Gateway, GatewayOptions, ListQuery, Page, RetryPolicy,
};
#[cfg(any(test, feature = "mock"))]
pub use crate::transport::ScriptedTransport;
pub use crate::transport::{HttpTransport, Request, Response, Transport};
