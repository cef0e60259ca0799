//! Remote state store adapters
//!
//! The shared document lives in a remote store that only offers whole-document
//! reads and writes. Two transports reach it:
//!
//! - [`DocumentStoreClient`]: talks to the document-store REST API directly
//!   with a bearer credential. Development fallback only, since it needs the
//!   write credential in the client process.
//! - [`ProxyClient`]: talks to a trusted proxy that holds the credential.
//!
//! Both report the store's rate-limit headers to the shared
//! [`RateLimiter`](crate::RateLimiter).

mod direct;
mod memory;
mod proxied;

pub use direct::{DocumentStoreClient, DocumentStoreSettings};
pub use memory::{InMemoryRemoteStore, InjectedFailure};
pub use proxied::ProxyClient;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reveal_core::SharedState;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::rate_limit::{RateLimitHeaders, RateLimiter};

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Whole-document access to the remote store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read the current document
    async fn fetch_document(&self) -> Result<SharedState>;

    /// Replace the document
    async fn put_document(&self, state: &SharedState) -> Result<()>;
}

/// Record rate-limit headers and turn a non-success status into an error.
///
/// A 403 whose headers report an empty budget becomes
/// [`SyncError::RateLimited`]; every other failure is
/// [`SyncError::RemoteUnavailable`].
pub(crate) async fn check_response(
    response: reqwest::Response,
    limiter: &RateLimiter,
) -> Result<reqwest::Response> {
    let observed = RateLimitHeaders::parse(response.headers());
    limiter.record_headers(&observed);

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::FORBIDDEN && observed.is_exhausted() {
        let reset_at = observed.reset_at().unwrap_or(0);
        debug!(reset_at, "Remote reported exhausted rate budget");
        return Err(SyncError::RateLimited { reset_at });
    }

    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::unavailable(format!(
        "unexpected status {} from {}: {}",
        status,
        url,
        body.trim()
    )))
}

pub(crate) fn http_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))
}
