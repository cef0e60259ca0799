//! Client for the credential-holding proxy

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reveal_core::SharedState;
use tracing::{debug, instrument};

use super::{DEFAULT_REQUEST_TIMEOUT, RemoteStore, check_response, http_client};
use crate::error::{Result, SyncError};
use crate::rate_limit::RateLimiter;

const USER_AGENT: &str = concat!("reveal-sync/", env!("CARGO_PKG_VERSION"));

/// [`RemoteStore`] that goes through the proxy's `/state` endpoint
///
/// `GET {base}/state` returns the document, `POST {base}/state` replaces it.
/// The proxy forwards the upstream rate-limit headers, so the local limiter
/// sees the same budget as a direct client would.
#[derive(Debug)]
pub struct ProxyClient {
    state_url: String,
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
}

impl ProxyClient {
    /// Client for the proxy at `base_url` with the default request timeout
    pub fn new(base_url: &str, limiter: Arc<RateLimiter>) -> Result<Self> {
        Self::with_timeout(base_url, limiter, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Client with an explicit request timeout. Fails on a blank URL.
    pub fn with_timeout(
        base_url: &str,
        limiter: Arc<RateLimiter>,
        timeout: Duration,
    ) -> Result<Self> {
        let base = base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(SyncError::Config("proxy URL is required".to_string()));
        }
        Ok(Self {
            state_url: format!("{base}/state"),
            http: http_client(timeout, USER_AGENT)?,
            limiter,
        })
    }

    /// Full URL of the proxied document
    pub fn state_url(&self) -> &str {
        &self.state_url
    }
}

#[async_trait]
impl RemoteStore for ProxyClient {
    #[instrument(skip(self), fields(url = %self.state_url))]
    async fn fetch_document(&self) -> Result<SharedState> {
        let response = self.http.get(&self.state_url).send().await?;
        let response = check_response(response, &self.limiter).await?;

        let body = response.text().await?;
        let state = SharedState::from_json(&body)?;
        debug!(version = state.last_updated, "Fetched document via proxy");
        Ok(state)
    }

    #[instrument(skip(self, state), fields(url = %self.state_url, version = state.last_updated))]
    async fn put_document(&self, state: &SharedState) -> Result<()> {
        let response = self
            .http
            .post(&self.state_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(state.to_json()?)
            .send()
            .await?;
        check_response(response, &self.limiter).await?;
        Ok(())
    }
}
