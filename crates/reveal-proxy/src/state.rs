//! Shared handler state

use std::sync::Arc;

use reveal_core::{Clock, SystemClock};
use reveal_sync::{DocumentStoreClient, RateLimiter, RemoteStore, SyncError};
use tracing::warn;

use crate::config::ProxyConfig;
use crate::error::ProxyError;

/// State shared by all handlers
///
/// `upstream` is `None` when the credential or the document id is missing.
/// The server still starts so that misconfiguration shows up as a 500 on
/// every request instead of a dead endpoint.
pub struct AppState {
    upstream: Option<Arc<dyn RemoteStore>>,
    missing: Vec<&'static str>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    allowed_origins: Vec<String>,
}

impl AppState {
    /// Build the state for a resolved configuration
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ProxyError> {
        let limiter = Arc::new(RateLimiter::new());
        let Some(settings) = config.document_store() else {
            let missing = config.missing_settings();
            warn!(?missing, "Required settings missing, every request will fail");
            return Ok(Self::unconfigured(missing, config.allowed_origins.clone()));
        };

        let client = DocumentStoreClient::with_timeout(settings, limiter.clone(), config.request_timeout)
            .map_err(|e| ProxyError::Config(e.to_string()))?;
        Ok(Self::with_upstream(
            Arc::new(client),
            limiter,
            config.allowed_origins.clone(),
        ))
    }

    /// State forwarding to `upstream`
    pub fn with_upstream(
        upstream: Arc<dyn RemoteStore>,
        limiter: Arc<RateLimiter>,
        allowed_origins: Vec<String>,
    ) -> Self {
        Self {
            upstream: Some(upstream),
            missing: Vec::new(),
            limiter,
            clock: Arc::new(SystemClock),
            allowed_origins,
        }
    }

    /// State that rejects every request
    pub fn unconfigured(missing: Vec<&'static str>, allowed_origins: Vec<String>) -> Self {
        Self {
            upstream: None,
            missing,
            limiter: Arc::new(RateLimiter::new()),
            clock: Arc::new(SystemClock),
            allowed_origins,
        }
    }

    /// Replace the clock used for rate-limit decisions
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Whether an upstream store is available
    pub fn is_configured(&self) -> bool {
        self.upstream.is_some()
    }

    /// Budget shared with the upstream client
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Origins granted by the CORS policy
    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    /// The upstream store, or the fail-closed error
    pub fn upstream(&self) -> Result<&Arc<dyn RemoteStore>, ProxyError> {
        self.upstream
            .as_ref()
            .ok_or_else(|| ProxyError::NotConfigured(self.missing.join(", ")))
    }

    /// Refuse to spend a call while the upstream budget is exhausted
    pub fn check_budget(&self) -> Result<(), ProxyError> {
        if self.limiter.should_skip(self.clock.now_millis()) {
            let reset_at = self.limiter.status().reset_at;
            return Err(SyncError::RateLimited { reset_at }.into());
        }
        Ok(())
    }
}
