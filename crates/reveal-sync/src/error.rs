//! Error types for reveal-sync

use reveal_core::Timestamp;
use thiserror::Error;

/// Errors from synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network failure, non-success status, timeout or malformed body
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// The remote refused the call because the rate budget is spent
    #[error("Rate limited until {reset_at} (epoch ms)")]
    RateLimited { reset_at: Timestamp },

    /// No cached snapshot to fall back to
    #[error("No cached snapshot available")]
    CacheMiss,

    /// A write was attempted without a usable credential
    #[error("Credential missing: writes to the document store need a token")]
    CredentialMissing,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Create a new RemoteUnavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::RemoteUnavailable(reason.into())
    }

    /// Whether the caller may fall back to its cache for this error
    pub fn is_degradable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_) | Self::RateLimited { .. })
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SyncError::RemoteUnavailable(format!("request timed out: {e}"))
        } else {
            SyncError::RemoteUnavailable(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::RemoteUnavailable(format!("malformed document: {e}"))
    }
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
