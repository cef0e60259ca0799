//! Proxy error types with HTTP status code mapping

use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use reveal_sync::{RateLimitStatus, SyncError};
use thiserror::Error;

use crate::routes::insert_rate_limit_headers;

/// Errors returned by the proxy's handlers
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Credential or document id missing; the proxy fails closed
    #[error("Proxy is not configured: missing {0}")]
    NotConfigured(String),

    /// Request body is not a valid state document
    #[error("Invalid state document: {0}")]
    BadRequest(String),

    /// Upstream document-store error
    #[error("{0}")]
    Upstream(#[from] SyncError),

    /// Startup configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProxyError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::NotConfigured(_) | ProxyError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(SyncError::RateLimited { .. }) => StatusCode::FORBIDDEN,
            ProxyError::Upstream(SyncError::RemoteUnavailable(_)) => StatusCode::BAD_GATEWAY,
            ProxyError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("text/plain; charset=utf-8"),
        );

        // A spent budget is reported the same way the document store does,
        // so proxied clients can tell it apart from other 403s.
        if let ProxyError::Upstream(SyncError::RateLimited { reset_at }) = &self {
            insert_rate_limit_headers(
                &mut headers,
                RateLimitStatus {
                    remaining: 0,
                    reset_at: *reset_at,
                },
            );
        }

        (status, headers, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ProxyError::NotConfigured("REVEAL_TOKEN".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::BadRequest("eof".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::from(SyncError::RateLimited { reset_at: 0 }).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ProxyError::from(SyncError::unavailable("down")).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::from(SyncError::CredentialMissing).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limited_response_carries_headers() {
        let response =
            ProxyError::from(SyncError::RateLimited { reset_at: 1_700_000_000_000 }).into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert_eq!(response.headers()["x-ratelimit-reset"], "1700000000");
    }
}
