//! HTTP route handlers and router configuration

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use reveal_core::SharedState;
use reveal_sync::rate_limit::{REMAINING_HEADER, RESET_HEADER};
use reveal_sync::{RateLimitStatus, SyncError};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::error::ProxyError;
use crate::state::AppState;

/// How long browsers may cache a preflight answer
pub const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Build the proxy router
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.allowed_origins());

    Router::new()
        .route("/state", get(get_state).post(put_state))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// CORS policy: allow-listed origins only, `GET`/`POST`, JSON bodies,
/// credentials allowed.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid allowed origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
        .expose_headers([
            HeaderName::from_static(REMAINING_HEADER),
            HeaderName::from_static(RESET_HEADER),
        ])
        .max_age(CORS_MAX_AGE)
}

/// Write the rate-limit headers in the document store's format
/// (reset in epoch seconds).
pub(crate) fn insert_rate_limit_headers(headers: &mut HeaderMap, status: RateLimitStatus) {
    headers.insert(REMAINING_HEADER, HeaderValue::from(status.remaining));
    headers.insert(RESET_HEADER, HeaderValue::from(status.reset_at / 1000));
}

/// Forward the last upstream budget unless the response already carries one
fn echo_rate_limit(state: &AppState, response: &mut Response) {
    if response.headers().contains_key(REMAINING_HEADER) {
        return;
    }
    if let Some(status) = state.limiter().observed_status() {
        insert_rate_limit_headers(response.headers_mut(), status);
    }
}

fn respond(state: &AppState, result: Result<Response, ProxyError>) -> Response {
    let mut response = result.unwrap_or_else(IntoResponse::into_response);
    echo_rate_limit(state, &mut response);
    response
}

/// `GET /state`: the current document as raw JSON
async fn get_state(State(state): State<Arc<AppState>>) -> Response {
    let result = read_document(&state).await;
    respond(&state, result)
}

/// `POST /state`: replace the document, empty 200 on success
async fn put_state(State(state): State<Arc<AppState>>, body: String) -> Response {
    let result = write_document(&state, &body).await;
    respond(&state, result)
}

async fn read_document(state: &AppState) -> Result<Response, ProxyError> {
    let upstream = state.upstream()?;
    state.check_budget()?;

    let document = upstream.fetch_document().await.inspect_err(|e| {
        warn!(error = %e, "Upstream read failed");
    })?;
    let body = document.to_json().map_err(SyncError::from)?;
    debug!(version = document.last_updated, "Served state");

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

async fn write_document(state: &AppState, body: &str) -> Result<Response, ProxyError> {
    let upstream = state.upstream()?;
    let document =
        SharedState::from_json(body).map_err(|e| ProxyError::BadRequest(e.to_string()))?;
    state.check_budget()?;

    upstream.put_document(&document).await.inspect_err(|e| {
        warn!(error = %e, "Upstream write failed");
    })?;
    debug!(version = document.last_updated, "Stored state");

    Ok(StatusCode::OK.into_response())
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}
