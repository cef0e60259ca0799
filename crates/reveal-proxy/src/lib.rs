//! # Reveal Proxy
//!
//! Small HTTP service that holds the document-store credential so browser
//! sessions never see it. It exposes the shared document at `/state`:
//!
//! - `GET /state` returns the document as JSON
//! - `POST /state` replaces it with the request body
//!
//! Only allow-listed origins pass CORS. Without a credential or a document
//! id the proxy still starts but answers every request with a 500.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ProxyArgs, ProxyConfig, ProxyFileConfig};
pub use error::ProxyError;
pub use routes::build_router;
pub use state::AppState;

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

/// Serve the proxy on `listener` until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, configured = state.is_configured(), "Proxy listening");
    }
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Bind the configured address and serve until Ctrl-C
pub async fn run(config: ProxyConfig) -> Result<(), ProxyError> {
    let state = Arc::new(AppState::from_config(&config)?);
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|e| ProxyError::Config(format!("bind {}: {e}", config.listen_addr)))?;

    serve(listener, state, shutdown_signal())
        .await
        .map_err(|e| ProxyError::Config(format!("server error: {e}")))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
