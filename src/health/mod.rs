//! Liveness responder: minimal Axum server for process health checks.
//!
//! Always answers 200 while the process is up; it carries no scanner state.

use anyhow::{Context, Result};
use axum::{http::StatusCode, routing::get, Router};
use tracing::{error, info};

/// Bind `0.0.0.0:port` and serve the liveness routes in a background task.
///
/// Binding happens before this returns so a taken port is reported to the
/// caller instead of being lost inside the task.
pub async fn spawn_liveness(port: u16) -> Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind liveness port {port}"))?;

    info!(port, "Liveness endpoint listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, build_router()).await {
            error!(error = %e, "Liveness server stopped");
        }
    });

    Ok(())
}

/// Build the router: `/` and `/health` both return 200.
pub fn build_router() -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/health", get(alive))
}

async fn alive() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
