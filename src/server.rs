//! # HTTP Server
//!
//! Command listener plus health and metrics endpoints, all on one port.
//!
//! Provides endpoints:
//! - `POST /` - Install a new reconciliation target (`{"webhook", "ca_dir", "ca_file"}`)
//! - `/status` - Active target and task state as JSON
//! - `/metrics` - Prometheus metrics in text format
//! - `/healthz` - Liveness probe (always returns 200)
//! - `/readyz` - Readiness probe (503 once shutdown has started)

use crate::metrics;
use crate::updater::{ReconcilerConfig, ReconcilerSupervisor};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Debug)]
pub struct ServerState {
    pub is_ready: AtomicBool,
    pub supervisor: Arc<ReconcilerSupervisor>,
}

impl ServerState {
    pub fn new(supervisor: Arc<ReconcilerSupervisor>) -> Self {
        Self {
            is_ready: AtomicBool::new(false),
            supervisor,
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::Relaxed);
    }
}

#[derive(Debug, Serialize)]
struct StatusBody {
    webhook: Option<String>,
    state: Option<String>,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", post(command_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` is cancelled
pub async fn start_server(
    port: u16,
    state: Arc<ServerState>,
    shutdown: CancellationToken,
) -> Result<(), anyhow::Error> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {}", addr);
    state.set_ready(true);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn command_handler(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> impl IntoResponse {
    let config: ReconcilerConfig = match serde_json::from_slice(&body) {
        Ok(config) => config,
        Err(e) => {
            warn!("Rejected command with undecodable body: {}", e);
            return (StatusCode::BAD_REQUEST, format!("invalid request body: {e}"));
        }
    };

    match state.supervisor.replace(config).await {
        Ok(()) => (StatusCode::OK, String::new()),
        Err(e) => {
            warn!("Rejected reconciliation target: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

async fn status_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let body = match state.supervisor.status() {
        Some(status) => StatusBody {
            webhook: Some(status.webhook_name),
            state: Some(status.state.as_str().to_string()),
        },
        None => StatusBody {
            webhook: None,
            state: None,
        },
    };
    Json(body)
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_text() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {e}").into_bytes(),
            )
        }
    }
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.is_ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
