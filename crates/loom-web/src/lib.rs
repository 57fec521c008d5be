//! loom-web — live dashboard over the running pipeline.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /` | embedded single-page dashboard |
//! | `GET /healthz` | liveness plus headline numbers |
//! | `GET /api/stats` | full aggregator [`Stats`](loom_core::aggregator::Stats) |
//! | `GET /ws` | WebSocket; one JSON text frame per record |
//!
//! The dashboard is just another hub subscriber: a slow browser loses records
//! like any other slow consumer and never stalls the pipeline.

use std::net::SocketAddr;

use anyhow::Context;
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use loom_core::aggregator::AggregatorHandle;
use loom_core::hub::HubHandle;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

mod ws;

const INDEX_HTML: &str = include_str!("assets/index.html");

/// What the handlers need from the pipeline.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub stats: AggregatorHandle,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/api/stats", get(stats))
        .route("/ws", get(ws::upgrade))
        .with_state(state)
}

/// Bind the dashboard listener; pair with [`serve`].
pub async fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid dashboard address {addr:?}"))?;
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind dashboard on {addr}"))
}

/// Serve on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "dashboard listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("dashboard server failed")?;

    tracing::debug!("dashboard stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    uptime: String,
    files_watched: usize,
    eps: f64,
    dropped_logs: u64,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.stats.snapshot();
    Json(Health {
        status: "ok",
        uptime: loom_core::aggregator::format_uptime(stats.uptime),
        files_watched: stats.files_watched,
        eps: stats.events_per_second,
        dropped_logs: stats.dropped_logs,
    })
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.stats.snapshot())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
