//! Operational HTTP endpoints
//!
//! `GET /health` and `GET /stats`, served by axum on a separate listener
//! from the WebSocket port. Both query the SocketServer actor through
//! oneshot replies, so every response is a consistent snapshot of live
//! state.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::server::{HealthSnapshot, ServerCommand, StatsSnapshot};

/// Liveness response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub snapshot: HealthSnapshot,
    pub timestamp: String,
}

/// Build the operational router
pub fn router(cmd_tx: mpsc::Sender<ServerCommand>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(cmd_tx)
}

async fn health(
    State(cmd_tx): State<mpsc::Sender<ServerCommand>>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let (reply, rx) = oneshot::channel();
    cmd_tx
        .send(ServerCommand::GetHealth { reply })
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    let snapshot = rx.await.map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(HealthResponse {
        status: "OK",
        snapshot,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

async fn stats(
    State(cmd_tx): State<mpsc::Sender<ServerCommand>>,
) -> Result<Json<StatsSnapshot>, StatusCode> {
    let (reply, rx) = oneshot::channel();
    cmd_tx
        .send(ServerCommand::GetStats { reply })
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    let snapshot = rx.await.map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(snapshot))
}
