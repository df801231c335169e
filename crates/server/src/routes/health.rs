//! Health check endpoints.
//!
//! - `GET /health` - Liveness probe (always 200 if the server is up)
//! - `GET /health/ready` - Readiness probe (503 until the store answers)

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::state::ServerState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Active WebSocket connections.
    pub ws_connections: u64,
    pub bids_accepted: u64,
    pub bids_rejected: u64,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    /// Auction status as persisted.
    pub auction: String,
}

/// Liveness probe: `GET /health`
pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let metrics = &state.metrics;
    let (bids_accepted, bids_rejected) = metrics.bid_counts();

    Json(HealthResponse {
        status: "healthy",
        uptime_secs: state.uptime_secs(),
        ws_connections: metrics.ws_count(),
        bids_accepted,
        bids_rejected,
    })
}

/// Readiness probe: `GET /health/ready`
pub async fn ready(State(state): State<ServerState>) -> AppResult<Json<ReadyResponse>> {
    let snapshot = state.engine.snapshot().await.map_err(|e| {
        warn!(error = %e, "readiness check failed");
        AppError::Unavailable("store unreachable".into())
    })?;

    Ok(Json(ReadyResponse {
        ready: true,
        auction: snapshot.status.to_string(),
    }))
}
