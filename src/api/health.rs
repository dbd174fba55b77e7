//! Health check endpoint.

use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::json;

/// `GET /health` — liveness with uptime.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let uptime = (chrono::Utc::now() - state.startup_time).num_seconds();
    Json(json!({
        "status": "ok",
        "service": "mixtable",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": uptime,
    }))
}
