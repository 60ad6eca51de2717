//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when running without storage
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Active storage backend, if connected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    /// Artifacts currently awaiting expiry
    pub pending_artifacts: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let storage = state.storage.backend_name().map(str::to_string);
    let status = if storage.is_some() { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        module: "osint-engine".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        storage,
        pending_artifacts: state.artifacts.len(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
