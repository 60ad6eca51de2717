//! Operational endpoints
//!
//! Counters, search history, counter reset and on-demand artifact cleanup.
//! All of them keep working without storage, answering with zeros and empty
//! lists.

use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use osint_common::storage::SearchLogEntry;
use serde::{Deserialize, Serialize};

const DEFAULT_HISTORY_LIMIT: i64 = 10;
const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub visitors_today: i64,
    pub total_visitors: i64,
    pub searches: i64,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.storage.get_stats().await;
    Json(StatsResponse {
        visitors_today: stats.visitors_today,
        total_visitors: stats.total_visitors,
        searches: stats.search_count,
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub data: Vec<SearchLogEntry>,
    pub limit: i64,
    pub timestamp: DateTime<Utc>,
}

/// Requested history size, clamped to 1..=100
pub fn history_limit(requested: Option<i64>) -> i64 {
    match requested {
        Some(n) if n > 0 => n.min(MAX_HISTORY_LIMIT),
        _ => DEFAULT_HISTORY_LIMIT,
    }
}

/// GET /api/search-history?limit=N
pub async fn get_search_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Json<HistoryResponse> {
    let limit = history_limit(params.limit);
    let data = state.storage.get_history(limit).await;
    Json(HistoryResponse {
        success: true,
        data,
        limit,
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/reset-counts
pub async fn reset_counts(State(state): State<AppState>) -> ApiResult<Json<MessageResponse>> {
    if !state.storage.reset_counts().await {
        return Err(ApiError::Internal("Failed to reset counts".to_string()));
    }

    Ok(Json(MessageResponse {
        success: true,
        message: "All visitor and search counts have been reset to zero".to_string(),
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub success: bool,
    pub message: String,
    pub deleted_files: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/cleanup-files
pub async fn cleanup_files(State(state): State<AppState>) -> Json<CleanupResponse> {
    let deleted_files: Vec<String> = state
        .artifacts
        .sweep_expired()
        .await
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    Json(CleanupResponse {
        success: true,
        message: format!("Cleaned up {} expired files", deleted_files.len()),
        deleted_files,
        timestamp: Utc::now(),
    })
}

pub fn stats_routes() -> Router<AppState> {
    Router::new()
        .route("/api/stats", get(get_stats))
        .route("/api/search-history", get(get_search_history))
        .route("/api/reset-counts", post(reset_counts))
        .route("/api/cleanup-files", post(cleanup_files))
}
