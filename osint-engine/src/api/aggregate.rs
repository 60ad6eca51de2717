//! Lookup endpoint
//!
//! `POST /api/aggregate {"query": "..."}` runs every applicable tool and
//! returns the merged record. Tool failures never fail the request; only an
//! empty or oversized query does.

use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use osint_common::AggregatedRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AggregateRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct AggregateResponse {
    pub success: bool,
    pub data: AggregatedRecord,
}

/// POST /api/aggregate
pub async fn aggregate(
    State(state): State<AppState>,
    request: Result<Json<AggregateRequest>, JsonRejection>,
) -> ApiResult<Json<AggregateResponse>> {
    let Json(request) = request.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let record = state.aggregator.aggregate(&request.query).await?;
    Ok(Json(AggregateResponse {
        success: true,
        data: record,
    }))
}

pub fn aggregate_routes() -> Router<AppState> {
    Router::new().route("/api/aggregate", post(aggregate))
}
