//! Artifact downloads
//!
//! Holehe's CSV report stays on disk until its artifact TTL runs out; this
//! route hands out the most recently registered one.

use crate::parsers::holehe;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::io::ErrorKind;
use tracing::warn;

/// GET /api/download-holehe-csv
pub async fn download_holehe_csv(State(state): State<AppState>) -> ApiResult<Response> {
    let not_found = || ApiError::NotFound("No Holehe CSV files found".to_string());

    let path = state
        .artifacts
        .latest_registered(holehe::is_results_csv)
        .ok_or_else(not_found)?;

    let content = match tokio::fs::read(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read holehe CSV");
            return Err(ApiError::Internal("Failed to download CSV file".to_string()));
        }
    };

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().replace('"', "_"))
        .unwrap_or_else(|| "holehe_results.csv".to_string());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        content,
    )
        .into_response())
}

pub fn download_routes() -> Router<AppState> {
    Router::new().route("/api/download-holehe-csv", get(download_holehe_csv))
}
