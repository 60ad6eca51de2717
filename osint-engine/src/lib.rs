//! osint-engine library - identity lookup aggregator
//!
//! Runs command-line intelligence tools against an email address, phone
//! number or username, normalizes their output and merges it into one
//! record with per-item provenance and confidence.

use axum::{middleware, Router};
use chrono::{DateTime, Utc};
use osint_common::StorageGateway;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod artifacts;
pub mod error;
pub mod maintenance;
pub mod merge;
pub mod orchestrator;
pub mod parsers;
pub mod tools;

pub use crate::error::{ApiError, ApiResult};

use crate::artifacts::ArtifactLifecycle;
use crate::orchestrator::Aggregator;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub storage: StorageGateway,
    pub artifacts: ArtifactLifecycle,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(aggregator: Aggregator, storage: StorageGateway) -> Self {
        let artifacts = aggregator.artifacts().clone();
        Self {
            aggregator: Arc::new(aggregator),
            storage,
            artifacts,
            startup_time: Utc::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::aggregate_routes())
        .merge(api::stats_routes())
        .merge(api::download_routes())
        .merge(api::health_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::track_visitor,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
