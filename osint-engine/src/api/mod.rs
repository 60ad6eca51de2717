//! HTTP API handlers

pub mod aggregate;
pub mod downloads;
pub mod health;
pub mod stats;
pub mod visitors;

pub use aggregate::aggregate_routes;
pub use downloads::download_routes;
pub use health::health_routes;
pub use stats::stats_routes;
pub use visitors::track_visitor;
