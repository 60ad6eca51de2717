//! Visitor tracking middleware
//!
//! Records one visitor event per request to `/` or `/api/*`. Storage
//! failures are absorbed by the gateway and never fail the request.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::debug;

use crate::AppState;

const UNKNOWN_IP: &str = "unknown";

/// Paths that count as a visit
pub fn is_tracked_path(path: &str) -> bool {
    path == "/" || path.starts_with("/api/")
}

/// Client IP: first `x-forwarded-for` hop, then `x-real-ip`, then the peer
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

pub async fn track_visitor(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if is_tracked_path(request.uri().path()) {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let ip = client_ip(request.headers(), peer);
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if state.storage.record_visitor(&ip, user_agent.as_deref()).await {
            debug!(ip = %ip, "Visitor tracked");
        }
    }

    next.run(request).await
}
