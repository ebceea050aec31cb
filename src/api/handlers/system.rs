//! System endpoints: health check and relay settings.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    rooms: usize,
    connections: usize,
    sessions: usize,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, current timestamp, and live room, connection, and session counts.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            rooms: state.registry.len().await,
            connections: state.registry.connection_count().await,
            sessions: state.sessions.active(),
        }),
    )
}

/// Relay settings as seen by clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct RelaySettingsResponse {
    /// Room capacity (`null` when rooms are unbounded).
    room_capacity: Option<usize>,
    /// Seconds between server pings.
    ping_interval_secs: u64,
    /// Seconds of silence after which a connection is dropped.
    read_deadline_secs: u64,
    /// Frames buffered per connection before it is treated as stalled.
    outbound_queue_capacity: usize,
}

/// `GET /config/relay` — Room policy and heartbeat timing.
#[utoipa::path(
    get,
    path = "/config/relay",
    tag = "System",
    summary = "Relay settings",
    description = "Returns the room capacity policy and heartbeat timing clients must honor to stay connected.",
    responses(
        (status = 200, description = "Relay settings", body = RelaySettingsResponse),
    )
)]
pub async fn relay_settings_handler(State(state): State<AppState>) -> impl IntoResponse {
    let heartbeat = state.session.heartbeat;
    (
        StatusCode::OK,
        Json(RelaySettingsResponse {
            room_capacity: state.registry.policy().capacity(),
            ping_interval_secs: heartbeat.interval().as_secs(),
            read_deadline_secs: heartbeat.deadline().as_secs(),
            outbound_queue_capacity: state.session.outbound_queue_capacity,
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/relay", get(relay_settings_handler))
}
