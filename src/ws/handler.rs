//! Axum WebSocket upgrade handlers (ingress).
//!
//! Identifiers are validated before the upgrade is attempted, so a bad
//! request never reaches the registry. A request that passes validation
//! but carries no upgrade headers is answered with `426 Upgrade Required`.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::Response;

use super::connection::run_connection;
use super::join::{JoinParams, JoinRequest};
use crate::app_state::AppState;
use crate::domain::RoomKey;
use crate::error::{ErrorResponse, RelayError};

/// `GET /ws` — Join the room named in the query string.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] for missing identifiers and
/// [`RelayError::UpgradeRequired`] for plain HTTP requests.
#[utoipa::path(
    get,
    path = "/ws",
    tag = "Chat",
    summary = "Join a chat room over WebSocket",
    description = "Upgrades to a WebSocket filed under the session or consultation room named in the query. Frames sent by the client are relayed unmodified to the other participants.",
    params(JoinParams),
    responses(
        (status = 101, description = "Switching protocols"),
        (status = 400, description = "Missing or invalid identifiers", body = ErrorResponse),
        (status = 426, description = "Not a WebSocket upgrade request", body = ErrorResponse),
    )
)]
pub async fn ws_handler(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
    params: Result<Query<JoinParams>, QueryRejection>,
) -> Result<Response, RelayError> {
    let join = JoinRequest::from_params(query_params(params)?)?;
    accept(upgrade, state, join)
}

/// `GET /ws/session/{session_id}` — Join a two-party session.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] for missing identifiers and
/// [`RelayError::UpgradeRequired`] for plain HTTP requests.
#[utoipa::path(
    get,
    path = "/ws/session/{session_id}",
    tag = "Chat",
    summary = "Join a two-party session over WebSocket",
    params(
        ("session_id" = String, Path, description = "Session identifier"),
        ("participant_id" = String, Query, description = "Joining participant"),
        ("name" = Option<String>, Query, description = "Display name"),
    ),
    responses(
        (status = 101, description = "Switching protocols"),
        (status = 400, description = "Missing or invalid identifiers", body = ErrorResponse),
        (status = 426, description = "Not a WebSocket upgrade request", body = ErrorResponse),
    )
)]
pub async fn session_ws_handler(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    params: Result<Query<JoinParams>, QueryRejection>,
) -> Result<Response, RelayError> {
    let room = RoomKey::parse_session(&session_id)?;
    let join = JoinRequest::for_room(room, query_params(params)?)?;
    accept(upgrade, state, join)
}

/// `GET /ws/consultation/{consultation_id}` — Join a consultation room.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] for missing identifiers and
/// [`RelayError::UpgradeRequired`] for plain HTTP requests.
#[utoipa::path(
    get,
    path = "/ws/consultation/{consultation_id}",
    tag = "Chat",
    summary = "Join a consultation room over WebSocket",
    params(
        ("consultation_id" = i64, Path, description = "Consultation identifier"),
        ("participant_id" = String, Query, description = "Joining participant"),
        ("name" = Option<String>, Query, description = "Display name"),
    ),
    responses(
        (status = 101, description = "Switching protocols"),
        (status = 400, description = "Missing or invalid identifiers", body = ErrorResponse),
        (status = 426, description = "Not a WebSocket upgrade request", body = ErrorResponse),
    )
)]
pub async fn consultation_ws_handler(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
    Path(consultation_id): Path<String>,
    params: Result<Query<JoinParams>, QueryRejection>,
) -> Result<Response, RelayError> {
    let room = RoomKey::parse_consultation(&consultation_id)?;
    let join = JoinRequest::for_room(room, query_params(params)?)?;
    accept(upgrade, state, join)
}

fn query_params(params: Result<Query<JoinParams>, QueryRejection>) -> Result<JoinParams, RelayError> {
    params
        .map(|Query(p)| p)
        .map_err(|e| RelayError::InvalidRequest(e.body_text()))
}

/// Performs the upgrade and hands the socket to [`run_connection`].
fn accept(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    state: AppState,
    join: JoinRequest,
) -> Result<Response, RelayError> {
    let upgrade = upgrade.map_err(|e| RelayError::UpgradeRequired(e.body_text()))?;
    let relay = Arc::clone(&state.relay);
    let settings = state.session;
    let sessions = state.sessions.clone();
    let room = join.room.clone();

    tracing::debug!(room = %room, participant = %join.participant, "upgrading websocket");
    Ok(upgrade
        .on_failed_upgrade(move |e| {
            tracing::warn!(room = %room, error = %e, "websocket upgrade failed");
        })
        .on_upgrade(move |socket| run_connection(socket, join, relay, settings, sessions)))
}
