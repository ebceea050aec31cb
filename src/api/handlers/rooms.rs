//! Room introspection handlers: list and inspect live rooms.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{PaginationParams, RoomListResponse, RoomSummaryDto};
use crate::app_state::AppState;
use crate::domain::{RoomKey, RoomSnapshot};
use crate::error::{ErrorResponse, RelayError};

/// `GET /rooms` — List live rooms, oldest first.
///
/// # Errors
///
/// Never fails today; the `Result` keeps the handler signature uniform.
#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    tag = "Rooms",
    summary = "List live rooms",
    description = "Returns a paginated list of rooms that currently hold at least one participant.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated room list", body = RoomListResponse),
    )
)]
pub async fn list_rooms(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, RelayError> {
    let mut rooms = state.registry.rooms().await;
    rooms.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.key.to_string().cmp(&b.key.to_string()))
    });
    let summaries: Vec<RoomSummaryDto> = rooms.iter().map(RoomSummaryDto::from).collect();
    let (data, pagination) = params.paginate(summaries);
    Ok(Json(RoomListResponse { data, pagination }))
}

/// `GET /rooms/session/{id}` — Inspect a two-party session.
///
/// # Errors
///
/// Returns [`RelayError::RoomNotFound`] if no participant is connected.
#[utoipa::path(
    get,
    path = "/api/v1/rooms/session/{id}",
    tag = "Rooms",
    summary = "Get session room",
    params(
        ("id" = String, Path, description = "Session identifier"),
    ),
    responses(
        (status = 200, description = "Room roster", body = RoomSnapshot),
        (status = 404, description = "Room not found", body = ErrorResponse),
    )
)]
pub async fn get_session_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, RelayError> {
    let key = RoomKey::parse_session(&id)?;
    room_snapshot(&state, key).await
}

/// `GET /rooms/consultation/{id}` — Inspect a consultation room.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] for a non-numeric id and
/// [`RelayError::RoomNotFound`] if no participant is connected.
#[utoipa::path(
    get,
    path = "/api/v1/rooms/consultation/{id}",
    tag = "Rooms",
    summary = "Get consultation room",
    params(
        ("id" = i64, Path, description = "Consultation identifier"),
    ),
    responses(
        (status = 200, description = "Room roster", body = RoomSnapshot),
        (status = 400, description = "Invalid consultation id", body = ErrorResponse),
        (status = 404, description = "Room not found", body = ErrorResponse),
    )
)]
pub async fn get_consultation_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, RelayError> {
    let key = RoomKey::parse_consultation(&id)?;
    room_snapshot(&state, key).await
}

async fn room_snapshot(state: &AppState, key: RoomKey) -> Result<Json<RoomSnapshot>, RelayError> {
    state
        .registry
        .room(&key)
        .await
        .map(Json)
        .ok_or(RelayError::RoomNotFound(key))
}

/// Room routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/session/{id}", get(get_session_room))
        .route("/rooms/consultation/{id}", get(get_consultation_room))
}
