//! WebSocket layer: ingress, per-connection lifecycle, and liveness.
//!
//! The endpoints under `/ws` upgrade to a bidirectional stream filed in a
//! chat room. Frames are relayed unmodified to the room's other
//! participants.

pub mod connection;
pub mod handler;
pub mod join;
pub mod liveness;

use axum::Router;
use axum::routing::get;

use crate::app_state::AppState;

/// WebSocket ingress routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(handler::ws_handler))
        .route("/ws/session/{session_id}", get(handler::session_ws_handler))
        .route(
            "/ws/consultation/{consultation_id}",
            get(handler::consultation_ws_handler),
        )
}
