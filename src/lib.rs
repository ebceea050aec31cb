//! # consult-relay
//!
//! WebSocket chat relay and session multiplexer for a telehealth backend.
//!
//! Patients and doctors join a room (a two-party session or a
//! consultation) over a WebSocket. Every frame one participant sends is
//! relayed unmodified to the other participants of the same room, never
//! echoed back to the sender. Connections are kept honest by a ping/read
//! deadline heartbeat, and rooms disappear with their last participant.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── WS ingress + connection loops (ws/)
//!     ├── REST introspection (api/)
//!     │
//!     ├── RelayService (service/) ── ChatAuthorizer
//!     │
//!     ├── ConnectionRegistry (domain/)
//!     │
//!     └── PersistenceQueue ── MessageStore (persistence/, PostgreSQL)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Builds the full application router: WebSocket ingress, REST
/// introspection, and system endpoints.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .merge(ws::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
