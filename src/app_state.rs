//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::ConnectionRegistry;
use crate::service::RelayService;
use crate::ws::connection::{SessionSettings, SessionTracker};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Room registry, shared with the relay.
    pub registry: Arc<ConnectionRegistry>,
    /// Relay service for the message path.
    pub relay: Arc<RelayService>,
    /// Heartbeat and queue settings for new connections.
    pub session: SessionSettings,
    /// Connection tasks still holding a transport.
    pub sessions: SessionTracker,
}

impl AppState {
    /// Builds the state around `relay`, sharing its registry.
    #[must_use]
    pub fn new(relay: RelayService, session: SessionSettings) -> Self {
        Self {
            registry: Arc::clone(relay.registry()),
            relay: Arc::new(relay),
            session,
            sessions: SessionTracker::new(),
        }
    }
}
