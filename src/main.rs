//! consult-relay server entry point.
//!
//! Starts the Axum HTTP server with the WebSocket chat endpoints and the
//! REST introspection API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use consult_relay::app_state::AppState;
use consult_relay::build_app;
use consult_relay::config::{LogFormat, RelayConfig};
use consult_relay::domain::{CloseReason, ConnectionRegistry};
use consult_relay::persistence::{PersistenceQueue, PostgresChatStore};
use consult_relay::service::RelayService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = RelayConfig::from_env().context("invalid configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting consult-relay");

    // Build domain layer
    let registry = Arc::new(ConnectionRegistry::new(config.room_policy()));

    // Build service layer
    let mut relay = RelayService::new(Arc::clone(&registry));
    let mut persistence_worker = None;
    if config.needs_database() {
        let store = Arc::new(
            PostgresChatStore::connect(&config)
                .await
                .context("connecting to chat database")?,
        );
        if config.authorization_enabled {
            relay = relay.with_authorizer(Arc::clone(&store) as _);
        }
        if config.persistence_enabled {
            let (queue, worker) = PersistenceQueue::spawn(store, config.persist_queue_capacity);
            relay = relay.with_persistence(queue);
            persistence_worker = Some(worker);
        }
    }
    tracing::info!(
        capacity = ?config.room_policy().capacity(),
        authorization = config.authorization_enabled,
        persistence = config.persistence_enabled,
        "relay configured"
    );

    // Build application state
    let session = config.session_settings()?;
    let app_state = AppState::new(relay, session);
    let app = build_app(app_state.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&registry)))
        .await?;

    // Joins accepted between the signal and the listener closing.
    registry.close_all(CloseReason::Shutdown).await;

    // Dropping the last relay handle closes the persistence queue so the
    // worker can flush its backlog.
    drop(app_state);
    if let Some(worker) = persistence_worker
        && tokio::time::timeout(Duration::from_secs(5), worker).await.is_err()
    {
        tracing::warn!("persistence worker did not drain in time");
    }
    tracing::info!("consult-relay stopped");
    Ok(())
}

/// Resolves on Ctrl-C, after closing every live chat connection.
async fn shutdown_signal(registry: Arc<ConnectionRegistry>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
    registry.close_all(CloseReason::Shutdown).await;
}
