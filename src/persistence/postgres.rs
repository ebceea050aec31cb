//! PostgreSQL implementation of the chat collaborators.
//!
//! Reads and writes tables owned by the surrounding telehealth backend:
//!
//! - `chat_messages (room_key, participant_a, participant_b, sender_id, body, sent_at)`
//! - `consultations (id, patient_id, doctor_id, status, payment_status, expires_at)`

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::{ChatMessage, MessageStore};
use crate::config::RelayConfig;
use crate::domain::{ParticipantId, RoomKey};
use crate::error::RelayError;
use crate::service::ChatAuthorizer;

/// PostgreSQL-backed message store and consultation authorizer.
#[derive(Debug, Clone)]
pub struct PostgresChatStore {
    pool: PgPool,
}

impl PostgresChatStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool using the database settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::PersistenceError`] if the database cannot be
    /// reached.
    pub async fn connect(config: &RelayConfig) -> Result<Self, RelayError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        tracing::info!(
            max_connections = config.database_max_connections,
            "connected to chat database"
        );
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl MessageStore for PostgresChatStore {
    async fn save_message(&self, message: &ChatMessage) -> Result<(), RelayError> {
        sqlx::query(
            "INSERT INTO chat_messages (room_key, participant_a, participant_b, sender_id, body, sent_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(message.room.to_string())
        .bind(message.participant_a.as_str())
        .bind(message.participant_b.as_str())
        .bind(message.sender.as_str())
        .bind(&message.body)
        .bind(message.sent_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatAuthorizer for PostgresChatStore {
    async fn is_allowed(
        &self,
        room: &RoomKey,
        a: &ParticipantId,
        b: &ParticipantId,
    ) -> Result<bool, RelayError> {
        let allowed = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                SELECT 1 FROM consultations \
                WHERE ((patient_id::text = $1 AND doctor_id::text = $2) \
                    OR (patient_id::text = $2 AND doctor_id::text = $1)) \
                  AND status = 'approved' \
                  AND payment_status = 'paid' \
                  AND expires_at > NOW() \
                  AND ($3::bigint IS NULL OR id = $3) \
             )",
        )
        .bind(a.as_str())
        .bind(b.as_str())
        .bind(room.consultation_id())
        .fetch_one(&self.pool)
        .await?;
        Ok(allowed)
    }
}
