//! Persistence layer: chat message storage behind a best-effort queue.
//!
//! [`MessageStore`] is the seam to whatever stores chat history. The relay
//! never calls it inline; delivered messages go through the bounded
//! [`PersistenceQueue`] and a single worker task. The concrete
//! implementation uses `sqlx::PgPool` for async PostgreSQL access.

pub mod models;
pub mod postgres;
pub mod queue;

use async_trait::async_trait;

pub use models::ChatMessage;
pub use postgres::PostgresChatStore;
pub use queue::PersistenceQueue;

use crate::error::RelayError;

/// Durable storage for delivered chat messages.
#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// Stores one message.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::PersistenceError`] on storage failure.
    async fn save_message(&self, message: &ChatMessage) -> Result<(), RelayError>;
}
