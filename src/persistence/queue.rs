//! Bounded best-effort side channel in front of a [`MessageStore`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{ChatMessage, MessageStore};

/// Sending half of the persistence queue.
///
/// Enqueueing never waits: when the queue is full the message is dropped
/// and logged, so a slow store cannot stall the relay.
#[derive(Debug, Clone)]
pub struct PersistenceQueue {
    tx: mpsc::Sender<ChatMessage>,
}

impl PersistenceQueue {
    /// Spawns the worker that drains the queue into `store`.
    ///
    /// The worker exits once every `PersistenceQueue` clone is dropped and
    /// the backlog is flushed.
    #[must_use]
    pub fn spawn(store: Arc<dyn MessageStore>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(drain(rx, store));
        (Self { tx }, worker)
    }

    /// Hands a message to the worker.
    ///
    /// Returns `false` if the message was dropped.
    pub fn enqueue(&self, message: ChatMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                tracing::warn!(
                    room = %message.room,
                    sender = %message.sender,
                    "persistence queue full; message not stored"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                tracing::error!(
                    room = %message.room,
                    sender = %message.sender,
                    "persistence worker stopped; message not stored"
                );
                false
            }
        }
    }
}

async fn drain(mut rx: mpsc::Receiver<ChatMessage>, store: Arc<dyn MessageStore>) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = store.save_message(&message).await {
            tracing::warn!(
                room = %message.room,
                sender = %message.sender,
                error = %e,
                "failed to store chat message"
            );
        }
    }
    tracing::debug!("persistence worker stopped");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::Mutex;

    use super::*;
    use crate::domain::RoomKey;
    use crate::error::RelayError;

    #[derive(Debug, Default)]
    struct RecordingStore {
        saved: Mutex<Vec<ChatMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl MessageStore for RecordingStore {
        async fn save_message(&self, message: &ChatMessage) -> Result<(), RelayError> {
            if self.fail {
                return Err(RelayError::PersistenceError("db down".to_string()));
            }
            self.saved.lock().await.push(message.clone());
            Ok(())
        }
    }

    fn message(body: &str) -> ChatMessage {
        let (Ok(sender), Ok(recipient)) = ("u1".parse(), "d1".parse()) else {
            panic!("valid participant ids");
        };
        ChatMessage::delivered(
            RoomKey::session("7"),
            sender,
            recipient,
            body.to_string(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn worker_stores_in_order() {
        let store = Arc::new(RecordingStore::default());
        let (queue, worker) = PersistenceQueue::spawn(Arc::clone(&store) as Arc<dyn MessageStore>, 8);
        assert!(queue.enqueue(message("a")));
        assert!(queue.enqueue(message("b")));
        drop(queue);
        assert!(worker.await.is_ok());

        let saved = store.saved.lock().await;
        let bodies: Vec<&str> = saved.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn store_failure_does_not_stop_worker() {
        let store = Arc::new(RecordingStore {
            saved: Mutex::new(Vec::new()),
            fail: true,
        });
        let (queue, worker) = PersistenceQueue::spawn(store, 8);
        assert!(queue.enqueue(message("a")));
        assert!(queue.enqueue(message("b")));
        drop(queue);
        tokio_test::assert_ok!(worker.await);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_queue_drops_message() {
        let store = Arc::new(RecordingStore::default());
        // The worker cannot run before the first await on a current-thread
        // runtime, so the second enqueue sees a full queue.
        let (queue, _worker) = PersistenceQueue::spawn(store, 1);
        assert!(queue.enqueue(message("a")));
        assert!(!queue.enqueue(message("b")));
    }

    #[test]
    fn delivered_record_orders_pair_sender_first() {
        let msg = message("x");
        assert_eq!(msg.participant_a, msg.sender);
        assert_eq!(msg.participant_b.as_str(), "d1");
    }
}
