//! Handle to one participant's live connection.
//!
//! A [`Connection`] is what the registry files under a room. It carries
//! the participant's identity, the sending half of the bounded outbound
//! queue drained by the connection's writer task, and a close signal that
//! flips exactly once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};

use super::frame::{CloseReason, Outbound};
use super::ids::{ConnectionId, ParticipantId};

/// Why an enqueue onto a connection's outbound queue failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The connection is closed or its writer has gone away.
    Closed,
    /// The outbound queue is full.
    Full,
}

impl SendFailure {
    /// Close reason to apply when this failure evicts a connection.
    #[must_use]
    pub const fn close_reason(self) -> CloseReason {
        match self {
            Self::Closed => CloseReason::WriteFailed,
            Self::Full => CloseReason::SlowConsumer,
        }
    }
}

/// Cheaply clonable handle to a live connection.
#[derive(Debug, Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

#[derive(Debug)]
struct ConnectionInner {
    id: ConnectionId,
    participant: ParticipantId,
    display_name: Option<String>,
    connected_at: DateTime<Utc>,
    outbound: mpsc::Sender<Outbound>,
    closed: watch::Sender<Option<CloseReason>>,
}

impl Connection {
    /// Creates a connection handle and the receiving half of its outbound
    /// queue. The receiver belongs to the connection's writer task.
    #[must_use]
    pub fn new(
        participant: ParticipantId,
        display_name: Option<String>,
        queue_capacity: usize,
    ) -> (Self, mpsc::Receiver<Outbound>) {
        let (outbound, rx) = mpsc::channel(queue_capacity.max(1));
        let (closed, _) = watch::channel(None);
        let inner = ConnectionInner {
            id: ConnectionId::new(),
            participant,
            display_name,
            connected_at: Utc::now(),
            outbound,
            closed,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    /// Returns the connection identifier.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns the participant behind this connection.
    #[must_use]
    pub fn participant(&self) -> &ParticipantId {
        &self.inner.participant
    }

    /// Returns the display name supplied at ingress, if any.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.inner.display_name.as_deref()
    }

    /// Returns when the connection was accepted.
    #[must_use]
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.inner.connected_at
    }

    /// Enqueues an item for the writer task without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SendFailure::Closed`] once the connection is closed and
    /// [`SendFailure::Full`] when the queue has no free slot.
    pub fn send(&self, item: Outbound) -> Result<(), SendFailure> {
        if self.is_closed() {
            return Err(SendFailure::Closed);
        }
        self.inner.outbound.try_send(item).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SendFailure::Full,
            mpsc::error::TrySendError::Closed(_) => SendFailure::Closed,
        })
    }

    /// Closes the connection. Only the first call has any effect; it
    /// records `reason` and asks the writer to send a close frame.
    ///
    /// Returns `true` if this call closed the connection.
    pub fn close(&self, reason: CloseReason) -> bool {
        let first = self.inner.closed.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(reason);
            true
        });
        if first {
            // The writer also watches the close signal, so a full queue
            // only delays the close frame until the backlog drains.
            let _ = self.inner.outbound.try_send(Outbound::Close(reason));
        }
        first
    }

    /// Returns `true` once [`Connection::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.borrow().is_some()
    }

    /// Returns the reason recorded by the first close.
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.inner.closed.borrow()
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed.subscribe();
        let _ = rx.wait_for(Option::is_some).await;
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Connection {}
