//! Relay service: authorizes, fans out, and persists inbound frames.

use std::sync::Arc;

use chrono::Utc;

use super::ChatAuthorizer;
use crate::domain::{BroadcastReport, Connection, ConnectionRegistry, Frame, RoomKey};
use crate::error::RelayError;
use crate::persistence::{ChatMessage, PersistenceQueue};

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The frame reached at least one peer.
    Delivered(BroadcastReport),
    /// Nobody else is in the room (or every peer failed).
    NoPeers,
    /// Peers exist but none of them may receive from the sender.
    Denied,
}

/// Orchestration layer for the message path.
///
/// Stateless coordinator: owns the [`ConnectionRegistry`] for fan-out, an
/// optional [`ChatAuthorizer`], and an optional [`PersistenceQueue`].
/// Delivery is at-most-once: peers that are not connected at the time of
/// the broadcast never see the frame.
#[derive(Debug, Clone)]
pub struct RelayService {
    registry: Arc<ConnectionRegistry>,
    authorizer: Option<Arc<dyn ChatAuthorizer>>,
    persistence: Option<PersistenceQueue>,
}

impl RelayService {
    /// Creates a relay that broadcasts without authorization or storage.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            authorizer: None,
            persistence: None,
        }
    }

    /// Checks every (sender, recipient) pair with `authorizer` before delivery.
    #[must_use]
    pub fn with_authorizer(mut self, authorizer: Arc<dyn ChatAuthorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Hands delivered text frames to `queue`.
    #[must_use]
    pub fn with_persistence(mut self, queue: PersistenceQueue) -> Self {
        self.persistence = Some(queue);
        self
    }

    /// Returns a reference to the inner [`ConnectionRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Relays one frame read from `sender` to the other participants of
    /// `room`. Never fails: refusals and delivery errors are logged and
    /// contained to the connections involved.
    pub async fn relay(&self, room: &RoomKey, sender: &Connection, frame: Frame) -> RelayOutcome {
        let sent_at = Utc::now();
        let body = frame.as_text().map(str::to_owned);

        let report = match &self.authorizer {
            None => self.registry.broadcast(room, sender.id(), frame).await,
            Some(authorizer) => {
                let peers = self.registry.peers(room, sender.id()).await;
                if peers.is_empty() {
                    return RelayOutcome::NoPeers;
                }
                let mut allowed = Vec::with_capacity(peers.len());
                for peer in peers {
                    match Self::authorize(authorizer.as_ref(), room, sender, &peer).await {
                        Ok(()) => allowed.push(peer),
                        Err(RelayError::Unauthorized(pair)) => {
                            tracing::debug!(room = %room, pair = %pair, "pair not allowed to chat");
                        }
                        Err(e) => tracing::warn!(
                            room = %room,
                            sender = %sender.participant(),
                            recipient = %peer.participant(),
                            error = %e,
                            "authorization check failed"
                        ),
                    }
                }
                if allowed.is_empty() {
                    tracing::warn!(
                        room = %room,
                        sender = %sender.participant(),
                        connection = %sender.id(),
                        "message dropped: no consultation allows this exchange"
                    );
                    return RelayOutcome::Denied;
                }
                self.registry.deliver(room, &allowed, frame).await
            }
        };

        if report.delivered_to.is_empty() {
            tracing::debug!(room = %room, sender = %sender.participant(), "no peer to relay to");
            return RelayOutcome::NoPeers;
        }

        if let (Some(queue), Some(body)) = (&self.persistence, body) {
            for recipient in &report.delivered_to {
                queue.enqueue(ChatMessage::delivered(
                    room.clone(),
                    sender.participant().clone(),
                    recipient.clone(),
                    body.clone(),
                    sent_at,
                ));
            }
        }

        RelayOutcome::Delivered(report)
    }

    /// Asks the oracle whether `sender` may reach `recipient`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Unauthorized`] when the pair is refused, or
    /// the oracle's own error when the check could not be made.
    async fn authorize(
        authorizer: &dyn ChatAuthorizer,
        room: &RoomKey,
        sender: &Connection,
        recipient: &Connection,
    ) -> Result<(), RelayError> {
        if authorizer
            .is_allowed(room, sender.participant(), recipient.participant())
            .await?
        {
            Ok(())
        } else {
            Err(RelayError::Unauthorized(format!(
                "{} -> {}",
                sender.participant(),
                recipient.participant()
            )))
        }
    }
}
