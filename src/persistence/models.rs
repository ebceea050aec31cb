//! Persisted chat message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ParticipantId, RoomKey};

/// One delivered message between two participants.
///
/// `participant_a` is the sender and `participant_b` the recipient of the
/// delivery this record describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Room the message was relayed in.
    pub room: RoomKey,
    /// First participant of the pair.
    pub participant_a: ParticipantId,
    /// Second participant of the pair.
    pub participant_b: ParticipantId,
    /// Participant who wrote the message.
    pub sender: ParticipantId,
    /// Raw frame body as received.
    pub body: String,
    /// When the relay read the frame.
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Builds the record for a delivery from `sender` to `recipient`.
    #[must_use]
    pub fn delivered(
        room: RoomKey,
        sender: ParticipantId,
        recipient: ParticipantId,
        body: String,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            room,
            participant_a: sender.clone(),
            participant_b: recipient,
            sender,
            body,
            sent_at,
        }
    }
}
