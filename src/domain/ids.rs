//! Type-safe identifiers for rooms, participants, and connections.
//!
//! [`RoomKey`] scopes a broadcast, [`ParticipantId`] names the person
//! behind a connection, and [`ConnectionId`] tells two connections of the
//! same participant apart.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::RelayError;

/// Longest participant identifier accepted at ingress.
pub const MAX_PARTICIPANT_ID_LEN: usize = 128;

/// Key of a chat room.
///
/// Two namespaces exist and never collide: caller-supplied session
/// strings for two-party chats, and consultation identifiers for
/// consultation-scoped rooms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RoomKey {
    /// Opaque session string supplied by the caller.
    Session(String),
    /// Consultation identifier.
    Consultation(i64),
}

impl RoomKey {
    /// Builds a session-scoped room key.
    #[must_use]
    pub fn session(id: impl Into<String>) -> Self {
        Self::Session(id.into())
    }

    /// Builds a consultation-scoped room key.
    #[must_use]
    pub const fn consultation(id: i64) -> Self {
        Self::Consultation(id)
    }

    /// Parses a session id, rejecting blank strings.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] if `raw` is blank.
    pub fn parse_session(raw: &str) -> Result<Self, RelayError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RelayError::InvalidRequest(
                "session_id must not be blank".to_string(),
            ));
        }
        Ok(Self::Session(trimmed.to_string()))
    }

    /// Parses a consultation id.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] if `raw` is not an integer.
    pub fn parse_consultation(raw: &str) -> Result<Self, RelayError> {
        raw.trim()
            .parse::<i64>()
            .map(Self::Consultation)
            .map_err(|_| {
                RelayError::InvalidRequest(format!("consultation_id must be an integer: {raw:?}"))
            })
    }

    /// Returns the consultation id for consultation rooms.
    #[must_use]
    pub const fn consultation_id(&self) -> Option<i64> {
        match self {
            Self::Consultation(id) => Some(*id),
            Self::Session(_) => None,
        }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => write!(f, "session:{id}"),
            Self::Consultation(id) => write!(f, "consultation:{id}"),
        }
    }
}

/// Identifier of a chat participant (patient, doctor, or admin).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ParticipantId {
    type Err = RelayError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RelayError::InvalidRequest(
                "participant_id must not be blank".to_string(),
            ));
        }
        if trimmed.len() > MAX_PARTICIPANT_ID_LEN {
            return Err(RelayError::InvalidRequest(format!(
                "participant_id longer than {MAX_PARTICIPANT_ID_LEN} bytes"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for one live connection.
///
/// Wraps a UUID v4 generated when the connection is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a new random `ConnectionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
