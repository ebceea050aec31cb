//! Ingress routing identifiers: who is joining which room.

use serde::Deserialize;
use utoipa::IntoParams;

use crate::domain::{ParticipantId, RoomKey};
use crate::error::RelayError;

/// Longest display name kept; longer names are truncated.
pub const MAX_DISPLAY_NAME_CHARS: usize = 64;

/// Query parameters accepted by the websocket endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JoinParams {
    /// Identifier of the joining participant.
    pub participant_id: Option<String>,
    /// Display name shown to other participants.
    pub name: Option<String>,
    /// Two-party session to join.
    pub session_id: Option<String>,
    /// Consultation room to join.
    pub consultation_id: Option<String>,
}

/// Validated join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Room to join.
    pub room: RoomKey,
    /// Joining participant.
    pub participant: ParticipantId,
    /// Optional display name.
    pub display_name: Option<String>,
}

impl JoinRequest {
    /// Validates query-only ingress (`GET /ws?...`).
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] if the participant id is
    /// missing, or if not exactly one of `session_id` / `consultation_id`
    /// is given.
    pub fn from_params(params: JoinParams) -> Result<Self, RelayError> {
        let room = match (params.session_id.as_deref(), params.consultation_id.as_deref()) {
            (Some(session), None) => RoomKey::parse_session(session)?,
            (None, Some(consultation)) => RoomKey::parse_consultation(consultation)?,
            (Some(_), Some(_)) => {
                return Err(RelayError::InvalidRequest(
                    "session_id and consultation_id are mutually exclusive".to_string(),
                ));
            }
            (None, None) => {
                return Err(RelayError::InvalidRequest(
                    "session_id or consultation_id is required".to_string(),
                ));
            }
        };
        Self::for_room(room, params)
    }

    /// Validates ingress where the room comes from the path.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] if the participant id is
    /// missing or blank.
    pub fn for_room(room: RoomKey, params: JoinParams) -> Result<Self, RelayError> {
        let participant = params
            .participant_id
            .as_deref()
            .ok_or_else(|| RelayError::InvalidRequest("participant_id is required".to_string()))?
            .parse()?;
        let display_name = params
            .name
            .map(|n| n.trim().chars().take(MAX_DISPLAY_NAME_CHARS).collect::<String>())
            .filter(|n| !n.is_empty());
        Ok(Self {
            room,
            participant,
            display_name,
        })
    }
}
