//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type for the relay. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! Per-connection failures never leave their connection; only ingress and
//! introspection errors are ever rendered to a client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::RoomKey;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: participant_id is required",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`RelayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                    |
/// |-----------|-------------------|--------------------------------|
/// | 1000–1999 | Ingress           | 400 Bad Request / 426 Upgrade  |
/// | 2000–2999 | Room state        | 404 Not Found / 409 Conflict   |
/// | 3000–3999 | Server            | 500 Internal Server Error      |
/// | 4000–4999 | Authorization     | 403 Forbidden                  |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Required routing identifiers are missing or malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request reached the websocket endpoint without upgrade headers.
    #[error("websocket upgrade required: {0}")]
    UpgradeRequired(String),

    /// No live room exists under the given key.
    #[error("room not found: {0}")]
    RoomNotFound(RoomKey),

    /// The room already holds its maximum number of participants.
    #[error("room {room} is full ({capacity} participants)")]
    RoomFull {
        /// Room that rejected the join.
        room: RoomKey,
        /// Capacity of the room's policy.
        capacity: usize,
    },

    /// The pair of participants is not allowed to exchange messages.
    #[error("participants are not allowed to chat: {0}")]
    Unauthorized(String),

    /// Persistence collaborator failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Relay settings are missing or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::UpgradeRequired(_) => 1002,
            Self::RoomNotFound(_) => 2001,
            Self::RoomFull { .. } => 2002,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::Config(_) => 3002,
            Self::Unauthorized(_) => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::UpgradeRequired(_) => StatusCode::UPGRADE_REQUIRED,
            Self::RoomNotFound(_) => StatusCode::NOT_FOUND,
            Self::RoomFull { .. } => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::PersistenceError(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for RelayError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn room_full_maps_to_conflict() {
        let err = RelayError::RoomFull {
            room: RoomKey::session("7"),
            capacity: 2,
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), 2002);
        assert_eq!(err.to_string(), "room session:7 is full (2 participants)");
    }

    #[test]
    fn upgrade_required_maps_to_426() {
        let err = RelayError::UpgradeRequired("missing headers".to_string());
        assert_eq!(err.status_code(), StatusCode::UPGRADE_REQUIRED);
    }

    #[test]
    fn config_errors_are_not_client_errors() {
        let err = RelayError::Config("LISTEN_ADDR \"nope\"".to_string());
        assert_eq!(err.error_code(), 3002);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("configuration error:"));
    }

    #[test]
    fn unauthorized_maps_to_forbidden() {
        let err = RelayError::Unauthorized("u1 -> d1".to_string());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.error_code(), 4001);
    }

    #[test]
    fn into_response_carries_status() {
        let response = RelayError::InvalidRequest("participant_id is required".to_string())
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
