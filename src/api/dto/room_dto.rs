//! Room introspection DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::{RoomKey, RoomSnapshot, RoomState};

/// Lightweight summary of a room for list endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSummaryDto {
    /// Room key.
    pub key: RoomKey,
    /// Lifecycle state.
    pub state: RoomState,
    /// Capacity (`null` when unbounded).
    pub capacity: Option<usize>,
    /// Number of connected participants.
    pub participant_count: usize,
    /// When the first participant joined.
    pub created_at: DateTime<Utc>,
}

impl From<&RoomSnapshot> for RoomSummaryDto {
    fn from(room: &RoomSnapshot) -> Self {
        Self {
            key: room.key.clone(),
            state: room.state,
            capacity: room.capacity,
            participant_count: room.participants.len(),
            created_at: room.created_at,
        }
    }
}

/// Response body for `GET /api/v1/rooms`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomListResponse {
    /// Rooms on this page, oldest first.
    pub data: Vec<RoomSummaryDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
