//! Room roster, capacity policy, and lifecycle state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::connection::Connection;
use super::ids::{ConnectionId, ParticipantId, RoomKey};
use crate::error::RelayError;

/// Participant capacity applied to every room in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomPolicy {
    capacity: Option<usize>,
}

impl RoomPolicy {
    /// Two-party chat: one patient, one doctor.
    #[must_use]
    pub const fn two_party() -> Self {
        Self { capacity: Some(2) }
    }

    /// Consultation hub: no participant ceiling.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { capacity: None }
    }

    /// Bounded policy with the given capacity; `0` means unbounded.
    #[must_use]
    pub const fn with_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            Self::unbounded()
        } else {
            Self {
                capacity: Some(capacity),
            }
        }
    }

    /// Returns the capacity, or `None` when unbounded.
    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl Default for RoomPolicy {
    fn default() -> Self {
        Self::two_party()
    }
}

/// Lifecycle state of a room.
///
/// Bounded rooms go `Empty → Forming → Active → Draining → Empty`;
/// unbounded rooms are `Active` whenever they hold a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    /// No participants; the registry drops rooms in this state.
    Empty,
    /// Waiting for the room to fill up.
    Forming,
    /// Every slot is taken (bounded) or at least one participant (unbounded).
    Active,
    /// A participant left a previously full room.
    Draining,
}

/// Result of admitting a connection into a room.
#[derive(Debug)]
pub enum Admission {
    /// Connection took a free slot.
    Joined,
    /// Connection took over the slot of the same participant's older
    /// connection, which is returned so the caller can close it.
    Replaced(Connection),
}

/// One live room and its participant connections.
#[derive(Debug)]
pub struct Room {
    key: RoomKey,
    policy: RoomPolicy,
    members: Vec<Connection>,
    was_full: bool,
    created_at: DateTime<Utc>,
}

impl Room {
    /// Creates an empty room.
    #[must_use]
    pub fn new(key: RoomKey, policy: RoomPolicy) -> Self {
        Self {
            key,
            policy,
            members: Vec::new(),
            was_full: false,
            created_at: Utc::now(),
        }
    }

    /// Admits `conn`, replacing an older connection of the same participant.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RoomFull`] if every slot is taken by other
    /// participants. The room is left unchanged.
    pub fn admit(&mut self, conn: Connection) -> Result<Admission, RelayError> {
        if let Some(slot) = self
            .members
            .iter_mut()
            .find(|m| m.participant() == conn.participant())
        {
            let old = std::mem::replace(slot, conn);
            return Ok(Admission::Replaced(old));
        }
        if let Some(capacity) = self.policy.capacity()
            && self.members.len() >= capacity
        {
            return Err(RelayError::RoomFull {
                room: self.key.clone(),
                capacity,
            });
        }
        self.members.push(conn);
        if self.is_full() {
            self.was_full = true;
        }
        Ok(Admission::Joined)
    }

    /// Removes the connection with the given id, returning it if present.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        let pos = self.members.iter().position(|m| m.id() == id)?;
        Some(self.members.remove(pos))
    }

    /// Returns every connection except `sender`.
    #[must_use]
    pub fn peers_of(&self, sender: ConnectionId) -> Vec<Connection> {
        self.members
            .iter()
            .filter(|m| m.id() != sender)
            .cloned()
            .collect()
    }

    /// Returns `true` if the connection is filed in this room.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.iter().any(|m| m.id() == id)
    }

    /// Returns the connections in join order.
    #[must_use]
    pub fn members(&self) -> &[Connection] {
        &self.members
    }

    /// Number of participants in the room.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if no participant is left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn is_full(&self) -> bool {
        self.policy
            .capacity()
            .is_some_and(|capacity| self.members.len() >= capacity)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RoomState {
        if self.members.is_empty() {
            return RoomState::Empty;
        }
        match self.policy.capacity() {
            None => RoomState::Active,
            Some(_) if self.is_full() => RoomState::Active,
            Some(_) if self.was_full => RoomState::Draining,
            Some(_) => RoomState::Forming,
        }
    }

    /// Point-in-time view of the room for introspection.
    #[must_use]
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            key: self.key.clone(),
            state: self.state(),
            capacity: self.policy.capacity(),
            created_at: self.created_at,
            participants: self
                .members
                .iter()
                .map(|m| ParticipantSnapshot {
                    participant_id: m.participant().clone(),
                    display_name: m.display_name().map(str::to_string),
                    connection_id: m.id(),
                    connected_at: m.connected_at(),
                })
                .collect(),
        }
    }
}

/// Read-only copy of a room taken under the registry lock.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSnapshot {
    /// Room key.
    pub key: RoomKey,
    /// Lifecycle state at snapshot time.
    pub state: RoomState,
    /// Capacity of the room's policy (`null` when unbounded).
    pub capacity: Option<usize>,
    /// When the first participant joined.
    pub created_at: DateTime<Utc>,
    /// Participants in join order.
    pub participants: Vec<ParticipantSnapshot>,
}

impl RoomSnapshot {
    /// Returns `true` if the participant has a connection in the room.
    #[must_use]
    pub fn has_participant(&self, participant: &ParticipantId) -> bool {
        self.participants
            .iter()
            .any(|p| &p.participant_id == participant)
    }
}

/// One participant entry in a [`RoomSnapshot`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipantSnapshot {
    /// Participant identifier.
    pub participant_id: ParticipantId,
    /// Display name supplied at ingress.
    pub display_name: Option<String>,
    /// Live connection identifier.
    pub connection_id: ConnectionId,
    /// When the connection was accepted.
    pub connected_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn conn(id: &str) -> Connection {
        let Ok(participant) = id.parse() else {
            panic!("valid participant id");
        };
        Connection::new(participant, None, 4).0
    }

    #[test]
    fn bounded_room_walks_the_lifecycle() {
        let mut room = Room::new(RoomKey::session("7"), RoomPolicy::two_party());
        assert_eq!(room.state(), RoomState::Empty);

        let u1 = conn("u1");
        let d1 = conn("d1");
        assert!(matches!(room.admit(u1.clone()), Ok(Admission::Joined)));
        assert_eq!(room.state(), RoomState::Forming);
        assert!(matches!(room.admit(d1.clone()), Ok(Admission::Joined)));
        assert_eq!(room.state(), RoomState::Active);

        assert!(room.remove(d1.id()).is_some());
        assert_eq!(room.state(), RoomState::Draining);
        assert!(room.remove(u1.id()).is_some());
        assert_eq!(room.state(), RoomState::Empty);
    }

    #[test]
    fn third_join_is_rejected() {
        let mut room = Room::new(RoomKey::session("7"), RoomPolicy::two_party());
        let _ = room.admit(conn("u1"));
        let _ = room.admit(conn("d1"));
        let result = room.admit(conn("x1"));
        assert!(matches!(result, Err(RelayError::RoomFull { capacity: 2, .. })));
        assert_eq!(room.len(), 2);
    }

    #[test]
    fn same_participant_replaces_slot() {
        let mut room = Room::new(RoomKey::session("7"), RoomPolicy::two_party());
        let old = conn("u1");
        let _ = room.admit(old.clone());
        let _ = room.admit(conn("d1"));

        let fresh = conn("u1");
        let Ok(Admission::Replaced(evicted)) = room.admit(fresh.clone()) else {
            panic!("expected replacement");
        };
        assert_eq!(evicted, old);
        assert_eq!(room.len(), 2);
        assert!(room.contains(fresh.id()));
        assert!(!room.contains(old.id()));
    }

    #[test]
    fn unbounded_room_has_no_ceiling() {
        let mut room = Room::new(RoomKey::consultation(3), RoomPolicy::unbounded());
        for i in 0..10 {
            assert!(room.admit(conn(&format!("p{i}"))).is_ok());
        }
        assert_eq!(room.len(), 10);
        assert_eq!(room.state(), RoomState::Active);
    }

    #[test]
    fn peers_exclude_sender() {
        let mut room = Room::new(RoomKey::session("7"), RoomPolicy::two_party());
        let u1 = conn("u1");
        let d1 = conn("d1");
        let _ = room.admit(u1.clone());
        let _ = room.admit(d1.clone());
        assert_eq!(room.peers_of(u1.id()), vec![d1]);
    }

    #[test]
    fn zero_capacity_means_unbounded() {
        assert_eq!(RoomPolicy::with_capacity(0), RoomPolicy::unbounded());
        assert_eq!(RoomPolicy::with_capacity(3).capacity(), Some(3));
    }
}
