//! Process-wide room registry with coarse-grained locking.
//!
//! [`ConnectionRegistry`] maps each [`RoomKey`] to its [`Room`]. Rooms are
//! created on first join and removed as soon as their last participant
//! leaves, so the map never holds an empty room.

use std::collections::HashMap;

use tokio::sync::Mutex;

use super::connection::Connection;
use super::frame::{CloseReason, Frame, Outbound};
use super::ids::{ConnectionId, ParticipantId, RoomKey};
use super::room::{Admission, Room, RoomPolicy, RoomSnapshot, RoomState};
use crate::error::RelayError;

/// Outcome of a successful [`ConnectionRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Participants in the room after the join.
    pub occupancy: usize,
    /// Room state after the join.
    pub state: RoomState,
    /// Older connection of the same participant that was evicted.
    pub replaced: Option<ConnectionId>,
}

/// Outcome of a [`ConnectionRegistry::unregister`] that found its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Participants left in the room.
    pub remaining: usize,
    /// Room state after the leave (`Empty` means the room was dropped).
    pub state: RoomState,
}

/// Per-call delivery report of a fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Participants whose outbound queue accepted the frame.
    pub delivered_to: Vec<ParticipantId>,
    /// Targets that failed and were unregistered.
    pub evicted: usize,
}

impl BroadcastReport {
    /// Number of successful deliveries.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.delivered_to.len()
    }
}

/// Central store for all live rooms.
///
/// # Concurrency
///
/// - Every mutation holds the single registry lock.
/// - No network write happens under the lock: fan-out copies the target
///   list out, releases the lock, then enqueues onto each target's
///   outbound queue without blocking.
/// - Closing a connection only flips its close signal, so it never blocks
///   either.
#[derive(Debug)]
pub struct ConnectionRegistry {
    rooms: Mutex<HashMap<RoomKey, Room>>,
    policy: RoomPolicy,
}

impl ConnectionRegistry {
    /// Creates an empty registry whose rooms follow `policy`.
    #[must_use]
    pub fn new(policy: RoomPolicy) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            policy,
        }
    }

    /// Returns the capacity policy applied to new rooms.
    #[must_use]
    pub const fn policy(&self) -> RoomPolicy {
        self.policy
    }

    /// Files `conn` under `key`, creating the room if absent.
    ///
    /// A participant that is already present is replaced: the older
    /// connection is removed and closed with [`CloseReason::Replaced`].
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RoomFull`] when the room is at capacity. The
    /// rejected connection is closed with [`CloseReason::RoomFull`] and the
    /// existing room is untouched.
    pub async fn register(&self, key: RoomKey, conn: Connection) -> Result<JoinOutcome, RelayError> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .entry(key.clone())
            .or_insert_with(|| Room::new(key.clone(), self.policy));

        let admission = room.admit(conn.clone());
        let occupancy = room.len();
        let state = room.state();
        if room.is_empty() {
            rooms.remove(&key);
        }
        drop(rooms);

        match admission {
            Ok(Admission::Joined) => {
                tracing::info!(
                    room = %key,
                    participant = %conn.participant(),
                    connection = %conn.id(),
                    occupancy,
                    ?state,
                    "participant joined"
                );
                Ok(JoinOutcome {
                    occupancy,
                    state,
                    replaced: None,
                })
            }
            Ok(Admission::Replaced(old)) => {
                old.close(CloseReason::Replaced);
                tracing::info!(
                    room = %key,
                    participant = %conn.participant(),
                    connection = %conn.id(),
                    replaced = %old.id(),
                    "participant reconnected; older connection replaced"
                );
                Ok(JoinOutcome {
                    occupancy,
                    state,
                    replaced: Some(old.id()),
                })
            }
            Err(err) => {
                conn.close(CloseReason::RoomFull);
                tracing::warn!(
                    room = %key,
                    participant = %conn.participant(),
                    connection = %conn.id(),
                    "join rejected: room capacity exceeded"
                );
                Err(err)
            }
        }
    }

    /// Removes the connection from its room and closes it with
    /// [`CloseReason::Normal`] unless it was already closed for another
    /// reason. Drops the room if it becomes empty.
    ///
    /// Returns `None` if the connection was not filed under `key`.
    pub async fn unregister(&self, key: &RoomKey, id: ConnectionId) -> Option<LeaveOutcome> {
        self.remove_and_close(key, id, CloseReason::Normal).await
    }

    async fn remove_and_close(
        &self,
        key: &RoomKey,
        id: ConnectionId,
        reason: CloseReason,
    ) -> Option<LeaveOutcome> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.get_mut(key)?;
        let conn = room.remove(id)?;
        let remaining = room.len();
        let state = room.state();
        if room.is_empty() {
            rooms.remove(key);
        }
        drop(rooms);

        conn.close(reason);
        tracing::info!(
            room = %key,
            participant = %conn.participant(),
            connection = %id,
            remaining,
            reason = ?conn.close_reason().unwrap_or(reason),
            "participant left"
        );
        if state == RoomState::Empty {
            tracing::debug!(room = %key, "room removed");
        }
        Some(LeaveOutcome { remaining, state })
    }

    /// Sends `frame` to every connection in the room except `sender`.
    ///
    /// Targets whose queue is closed or full are unregistered.
    pub async fn broadcast(&self, key: &RoomKey, sender: ConnectionId, frame: Frame) -> BroadcastReport {
        let targets = self.peers(key, sender).await;
        self.deliver(key, &targets, frame).await
    }

    /// Snapshot of every connection in the room except `sender`.
    pub async fn peers(&self, key: &RoomKey, sender: ConnectionId) -> Vec<Connection> {
        self.rooms
            .lock()
            .await
            .get(key)
            .map(|room| room.peers_of(sender))
            .unwrap_or_default()
    }

    /// Enqueues `frame` on each of `targets`, outside the registry lock.
    ///
    /// Targets that fail are unregistered and closed.
    pub async fn deliver(&self, key: &RoomKey, targets: &[Connection], frame: Frame) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        for target in targets {
            match target.send(Outbound::Frame(frame.clone())) {
                Ok(()) => report.delivered_to.push(target.participant().clone()),
                Err(failure) => {
                    tracing::warn!(
                        room = %key,
                        participant = %target.participant(),
                        connection = %target.id(),
                        ?failure,
                        "delivery failed; dropping connection"
                    );
                    failed.push((target.id(), failure.close_reason()));
                }
            }
        }
        for (id, reason) in failed {
            if self.remove_and_close(key, id, reason).await.is_some() {
                report.evicted += 1;
            }
        }
        report
    }

    /// Returns `true` if the connection is filed under `key`.
    pub async fn is_registered(&self, key: &RoomKey, id: ConnectionId) -> bool {
        self.rooms
            .lock()
            .await
            .get(key)
            .is_some_and(|room| room.contains(id))
    }

    /// Returns a snapshot of one room.
    pub async fn room(&self, key: &RoomKey) -> Option<RoomSnapshot> {
        self.rooms.lock().await.get(key).map(Room::snapshot)
    }

    /// Returns snapshots of all rooms.
    pub async fn rooms(&self) -> Vec<RoomSnapshot> {
        self.rooms
            .lock()
            .await
            .values()
            .map(Room::snapshot)
            .collect()
    }

    /// Returns `true` if a room exists under `key`.
    pub async fn contains(&self, key: &RoomKey) -> bool {
        self.rooms.lock().await.contains_key(key)
    }

    /// Returns the number of live rooms.
    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Returns `true` if no room is live.
    pub async fn is_empty(&self) -> bool {
        self.rooms.lock().await.is_empty()
    }

    /// Returns the number of live connections across all rooms.
    pub async fn connection_count(&self) -> usize {
        self.rooms.lock().await.values().map(Room::len).sum()
    }

    /// Closes every connection and empties the registry.
    ///
    /// Returns the number of connections closed.
    pub async fn close_all(&self, reason: CloseReason) -> usize {
        let drained: Vec<Room> = self.rooms.lock().await.drain().map(|(_, room)| room).collect();
        let mut closed = 0;
        for room in &drained {
            for conn in room.members() {
                if conn.close(reason) {
                    closed += 1;
                }
            }
        }
        tracing::info!(rooms = drained.len(), connections = closed, ?reason, "registry drained");
        closed
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(RoomPolicy::default())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;

    fn conn(id: &str) -> (Connection, mpsc::Receiver<Outbound>) {
        let Ok(participant) = id.parse() else {
            panic!("valid participant id");
        };
        Connection::new(participant, None, 8)
    }

    fn text(body: &str) -> Frame {
        Frame::Text(body.to_string())
    }

    #[tokio::test]
    async fn joins_up_to_capacity_then_rejects() {
        let registry = ConnectionRegistry::new(RoomPolicy::two_party());
        let room = RoomKey::session("7");
        let (u1, _u1_rx) = conn("u1");
        let (d1, _d1_rx) = conn("d1");
        let (x1, mut x1_rx) = conn("x1");

        let Ok(first) = registry.register(room.clone(), u1).await else {
            panic!("first join");
        };
        assert_eq!(first.state, RoomState::Forming);
        let Ok(second) = registry.register(room.clone(), d1).await else {
            panic!("second join");
        };
        assert_eq!(second.state, RoomState::Active);

        let third = registry.register(room.clone(), x1.clone()).await;
        assert!(matches!(third, Err(RelayError::RoomFull { .. })));
        assert!(x1.is_closed());
        assert_eq!(x1_rx.recv().await, Some(Outbound::Close(CloseReason::RoomFull)));

        let Some(snapshot) = registry.room(&room).await else {
            panic!("room exists");
        };
        assert_eq!(snapshot.participants.len(), 2);
    }

    #[tokio::test]
    async fn rejected_first_join_leaves_no_room() {
        let registry = ConnectionRegistry::new(RoomPolicy::with_capacity(1));
        let room = RoomKey::session("solo");
        let (a, _a_rx) = conn("a");
        let (b, _b_rx) = conn("b");
        assert!(registry.register(room.clone(), a.clone()).await.is_ok());
        assert!(registry.register(room.clone(), b).await.is_err());
        assert!(registry.unregister(&room, a.id()).await.is_some());
        assert!(!registry.contains(&room).await);
    }

    #[tokio::test]
    async fn scenario_room_seven() {
        let registry = ConnectionRegistry::new(RoomPolicy::two_party());
        let room = RoomKey::session("7");
        let (u1, mut u1_rx) = conn("u1");
        let (d1, mut d1_rx) = conn("d1");
        let _ = registry.register(room.clone(), u1.clone()).await;
        let _ = registry.register(room.clone(), d1.clone()).await;

        let report = registry
            .broadcast(&room, u1.id(), text(r#"{"text":"hello"}"#))
            .await;
        assert_eq!(report.delivered(), 1);
        assert_eq!(
            d1_rx.recv().await,
            Some(Outbound::Frame(text(r#"{"text":"hello"}"#)))
        );
        assert!(u1_rx.try_recv().is_err());

        let Some(leave) = registry.unregister(&room, d1.id()).await else {
            panic!("d1 was registered");
        };
        assert_eq!(leave.remaining, 1);
        assert_eq!(leave.state, RoomState::Draining);
        let Some(snapshot) = registry.room(&room).await else {
            panic!("room still exists");
        };
        assert_eq!(snapshot.participants.len(), 1);
        assert!(snapshot.has_participant(u1.participant()));

        let Some(leave) = registry.unregister(&room, u1.id()).await else {
            panic!("u1 was registered");
        };
        assert_eq!(leave.state, RoomState::Empty);
        assert!(!registry.contains(&room).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn unregister_unknown_connection_is_noop() {
        let registry = ConnectionRegistry::default();
        let (u1, _rx) = conn("u1");
        assert!(registry.unregister(&RoomKey::session("x"), u1.id()).await.is_none());
    }

    #[tokio::test]
    async fn broadcast_preserves_sender_order() {
        let registry = ConnectionRegistry::new(RoomPolicy::two_party());
        let room = RoomKey::session("order");
        let (u1, _u1_rx) = conn("u1");
        let (d1, mut d1_rx) = conn("d1");
        let _ = registry.register(room.clone(), u1.clone()).await;
        let _ = registry.register(room.clone(), d1).await;

        for i in 0..5 {
            registry.broadcast(&room, u1.id(), text(&format!("m{i}"))).await;
        }
        for i in 0..5 {
            assert_eq!(
                d1_rx.recv().await,
                Some(Outbound::Frame(text(&format!("m{i}"))))
            );
        }
    }

    #[tokio::test]
    async fn failed_target_is_unregistered() {
        let registry = ConnectionRegistry::new(RoomPolicy::unbounded());
        let room = RoomKey::consultation(1);
        let (sender, _s_rx) = conn("u1");
        let (gone, gone_rx) = conn("d1");
        let (alive, mut alive_rx) = conn("n1");
        let _ = registry.register(room.clone(), sender.clone()).await;
        let _ = registry.register(room.clone(), gone.clone()).await;
        let _ = registry.register(room.clone(), alive.clone()).await;
        drop(gone_rx);

        let report = registry.broadcast(&room, sender.id(), text("hi")).await;
        assert_eq!(report.delivered(), 1);
        assert_eq!(report.evicted, 1);
        assert!(!registry.is_registered(&room, gone.id()).await);
        assert_eq!(alive_rx.recv().await, Some(Outbound::Frame(text("hi"))));
    }

    #[tokio::test]
    async fn overflowing_target_is_evicted_as_slow_consumer() {
        let registry = ConnectionRegistry::new(RoomPolicy::two_party());
        let room = RoomKey::session("slow");
        let (sender, _s_rx) = conn("u1");
        let Ok(participant) = "d1".parse() else {
            panic!("valid participant id");
        };
        let (slow, _slow_rx) = Connection::new(participant, None, 1);
        let _ = registry.register(room.clone(), sender.clone()).await;
        let _ = registry.register(room.clone(), slow.clone()).await;

        let first = registry.broadcast(&room, sender.id(), text("1")).await;
        assert_eq!(first.delivered(), 1);
        let second = registry.broadcast(&room, sender.id(), text("2")).await;
        assert_eq!(second.evicted, 1);
        assert_eq!(slow.close_reason(), Some(CloseReason::SlowConsumer));
    }

    #[tokio::test]
    async fn reconnect_replaces_previous_connection() {
        let registry = ConnectionRegistry::new(RoomPolicy::two_party());
        let room = RoomKey::session("re");
        let (old, _old_rx) = conn("u1");
        let (fresh, _fresh_rx) = conn("u1");
        let _ = registry.register(room.clone(), old.clone()).await;
        let Ok(outcome) = registry.register(room.clone(), fresh.clone()).await else {
            panic!("replacement join");
        };
        assert_eq!(outcome.replaced, Some(old.id()));
        assert_eq!(old.close_reason(), Some(CloseReason::Replaced));

        // The evicted connection's teardown must not remove the new one.
        assert!(registry.unregister(&room, old.id()).await.is_none());
        assert!(registry.is_registered(&room, fresh.id()).await);
    }

    #[tokio::test]
    async fn concurrent_joins_on_disjoint_rooms() {
        let registry = Arc::new(ConnectionRegistry::new(RoomPolicy::two_party()));
        let mut handles = Vec::new();
        for i in 0..64 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let room = RoomKey::session(format!("room-{i}"));
                let (a, _a_rx) = conn("a");
                let (b, _b_rx) = conn("b");
                let _ = registry.register(room.clone(), a.clone()).await;
                let _ = registry.register(room.clone(), b.clone()).await;
                registry.unregister(&room, a.id()).await;
                if i % 2 == 0 {
                    registry.unregister(&room, b.id()).await;
                }
            }));
        }
        for handle in handles {
            assert!(handle.await.is_ok());
        }
        assert_eq!(registry.len().await, 32);
        assert_eq!(registry.connection_count().await, 32);
    }

    #[tokio::test]
    async fn close_all_drains_everything() {
        let registry = ConnectionRegistry::default();
        let (a, _a_rx) = conn("a");
        let (b, _b_rx) = conn("b");
        let _ = registry.register(RoomKey::session("1"), a.clone()).await;
        let _ = registry.register(RoomKey::session("2"), b.clone()).await;
        assert_eq!(registry.close_all(CloseReason::Shutdown).await, 2);
        assert!(registry.is_empty().await);
        assert_eq!(a.close_reason(), Some(CloseReason::Shutdown));
    }

    #[tokio::test]
    async fn second_drain_catches_late_joins() {
        let registry = ConnectionRegistry::default();
        let (early, _early_rx) = conn("early");
        let _ = registry.register(RoomKey::session("1"), early.clone()).await;
        assert_eq!(registry.close_all(CloseReason::Shutdown).await, 1);

        // Joined after the first drain, before the listener stopped.
        let (late, mut late_rx) = conn("late");
        let _ = registry.register(RoomKey::session("1"), late.clone()).await;
        assert_eq!(registry.close_all(CloseReason::Shutdown).await, 1);
        assert_eq!(late.close_reason(), Some(CloseReason::Shutdown));
        assert_eq!(
            late_rx.recv().await,
            Some(Outbound::Close(CloseReason::Shutdown))
        );
        assert_eq!(registry.close_all(CloseReason::Shutdown).await, 0);
    }
}
