//! Domain layer: identifiers, connections, rooms, and the registry.
//!
//! This module holds the relay's shared state. Connections are filed
//! under rooms in the [`ConnectionRegistry`], which owns room lifecycle
//! and fan-out.

pub mod connection;
pub mod frame;
pub mod ids;
pub mod registry;
pub mod room;

pub use connection::{Connection, SendFailure};
pub use frame::{CloseReason, Frame, Outbound};
pub use ids::{ConnectionId, ParticipantId, RoomKey};
pub use registry::{BroadcastReport, ConnectionRegistry, JoinOutcome, LeaveOutcome};
pub use room::{RoomPolicy, RoomSnapshot, RoomState};
