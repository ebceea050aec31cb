//! Relayed payloads and the per-connection outbound queue items.
//!
//! The relay never parses message content: a [`Frame`] is carried from
//! the sender's socket to every peer unmodified.

use serde::Serialize;
use utoipa::ToSchema;

/// Opaque payload read from one participant and fanned out to the others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame (typically a JSON-encoded chat message).
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl Frame {
    /// Returns the text body for text frames.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

/// Item on a connection's outbound queue.
///
/// The writer task owning the socket sink is the only consumer, so every
/// write to one transport is serialized through this queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Relayed payload.
    Frame(Frame),
    /// Heartbeat ping.
    Ping(Vec<u8>),
    /// Final close frame; the writer stops after sending it.
    Close(CloseReason),
}

/// Why a connection was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Explicit deregistration.
    Normal,
    /// The client sent a close frame or ended the stream.
    ClientClosed,
    /// No frame or pong arrived within the read deadline.
    HeartbeatTimeout,
    /// Reading from the transport failed.
    ReadFailed,
    /// Writing to the transport failed.
    WriteFailed,
    /// The room was already at capacity.
    RoomFull,
    /// A newer connection of the same participant took the slot.
    Replaced,
    /// The outbound queue overflowed.
    SlowConsumer,
    /// The server is shutting down.
    Shutdown,
}

impl CloseReason {
    /// WebSocket close code sent to the client.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Normal | Self::ClientClosed => 1000,
            Self::HeartbeatTimeout | Self::Shutdown => 1001,
            Self::RoomFull => 1008,
            Self::ReadFailed | Self::WriteFailed => 1011,
            Self::Replaced => 4000,
            Self::SlowConsumer => 4001,
        }
    }

    /// Short human-readable reason sent alongside the close code.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Normal => "closed",
            Self::ClientClosed => "client closed",
            Self::HeartbeatTimeout => "heartbeat timeout",
            Self::ReadFailed => "read failed",
            Self::WriteFailed => "write failed",
            Self::RoomFull => "room is full",
            Self::Replaced => "replaced by a newer connection",
            Self::SlowConsumer => "outbound queue overflow",
            Self::Shutdown => "server shutting down",
        }
    }
}
