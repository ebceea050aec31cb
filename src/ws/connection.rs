//! WebSocket connection lifecycle.
//!
//! Each accepted socket runs as two tasks:
//!
//! - a writer task that owns the socket sink and drains the connection's
//!   outbound queue, so writes to one transport are always serialized;
//! - the reader loop (this module's [`run_connection`]) that relays
//!   inbound frames, answers pings, sends heartbeat pings, and enforces
//!   the read deadline.
//!
//! Connection states: `Connecting → Registered → Active → Unregistering →
//! Closed`. Closed is terminal; a client must upgrade again to rejoin.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::join::JoinRequest;
use super::liveness::{Heartbeat, ReadDeadline};
use crate::domain::{CloseReason, Connection, Frame, Outbound};
use crate::service::RelayService;

/// Per-connection settings shared by every session.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Ping interval and read deadline.
    pub heartbeat: Heartbeat,
    /// Capacity of each connection's outbound queue.
    pub outbound_queue_capacity: usize,
    /// How long the writer may keep flushing after the connection closed
    /// before the transport is dropped.
    pub close_grace: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            heartbeat: Heartbeat::default(),
            outbound_queue_capacity: 64,
            close_grace: Duration::from_secs(5),
        }
    }
}

/// Counts connection tasks that are still running, including ones that
/// already left their room but have not released their transport yet.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker(Arc<AtomicUsize>);

impl SessionTracker {
    /// Creates a tracker with no sessions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a session as running until the returned guard is dropped.
    #[must_use]
    pub fn enter(&self) -> SessionGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        SessionGuard(Arc::clone(&self.0))
    }

    /// Number of running sessions.
    #[must_use]
    pub fn active(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Keeps one session counted in its [`SessionTracker`].
#[derive(Debug)]
pub struct SessionGuard(Arc<AtomicUsize>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs one upgraded socket from registration until teardown.
///
/// Returns once the connection is unregistered and its transport is
/// released. A writer that cannot flush within `settings.close_grace`
/// (the peer stopped reading) is aborted, which drops the socket. Errors
/// never leave this function: they close this connection only.
pub async fn run_connection(
    socket: WebSocket,
    join: JoinRequest,
    relay: Arc<RelayService>,
    settings: SessionSettings,
    sessions: SessionTracker,
) {
    let _session = sessions.enter();
    let JoinRequest {
        room,
        participant,
        display_name,
    } = join;
    let (conn, outbound_rx) =
        Connection::new(participant, display_name, settings.outbound_queue_capacity);
    let (ws_tx, mut ws_rx) = socket.split();
    let writer = tokio::spawn(writer_task(ws_tx, outbound_rx, conn.clone()));

    let registry = Arc::clone(relay.registry());
    if registry.register(room.clone(), conn.clone()).await.is_err() {
        // The registry already closed the connection; let the writer
        // deliver the close frame.
        finish_writer(writer, &conn, settings.close_grace).await;
        return;
    }

    let mut ticker = settings.heartbeat.ticker();
    let mut deadline = ReadDeadline::start(settings.heartbeat.deadline());

    loop {
        tokio::select! {
            biased;
            () = conn.closed() => break,
            () = tokio::time::sleep_until(deadline.expires_at()) => {
                tracing::warn!(
                    room = %room,
                    participant = %conn.participant(),
                    connection = %conn.id(),
                    "read deadline lapsed; dropping connection"
                );
                conn.close(CloseReason::HeartbeatTimeout);
                break;
            }
            _ = ticker.tick() => {
                if let Err(failure) = conn.send(Outbound::Ping(Vec::new())) {
                    tracing::warn!(
                        room = %room,
                        connection = %conn.id(),
                        ?failure,
                        "heartbeat ping failed"
                    );
                    conn.close(failure.close_reason());
                    break;
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        deadline.touch();
                        relay.relay(&room, &conn, Frame::Text(text.as_str().to_owned())).await;
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        deadline.touch();
                        relay.relay(&room, &conn, Frame::Binary(bytes.to_vec())).await;
                    }
                    // The transport answers pings itself.
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => deadline.touch(),
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(
                            room = %room,
                            connection = %conn.id(),
                            reason = ?frame,
                            "client initiated close"
                        );
                        conn.close(CloseReason::ClientClosed);
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(
                            room = %room,
                            connection = %conn.id(),
                            error = %e,
                            "websocket receive error"
                        );
                        conn.close(CloseReason::ReadFailed);
                        break;
                    }
                    None => {
                        conn.close(CloseReason::ClientClosed);
                        break;
                    }
                }
            }
        }
    }

    registry.unregister(&room, conn.id()).await;
    finish_writer(writer, &conn, settings.close_grace).await;
    tracing::debug!(
        room = %room,
        connection = %conn.id(),
        reason = ?conn.close_reason(),
        "ws connection closed"
    );
}

/// Writer task: forwards the outbound queue to the socket sink.
///
/// Stops after sending a close frame, or on the first failed write, in
/// which case the connection is closed so the reader loop tears it down.
async fn writer_task(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
    conn: Connection,
) {
    loop {
        let outbound = tokio::select! {
            biased;
            item = rx.recv() => match item {
                Some(item) => item,
                None => break,
            },
            () = conn.closed() => Outbound::Close(conn.close_reason().unwrap_or(CloseReason::Normal)),
        };
        let last = matches!(outbound, Outbound::Close(_));
        if ws_tx.send(into_message(outbound)).await.is_err() {
            conn.close(CloseReason::WriteFailed);
            break;
        }
        if last {
            break;
        }
    }
    let _ = ws_tx.close().await;
}

/// Waits up to `grace` for the writer to flush, then aborts it so the
/// sink, and with it the transport, is dropped.
async fn finish_writer(mut writer: JoinHandle<()>, conn: &Connection, grace: Duration) {
    if tokio::time::timeout(grace, &mut writer).await.is_err() {
        tracing::warn!(
            participant = %conn.participant(),
            connection = %conn.id(),
            ?grace,
            "writer stalled on a peer that stopped reading; dropping transport"
        );
        writer.abort();
        let _ = writer.await;
    }
}

fn into_message(outbound: Outbound) -> Message {
    match outbound {
        Outbound::Frame(Frame::Text(text)) => Message::text(text),
        Outbound::Frame(Frame::Binary(bytes)) => Message::binary(bytes),
        Outbound::Ping(payload) => Message::Ping(payload.into()),
        Outbound::Close(reason) => Message::Close(Some(CloseFrame {
            code: reason.code(),
            reason: reason.description().into(),
        })),
    }
}
