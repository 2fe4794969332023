//! Per-connection ingest and delivery pumps.
//!
//! After the handshake a WebSocket is split in two and each half gets its own
//! task:
//!
//! ```text
//!              ┌──────────── ingest ────────────┐
//!   socket ──> │ read, decode control frame     │ ──> Hub::join / Hub::leave
//!              └────────────────────────────────┘
//!              ┌─────────── delivery ───────────┐
//!   socket <── │ write queued frames, heartbeat │ <── OutboundQueue
//!              └────────────────────────────────┘
//! ```
//!
//! Both pumps select on the connection's closed signal, so whichever side
//! fails first brings the other down. Every exit path ends in
//! `Hub::unregister`, which is idempotent.

use bytes::Bytes;
use chatline_core::{ControlFrame, Observation, OutboundFrame, SequenceTracker};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{
    self, Message, Utf8Bytes,
    protocol::{CloseFrame, frame::coding::CloseCode},
};

use crate::{
    config::SessionConfig,
    hub::{ConnectionHandle, Hub, OutboundQueue},
};

/// Why the ingest pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestExit {
    /// The connection was closed by the hub or the delivery pump
    Closed,
    /// Client sent a close frame
    PeerClosed,
    /// Stream ended without a close frame
    Eof,
    /// Transport read error
    ReadError,
    /// Nothing was received within the idle timeout
    IdleTimeout,
    /// Client sent a frame larger than allowed
    FrameTooLarge,
}

/// Why the delivery pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryExit {
    /// The connection was closed by the hub or the ingest pump
    Closed,
    /// Outbound queue closed and drained
    QueueClosed,
    /// Transport write error
    WriteError,
}

/// Read control frames until the connection closes.
pub async fn run_ingest<St>(
    hub: &Hub,
    handle: &ConnectionHandle,
    stream: &mut St,
    config: &SessionConfig,
) -> IngestExit
where
    St: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let exit = loop {
        let read = tokio::select! {
            biased;
            () = handle.closed() => break IngestExit::Closed,
            read = time::timeout(config.idle_timeout, stream.next()) => read,
        };

        let message = match read {
            Err(_) => break IngestExit::IdleTimeout,
            Ok(None) => break IngestExit::Eof,
            // The protocol layer enforces the size limit while reading
            Ok(Some(Err(tungstenite::Error::Capacity(err)))) => {
                tracing::debug!(connection_id = %handle.id(), error = %err, "inbound message too large");
                break IngestExit::FrameTooLarge;
            },
            Ok(Some(Err(err))) => {
                tracing::debug!(connection_id = %handle.id(), error = %err, "read failed");
                break IngestExit::ReadError;
            },
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => {
                if text.len() > config.max_frame_size {
                    break IngestExit::FrameTooLarge;
                }
                apply_control(hub, handle, text.as_bytes());
            },
            Message::Binary(data) => {
                if data.len() > config.max_frame_size {
                    break IngestExit::FrameTooLarge;
                }
                tracing::trace!(connection_id = %handle.id(), "ignoring binary frame");
            },
            Message::Close(_) => break IngestExit::PeerClosed,
            // Pings are answered by the protocol layer; any frame resets idle
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {},
        }
    };

    if exit != IngestExit::Closed {
        tracing::debug!(connection_id = %handle.id(), ?exit, "ingest stopped");
    }
    hub.unregister(handle);
    exit
}

fn apply_control(hub: &Hub, handle: &ConnectionHandle, bytes: &[u8]) {
    match ControlFrame::decode(bytes) {
        Ok(ControlFrame::JoinChat { chat_id }) => {
            hub.join(handle, &chat_id);
        },
        Ok(ControlFrame::LeaveChat { chat_id }) => {
            hub.leave(handle, &chat_id);
        },
        Ok(ControlFrame::Unknown) => {
            tracing::trace!(connection_id = %handle.id(), "ignoring unknown control frame");
        },
        Err(err) => {
            tracing::debug!(connection_id = %handle.id(), error = %err, "ignoring control frame");
        },
    }
}

/// Write queued frames and heartbeats until the connection closes.
///
/// Sends a close frame on the way out unless the transport already failed.
pub async fn run_delivery<Si>(
    hub: &Hub,
    handle: &ConnectionHandle,
    sink: &mut Si,
    mut outbound: OutboundQueue,
    config: &SessionConfig,
) -> DeliveryExit
where
    Si: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let mut heartbeat =
        time::interval_at(Instant::now() + config.heartbeat_interval, config.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tracker = SequenceTracker::new();

    let exit = loop {
        let message = tokio::select! {
            biased;
            () = handle.closed() => break DeliveryExit::Closed,
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    observe(&mut tracker, handle, &frame);
                    frame_message(frame.into_payload())
                },
                None => break DeliveryExit::QueueClosed,
            },
            _ = heartbeat.tick() => Message::Ping(Bytes::new()),
        };

        let written = tokio::select! {
            biased;
            () = handle.closed() => break DeliveryExit::Closed,
            written = sink.send(message) => written,
        };

        if let Err(err) = written {
            tracing::debug!(connection_id = %handle.id(), error = %err, "write failed");
            break DeliveryExit::WriteError;
        }
    };

    if exit != DeliveryExit::WriteError {
        let close = Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: Utf8Bytes::from_static("closing"),
        }));
        let _ = time::timeout(config.close_timeout, sink.send(close)).await;
    }

    hub.unregister(handle);
    exit
}

fn observe(tracker: &mut SequenceTracker, handle: &ConnectionHandle, frame: &OutboundFrame) {
    if let Observation::Gap { missed } = tracker.observe(frame) {
        tracing::debug!(
            connection_id = %handle.id(),
            scope = ?frame.scope(),
            missed,
            "sequence gap"
        );
    }
}

/// Payloads that are valid UTF-8 travel as text frames, anything else as
/// binary. The bytes are sent unchanged either way.
pub(crate) fn frame_message(payload: Bytes) -> Message {
    match Utf8Bytes::try_from(payload.clone()) {
        Ok(text) => Message::Text(text),
        Err(_) => Message::Binary(payload),
    }
}
