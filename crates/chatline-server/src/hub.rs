//! Shared hub handle for the tokio runtime.
//!
//! [`Hub`] wraps [`HubState`] in one mutex. Every operation takes the lock,
//! mutates, and releases it before returning; nothing awaits while holding
//! it. Fan-out only calls `try_send` on bounded channels, so the critical
//! section is bounded by the number of members, never by client speed.
//!
//! # Per-connection plumbing
//!
//! ```text
//!              Hub::publish
//!                   │ try_send
//!                   ▼
//!   QueueSink ──mpsc(cap)──> OutboundQueue ──> delivery pump ──> socket
//!       │
//!       └── watch<ConnectionState> ──> ConnectionHandle::closed()
//!                                      (both pumps select on it)
//! ```
//!
//! Closing the sink (from any unregister path) flips the watch to `Closed`,
//! which wakes both pumps. That signal and the queue are the only state the
//! pumps share.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use bytes::Bytes;
use chatline_core::{
    ConnectionId, ConnectionState, Departure, EnqueueError, FrameSink, HubConfig, HubError,
    HubState, HubStats, Identity, JoinOutcome, LeaveOutcome, OutboundFrame, RoomId,
};
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    watch,
};

use crate::events::ChatEvent;

/// Hub-owned writing end of a connection's outbound queue.
#[derive(Debug)]
pub struct QueueSink {
    tx: mpsc::Sender<OutboundFrame>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl FrameSink for QueueSink {
    fn try_enqueue(&self, frame: OutboundFrame) -> Result<(), EnqueueError> {
        self.tx.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    fn closing(&self) {
        advance(&self.state, ConnectionState::Closing);
    }

    fn close(self) {
        advance(&self.state, ConnectionState::Closed);
        // Dropping `tx` closes the queue
    }
}

fn advance(state: &watch::Sender<ConnectionState>, next: ConnectionState) -> bool {
    state.send_if_modified(|current| current.advance(next))
}

/// Reading end of a connection's outbound queue, owned by its delivery pump.
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::Receiver<OutboundFrame>,
}

impl OutboundQueue {
    /// Wait for the next frame. `None` once the queue is closed and empty.
    pub async fn recv(&mut self) -> Option<OutboundFrame> {
        self.rx.recv().await
    }

    /// Take the next frame if one is queued.
    pub fn try_recv(&mut self) -> Option<OutboundFrame> {
        self.rx.try_recv().ok()
    }
}

/// Caller-side reference to a registered connection.
///
/// Cheap to clone. Outliving the connection is fine: operations on a closed
/// handle are no-ops.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    identity: Identity,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl ConnectionHandle {
    /// Connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Identity the connection authenticated as.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether the connection has been unregistered.
    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    /// Mark the connection as shutting down.
    ///
    /// Returns `false` if it was already closing or closed.
    pub fn begin_closing(&self) -> bool {
        advance(&self.state, ConnectionState::Closing)
    }

    /// Subscribe to lifecycle changes.
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Resolves once the connection reaches `Closed`.
    pub async fn closed(&self) {
        let mut rx = self.state.subscribe();
        // Err only if every sender is gone, which cannot outlive `self`
        let _ = rx.wait_for(|state| state.is_closed()).await;
    }
}

/// A freshly registered connection.
#[derive(Debug)]
pub struct Registration {
    /// Handle for hub operations and lifecycle
    pub handle: ConnectionHandle,
    /// Frames to write to the socket
    pub outbound: OutboundQueue,
}

struct Shared {
    state: Mutex<HubState<QueueSink>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

/// Thread-safe handle to the process-wide hub.
///
/// Cloning shares the same hub. Request handlers hold a clone to publish;
/// every accepted connection holds one to join, leave and unregister.
#[derive(Clone)]
pub struct Hub {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub").field("stats", &self.stats()).finish()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl Hub {
    /// Create an empty hub.
    pub fn new(config: HubConfig) -> Self {
        let queue_capacity = config.effective_queue_capacity();
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(HubState::new(config)),
                next_id: AtomicU64::new(1),
                queue_capacity,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState<QueueSink>> {
        // Every mutation completes before the guard drops; a panic elsewhere
        // cannot leave the maps half-updated
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection for an authenticated identity.
    ///
    /// # Errors
    ///
    /// - `HubError::CapacityExceeded` if the connection limit is reached
    /// - `HubError::ShuttingDown` after [`Hub::shutdown`]
    pub fn register(&self, identity: Identity) -> Result<Registration, HubError> {
        let id = ConnectionId::new(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.shared.queue_capacity);
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let state = Arc::new(state);
        let sink = QueueSink { tx, state: Arc::clone(&state) };

        {
            let mut hub = self.lock();
            if let Err(err) = hub.register(id, identity.clone(), sink) {
                advance(&state, ConnectionState::Closed);
                return Err(err);
            }
            advance(&state, ConnectionState::Registered);
        }

        Ok(Registration {
            handle: ConnectionHandle { id, identity, state },
            outbound: OutboundQueue { rx },
        })
    }

    /// Unregister a connection: purge its rooms, close its queue.
    ///
    /// Idempotent. Returns `None` if it was already unregistered.
    pub fn unregister(&self, handle: &ConnectionHandle) -> Option<Departure> {
        handle.begin_closing();
        self.lock().unregister(handle.id)
    }

    /// Server-initiated disconnect of one connection (moderation).
    ///
    /// Returns `true` if the connection was open.
    pub fn disconnect(&self, handle: &ConnectionHandle) -> bool {
        let closed = self.unregister(handle).is_some();
        if closed {
            tracing::info!(connection_id = %handle.id, identity = %handle.identity, "connection disconnected");
        }
        closed
    }

    /// Disconnect every connection of an identity (forced logout).
    ///
    /// Returns how many connections were closed.
    pub fn disconnect_identity(&self, identity: &Identity) -> usize {
        let closed = self.lock().disconnect_identity(identity);
        if closed > 0 {
            tracing::info!(%identity, connections = closed, "identity disconnected");
        }
        closed
    }

    /// Disconnect everyone and refuse new registrations.
    ///
    /// Returns how many connections were closed.
    pub fn shutdown(&self) -> usize {
        self.lock().shutdown()
    }

    /// Subscribe a connection to a room.
    pub fn join(&self, handle: &ConnectionHandle, room_id: &RoomId) -> JoinOutcome {
        self.lock().join(handle.id, room_id)
    }

    /// Unsubscribe a connection from a room.
    pub fn leave(&self, handle: &ConnectionHandle, room_id: &RoomId) -> LeaveOutcome {
        self.lock().leave(handle.id, room_id)
    }

    /// Fan an opaque payload out to a room.
    ///
    /// Never blocks on a client. Members whose queue is full are dropped.
    /// Returns how many members the payload was queued for.
    pub fn publish(&self, room_id: &RoomId, payload: impl Into<Bytes>) -> usize {
        let payload = payload.into();
        self.lock().publish(room_id, payload)
    }

    /// Encode an event and publish it to a room.
    ///
    /// # Errors
    ///
    /// Returns the encoding error; nothing is published in that case.
    pub fn publish_event(&self, room_id: &RoomId, event: &ChatEvent) -> Result<usize, serde_json::Error> {
        let payload = event.encode()?;
        Ok(self.publish(room_id, payload))
    }

    /// Fan an opaque payload out to every connection.
    pub fn broadcast_global(&self, payload: impl Into<Bytes>) -> usize {
        let payload = payload.into();
        self.lock().broadcast_global(payload)
    }

    /// Whether the connection is still registered.
    pub fn is_registered(&self, handle: &ConnectionHandle) -> bool {
        self.lock().is_registered(handle.id)
    }

    /// Rooms a connection is in.
    pub fn rooms_of(&self, handle: &ConnectionHandle) -> Vec<RoomId> {
        self.lock().rooms_of(handle.id).cloned().collect()
    }

    /// Whether an identity has a live connection.
    pub fn is_online(&self, identity: &Identity) -> bool {
        self.lock().is_online(identity)
    }

    /// Live connections of an identity.
    pub fn connections_for(&self, identity: &Identity) -> Vec<ConnectionId> {
        self.lock().connections_for(identity).collect()
    }

    /// Number of members in a room.
    pub fn room_size(&self, room_id: &RoomId) -> usize {
        self.lock().room_size(room_id)
    }

    /// Whether a room exists.
    pub fn has_room(&self, room_id: &RoomId) -> bool {
        self.lock().has_room(room_id)
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.lock().room_count()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.lock().connection_count()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> HubStats {
        self.lock().stats()
    }
}
