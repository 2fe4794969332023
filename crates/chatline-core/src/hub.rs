//! Hub state: the single authority over connections, rooms and fan-out.
//!
//! Every operation takes `&mut self`, so whoever owns the state (a lock in the
//! production runtime, a plain value in tests) totally orders registration,
//! membership changes and publishes. Nothing here blocks: fan-out offers each
//! member's sink a frame and moves on.
//!
//! # Invariants
//!
//! - A connection is in a room's member set iff the room is in the
//!   connection's joined set (maintained by [`RoomRegistry`]).
//! - Rooms without members do not exist.
//! - Every registered connection is tracked by the registry and indexed under
//!   its identity; unregistered connections appear nowhere.
//! - A sink that refuses a frame gets its connection unregistered before the
//!   publishing call returns. No frame is dropped for a connection that is
//!   still reported as registered.
//! - After [`HubState::shutdown`] no connection is ever registered again.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;

use crate::{
    config::HubConfig,
    error::{EnqueueError, HubError},
    frame::OutboundFrame,
    ids::{ConnectionId, Identity, RoomId},
    registry::RoomRegistry,
    sink::FrameSink,
    stats::HubStats,
};

/// Result of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Connection added to the room
    Joined,
    /// Connection was already a member; nothing changed
    AlreadyMember,
    /// Connection is not registered (already closed); nothing changed
    NotRegistered,
}

/// Result of a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Connection removed from the room
    Left {
        /// The room had no members left and was deleted
        room_deleted: bool,
    },
    /// Connection was never in the room; nothing changed
    UnknownRoom,
    /// Connection is not registered (already closed); nothing changed
    NotRegistered,
}

/// What an unregistered connection left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// Identity the connection was bound to
    pub identity: Identity,
    /// Rooms the connection was a member of
    pub rooms: Vec<RoomId>,
}

/// A registered connection as seen by the hub.
#[derive(Debug)]
struct Member<S> {
    identity: Identity,
    sink: S,
}

/// Hub state, generic over the outbound queue implementation.
#[derive(Debug)]
pub struct HubState<S: FrameSink> {
    /// Limits
    config: HubConfig,
    /// Connection ID → identity and outbound sink
    connections: HashMap<ConnectionId, Member<S>>,
    /// Identity → its live connections
    identities: HashMap<Identity, HashSet<ConnectionId>>,
    /// Room memberships
    registry: RoomRegistry,
    /// Sequence number of the last global broadcast
    global_seq: u64,
    /// Running counters
    stats: HubStats,
    /// Set by `shutdown`; refuses further registrations
    shutting_down: bool,
}

impl<S: FrameSink> Default for HubState<S> {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl<S: FrameSink> HubState<S> {
    /// Create an empty hub.
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            connections: HashMap::new(),
            identities: HashMap::new(),
            registry: RoomRegistry::new(),
            global_seq: 0,
            stats: HubStats::default(),
            shutting_down: false,
        }
    }

    /// Hub limits.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a connection and take ownership of its outbound sink.
    ///
    /// # Errors
    ///
    /// - `HubError::ShuttingDown` once `shutdown` has been called
    /// - `HubError::DuplicateRegistration` if `id` is already registered
    /// - `HubError::CapacityExceeded` if `max_connections` are registered
    ///
    /// On error the sink is dropped without being closed; the caller still
    /// owns the connection's lifecycle.
    pub fn register(&mut self, id: ConnectionId, identity: Identity, sink: S) -> Result<(), HubError> {
        if self.shutting_down {
            return Err(HubError::ShuttingDown);
        }

        if self.connections.contains_key(&id) {
            return Err(HubError::DuplicateRegistration(id));
        }

        if self.connections.len() >= self.config.max_connections {
            return Err(HubError::CapacityExceeded { limit: self.config.max_connections });
        }

        self.registry.track(id);
        self.identities.entry(identity.clone()).or_default().insert(id);

        tracing::debug!(connection_id = %id, identity = %identity, "connection registered");

        self.connections.insert(id, Member { identity, sink });
        self.stats.registered_total += 1;
        Ok(())
    }

    /// Unregister a connection.
    ///
    /// Removes it from every room (deleting rooms left empty), from the
    /// identity index and from the connection set, then closes its sink.
    /// Returns `None` if the connection is not registered, which makes
    /// repeated calls harmless.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Departure> {
        let Member { identity, sink } = self.connections.remove(&id)?;
        let rooms: Vec<RoomId> = self.registry.untrack(id).unwrap_or_default().into_iter().collect();

        if let Some(conns) = self.identities.get_mut(&identity) {
            conns.remove(&id);
            if conns.is_empty() {
                self.identities.remove(&identity);
            }
        }

        sink.close();
        self.stats.unregistered_total += 1;

        tracing::debug!(
            connection_id = %id,
            identity = %identity,
            rooms = rooms.len(),
            "connection unregistered"
        );

        Some(Departure { identity, rooms })
    }

    /// Add a connection to a room, creating the room if needed.
    pub fn join(&mut self, id: ConnectionId, room_id: &RoomId) -> JoinOutcome {
        match self.registry.join(id, room_id) {
            Some(true) => {
                tracing::debug!(connection_id = %id, room = %room_id, "joined room");
                JoinOutcome::Joined
            },
            Some(false) => JoinOutcome::AlreadyMember,
            None => JoinOutcome::NotRegistered,
        }
    }

    /// Remove a connection from a room, deleting the room if it empties.
    pub fn leave(&mut self, id: ConnectionId, room_id: &RoomId) -> LeaveOutcome {
        if !self.registry.is_tracked(id) {
            return LeaveOutcome::NotRegistered;
        }

        if !self.registry.leave(id, room_id) {
            return LeaveOutcome::UnknownRoom;
        }

        let room_deleted = !self.registry.has_room(room_id);
        tracing::debug!(connection_id = %id, room = %room_id, room_deleted, "left room");
        LeaveOutcome::Left { room_deleted }
    }

    /// Fan a payload out to every member of a room.
    ///
    /// Members whose queue refuses the frame are unregistered. Returns the
    /// number of members the frame was enqueued for; an absent room yields 0.
    pub fn publish(&mut self, room_id: &RoomId, payload: Bytes) -> usize {
        let Some(seq) = self.registry.next_seq(room_id) else {
            return 0;
        };

        self.stats.published_frames += 1;

        let targets: Vec<ConnectionId> = self.registry.members(room_id).collect();
        let frame = OutboundFrame::room(room_id.clone(), seq, payload);
        self.fan_out(targets, &frame)
    }

    /// Fan a payload out to every registered connection.
    ///
    /// Same drop policy as [`HubState::publish`].
    pub fn broadcast_global(&mut self, payload: Bytes) -> usize {
        self.global_seq += 1;
        self.stats.global_broadcasts += 1;

        let targets: Vec<ConnectionId> = self.connections.keys().copied().collect();
        let frame = OutboundFrame::global(self.global_seq, payload);
        self.fan_out(targets, &frame)
    }

    fn fan_out(&mut self, targets: Vec<ConnectionId>, frame: &OutboundFrame) -> usize {
        let mut delivered = 0;
        let mut refused: Vec<(ConnectionId, EnqueueError)> = Vec::new();

        for id in targets {
            let Some(member) = self.connections.get(&id) else {
                continue;
            };

            match member.sink.try_enqueue(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(reason) => {
                    tracing::warn!(
                        connection_id = %id,
                        identity = %member.identity,
                        %reason,
                        "dropping slow connection"
                    );
                    refused.push((id, reason));
                },
            }
        }

        self.stats.delivered_frames += delivered as u64;

        for (id, reason) in refused {
            match reason {
                EnqueueError::Full => self.stats.backpressure_drops += 1,
                EnqueueError::Closed => self.stats.closed_queue_drops += 1,
            }
            self.unregister(id);
        }

        delivered
    }

    /// Unregister every connection bound to an identity (forced logout).
    ///
    /// Returns how many connections were closed.
    pub fn disconnect_identity(&mut self, identity: &Identity) -> usize {
        let conns: Vec<ConnectionId> =
            self.identities.get(identity).into_iter().flatten().copied().collect();

        self.force_close(conns)
    }

    /// Unregister every connection and refuse new registrations from now on.
    ///
    /// Returns how many connections were closed.
    pub fn shutdown(&mut self) -> usize {
        self.shutting_down = true;
        let conns: Vec<ConnectionId> = self.connections.keys().copied().collect();
        self.force_close(conns)
    }

    /// Whether `shutdown` has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Server-initiated close: every sink hears `closing` before any is closed.
    fn force_close(&mut self, conns: Vec<ConnectionId>) -> usize {
        for id in &conns {
            if let Some(member) = self.connections.get(id) {
                member.sink.closing();
            }
        }

        conns.into_iter().filter(|id| self.unregister(*id).is_some()).count()
    }

    /// Check if a connection is registered.
    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Identity bound to a connection. `None` if not registered.
    pub fn identity_of(&self, id: ConnectionId) -> Option<&Identity> {
        self.connections.get(&id).map(|member| &member.identity)
    }

    /// Live connections of an identity.
    pub fn connections_for(&self, identity: &Identity) -> impl Iterator<Item = ConnectionId> + '_ {
        self.identities.get(identity).into_iter().flatten().copied()
    }

    /// Whether an identity has at least one live connection.
    pub fn is_online(&self, identity: &Identity) -> bool {
        self.identities.contains_key(identity)
    }

    /// All registered connections.
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.keys().copied()
    }

    /// Rooms a connection is in.
    pub fn rooms_of(&self, id: ConnectionId) -> impl Iterator<Item = &RoomId> + '_ {
        self.registry.rooms_of(id)
    }

    /// Check if a connection is a member of a room.
    pub fn is_member(&self, id: ConnectionId, room_id: &RoomId) -> bool {
        self.registry.is_member(id, room_id)
    }

    /// Number of members in a room.
    pub fn room_size(&self, room_id: &RoomId) -> usize {
        self.registry.room_size(room_id)
    }

    /// Whether a room currently exists.
    pub fn has_room(&self, room_id: &RoomId) -> bool {
        self.registry.has_room(room_id)
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.registry.room_count()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Read-only view of room memberships.
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Snapshot of the hub counters.
    pub fn stats(&self) -> HubStats {
        HubStats {
            active_connections: self.connections.len(),
            active_rooms: self.registry.room_count(),
            ..self.stats
        }
    }
}
