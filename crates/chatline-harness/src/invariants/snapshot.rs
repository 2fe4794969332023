//! Observable hub state for invariant checking.

use std::collections::{BTreeMap, BTreeSet};

use chatline_core::{ConnectionId, FrameSink, HubState, Identity, RoomId};

/// Copy of the hub's connection, identity and membership tables.
///
/// Ordered collections keep violation messages deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubSnapshot {
    /// Registered connections and the identity each is bound to.
    pub connections: BTreeMap<ConnectionId, Identity>,
    /// Identity → connections, as answered by the hub's identity lookup.
    pub identity_index: BTreeMap<Identity, BTreeSet<ConnectionId>>,
    /// Room → members.
    pub rooms: BTreeMap<RoomId, BTreeSet<ConnectionId>>,
    /// Connection → joined rooms, for every connection the registry tracks.
    pub memberships: BTreeMap<ConnectionId, BTreeSet<RoomId>>,
}

impl HubSnapshot {
    /// Capture the current state of a hub.
    pub fn from_hub<S: FrameSink>(hub: &HubState<S>) -> Self {
        let connections: BTreeMap<_, _> = hub
            .connections()
            .filter_map(|id| hub.identity_of(id).map(|identity| (id, identity.clone())))
            .collect();

        let identity_index = connections
            .values()
            .map(|identity| (identity.clone(), hub.connections_for(identity).collect()))
            .collect();

        let rooms = hub
            .registry()
            .rooms()
            .map(|(room_id, members)| (room_id.clone(), members.iter().copied().collect()))
            .collect();

        let memberships = hub
            .registry()
            .memberships()
            .map(|(conn, rooms)| (conn, rooms.iter().cloned().collect()))
            .collect();

        Self { connections, identity_index, rooms, memberships }
    }
}
