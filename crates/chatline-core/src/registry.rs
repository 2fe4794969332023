//! Room registry for conversation subscription tracking.
//!
//! The registry maintains bidirectional mappings: room → connections (for
//! fan-out) and connection → rooms (for cleanup on disconnect). Both sides are
//! updated together by every operation, so a connection is listed in a room
//! exactly when that room is listed for the connection.
//!
//! Rooms are created lazily on first join and removed as soon as their last
//! member leaves or disconnects. Churn never leaves empty rooms behind.
//!
//! The registry is a plain data structure. It is only ever touched from inside
//! the hub's serialized section, so it needs no interior synchronization.

use std::collections::{HashMap, HashSet};

use crate::ids::{ConnectionId, RoomId};

/// One live room.
#[derive(Debug, Default)]
struct Room {
    /// Subscribed connections (never empty while the room exists)
    members: HashSet<ConnectionId>,
    /// Sequence number of the last frame published to this room
    last_seq: u64,
}

/// Registry of room memberships.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    /// Room ID → room members and sequence counter
    rooms: HashMap<RoomId, Room>,
    /// Connection ID → joined room IDs. Present for every tracked connection,
    /// possibly empty
    joined: HashMap<ConnectionId, HashSet<RoomId>>,
}

impl RoomRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a connection with no rooms.
    ///
    /// Returns `false` if the connection is already tracked.
    pub fn track(&mut self, conn: ConnectionId) -> bool {
        if self.joined.contains_key(&conn) {
            return false;
        }
        self.joined.insert(conn, HashSet::new());
        true
    }

    /// Stop tracking a connection and remove all its memberships.
    ///
    /// Rooms left empty are deleted. Returns the rooms the connection was in,
    /// or `None` if it was not tracked.
    pub fn untrack(&mut self, conn: ConnectionId) -> Option<HashSet<RoomId>> {
        let rooms = self.joined.remove(&conn)?;

        for room_id in &rooms {
            self.remove_member(room_id, conn);
        }

        Some(rooms)
    }

    /// Whether a connection is tracked.
    pub fn is_tracked(&self, conn: ConnectionId) -> bool {
        self.joined.contains_key(&conn)
    }

    /// Add a tracked connection to a room, creating the room if needed.
    ///
    /// Returns `Some(true)` if the connection was added, `Some(false)` if it
    /// was already a member, and `None` if the connection is not tracked.
    pub fn join(&mut self, conn: ConnectionId, room_id: &RoomId) -> Option<bool> {
        let rooms = self.joined.get_mut(&conn)?;
        if !rooms.insert(room_id.clone()) {
            return Some(false);
        }

        self.rooms.entry(room_id.clone()).or_default().members.insert(conn);
        Some(true)
    }

    /// Remove a connection from a room.
    ///
    /// Returns `true` if the connection was a member. The room is deleted if
    /// this was its last member.
    pub fn leave(&mut self, conn: ConnectionId, room_id: &RoomId) -> bool {
        let removed = self.joined.get_mut(&conn).is_some_and(|rooms| rooms.remove(room_id));
        if removed {
            self.remove_member(room_id, conn);
        }
        removed
    }

    fn remove_member(&mut self, room_id: &RoomId, conn: ConnectionId) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.members.remove(&conn);
            if room.members.is_empty() {
                self.rooms.remove(room_id);
            }
        }
    }

    /// Check if a connection is a member of a room.
    pub fn is_member(&self, conn: ConnectionId, room_id: &RoomId) -> bool {
        self.rooms.get(room_id).is_some_and(|room| room.members.contains(&conn))
    }

    /// All connections in a room.
    pub fn members(&self, room_id: &RoomId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.rooms.get(room_id).into_iter().flat_map(|room| room.members.iter().copied())
    }

    /// All rooms a connection is in.
    pub fn rooms_of(&self, conn: ConnectionId) -> impl Iterator<Item = &RoomId> + '_ {
        self.joined.get(&conn).into_iter().flatten()
    }

    /// Every live room with its members.
    pub fn rooms(&self) -> impl Iterator<Item = (&RoomId, &HashSet<ConnectionId>)> + '_ {
        self.rooms.iter().map(|(id, room)| (id, &room.members))
    }

    /// Every tracked connection with its rooms.
    pub fn memberships(&self) -> impl Iterator<Item = (ConnectionId, &HashSet<RoomId>)> + '_ {
        self.joined.iter().map(|(conn, rooms)| (*conn, rooms))
    }

    /// Whether a room currently exists (has at least one member).
    pub fn has_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Number of members in a room. Zero for absent rooms.
    pub fn room_size(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.members.len())
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of tracked connections.
    pub fn connection_count(&self) -> usize {
        self.joined.len()
    }

    /// Allocate the next sequence number for a room.
    ///
    /// `None` if the room does not exist. A room that is deleted and later
    /// recreated starts again from 1.
    pub fn next_seq(&mut self, room_id: &RoomId) -> Option<u64> {
        let room = self.rooms.get_mut(room_id)?;
        room.last_seq += 1;
        Some(room.last_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(raw: u64) -> ConnectionId {
        ConnectionId::new(raw)
    }

    #[test]
    fn track_duplicate_fails() {
        let mut registry = RoomRegistry::new();

        assert!(registry.track(conn(1)));
        assert!(!registry.track(conn(1)));
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn join_creates_room_lazily() {
        let mut registry = RoomRegistry::new();
        let room = RoomId::new("r1");

        registry.track(conn(1));
        assert!(!registry.has_room(&room));

        assert_eq!(registry.join(conn(1), &room), Some(true));
        assert!(registry.has_room(&room));
        assert!(registry.is_member(conn(1), &room));
    }

    #[test]
    fn join_twice_is_noop() {
        let mut registry = RoomRegistry::new();
        let room = RoomId::new("r1");

        registry.track(conn(1));
        registry.join(conn(1), &room);

        assert_eq!(registry.join(conn(1), &room), Some(false));
        assert_eq!(registry.room_size(&room), 1);
    }

    #[test]
    fn join_untracked_connection_fails() {
        let mut registry = RoomRegistry::new();
        let room = RoomId::new("r1");

        assert_eq!(registry.join(conn(9), &room), None);
        assert!(!registry.has_room(&room));
    }

    #[test]
    fn leave_removes_from_both_maps_and_reaps() {
        let mut registry = RoomRegistry::new();
        let room = RoomId::new("r1");

        registry.track(conn(1));
        registry.join(conn(1), &room);

        assert!(registry.leave(conn(1), &room));
        assert!(!registry.is_member(conn(1), &room));
        assert!(!registry.has_room(&room));
        assert_eq!(registry.rooms_of(conn(1)).count(), 0);
    }

    #[test]
    fn leave_unknown_room_is_false() {
        let mut registry = RoomRegistry::new();

        registry.track(conn(1));
        assert!(!registry.leave(conn(1), &RoomId::new("never")));
    }

    #[test]
    fn untrack_removes_all_memberships() {
        let mut registry = RoomRegistry::new();
        let room1 = RoomId::new("r1");
        let room2 = RoomId::new("r2");

        registry.track(conn(1));
        registry.track(conn(2));
        registry.join(conn(1), &room1);
        registry.join(conn(1), &room2);
        registry.join(conn(2), &room1);

        let rooms = registry.untrack(conn(1)).unwrap();
        assert_eq!(rooms.len(), 2);

        let members: Vec<_> = registry.members(&room1).collect();
        assert_eq!(members, vec![conn(2)]);
        assert!(!registry.has_room(&room2));

        assert!(registry.untrack(conn(1)).is_none());
    }

    #[test]
    fn sequence_numbers_restart_with_room() {
        let mut registry = RoomRegistry::new();
        let room = RoomId::new("r1");

        assert_eq!(registry.next_seq(&room), None);

        registry.track(conn(1));
        registry.join(conn(1), &room);
        assert_eq!(registry.next_seq(&room), Some(1));
        assert_eq!(registry.next_seq(&room), Some(2));

        registry.leave(conn(1), &room);
        registry.join(conn(1), &room);
        assert_eq!(registry.next_seq(&room), Some(1));
    }
}
