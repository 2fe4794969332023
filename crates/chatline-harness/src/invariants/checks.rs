//! Standard hub invariants.

use super::{HubSnapshot, Invariant, InvariantResult, Violation};

/// Room membership is recorded identically in both directions.
///
/// A connection is listed in a room's member set if and only if the room is
/// listed in the connection's joined set. A one-sided entry means fan-out and
/// disconnect cleanup disagree about who is in the room.
pub struct MembershipLockstep;

impl Invariant for MembershipLockstep {
    fn name(&self) -> &'static str {
        "membership_lockstep"
    }

    fn check(&self, state: &HubSnapshot) -> InvariantResult {
        for (room_id, members) in &state.rooms {
            for conn in members {
                let listed = state.memberships.get(conn).is_some_and(|rooms| rooms.contains(room_id));
                if !listed {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("room {room_id} lists connection {conn}, which does not list the room"),
                    });
                }
            }
        }

        for (conn, rooms) in &state.memberships {
            for room_id in rooms {
                let listed = state.rooms.get(room_id).is_some_and(|members| members.contains(conn));
                if !listed {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("connection {conn} lists room {room_id}, which does not list it"),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Rooms exist only while they have members.
pub struct NoEmptyRooms;

impl Invariant for NoEmptyRooms {
    fn name(&self) -> &'static str {
        "no_empty_rooms"
    }

    fn check(&self, state: &HubSnapshot) -> InvariantResult {
        match state.rooms.iter().find(|(_, members)| members.is_empty()) {
            Some((room_id, _)) => Err(Violation {
                invariant: self.name(),
                message: format!("room {room_id} exists with no members"),
            }),
            None => Ok(()),
        }
    }
}

/// Only registered connections are tracked or appear in rooms.
///
/// An unregistered connection left in a member set would keep receiving
/// fan-out attempts after it closed.
pub struct MembersAreRegistered;

impl Invariant for MembersAreRegistered {
    fn name(&self) -> &'static str {
        "members_are_registered"
    }

    fn check(&self, state: &HubSnapshot) -> InvariantResult {
        for conn in state.memberships.keys() {
            if !state.connections.contains_key(conn) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("connection {conn} is tracked for rooms but not registered"),
                });
            }
        }

        for conn in state.connections.keys() {
            if !state.memberships.contains_key(conn) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("registered connection {conn} is not tracked for rooms"),
                });
            }
        }

        for (room_id, members) in &state.rooms {
            if let Some(conn) = members.iter().find(|conn| !state.connections.contains_key(*conn)) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("room {room_id} contains unregistered connection {conn}"),
                });
            }
        }

        Ok(())
    }
}

/// The identity lookup returns exactly the connections bound to the identity.
pub struct IdentityIndexConsistent;

impl Invariant for IdentityIndexConsistent {
    fn name(&self) -> &'static str {
        "identity_index_consistent"
    }

    fn check(&self, state: &HubSnapshot) -> InvariantResult {
        for (identity, conns) in &state.identity_index {
            for conn in conns {
                if state.connections.get(conn) != Some(identity) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "identity {identity} lists connection {conn}, bound to {:?}",
                            state.connections.get(conn)
                        ),
                    });
                }
            }
        }

        for (conn, identity) in &state.connections {
            let indexed = state.identity_index.get(identity).is_some_and(|conns| conns.contains(conn));
            if !indexed {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("connection {conn} missing from index of identity {identity}"),
                });
            }
        }

        Ok(())
    }
}
