//! Reference hub.

use std::collections::{BTreeMap, BTreeSet};

use chatline_core::{HubConfig, JoinOutcome, LeaveOutcome};

use super::operation::{ModelConnId, ModelIdentity, ModelRoomId, Operation};

/// A frame as observed by a model connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFrame {
    /// Room it was published to. `None` for global broadcasts.
    pub room: Option<ModelRoomId>,
    /// Sequence number within its scope.
    pub seq: u64,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

/// Result of applying one operation, comparable across implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Registration accepted.
    Registered,
    /// Connection id already registered.
    Duplicate,
    /// Connection limit reached.
    AtCapacity,
    /// Hub already shut down.
    ShuttingDown,
    /// Unregister result: the rooms left (sorted), or `None` if the
    /// connection was not registered.
    Unregistered(Option<Vec<ModelRoomId>>),
    /// Join result.
    Join(JoinOutcome),
    /// Leave result.
    Leave(LeaveOutcome),
    /// Publish or broadcast: connections the frame was enqueued for.
    Delivered(usize),
    /// Frames moved from a queue to the delivered log.
    Drained(usize),
    /// Connections closed by a bulk disconnect.
    Closed(usize),
}

/// One registered connection as seen from outside the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionView {
    /// Connection id.
    pub conn: ModelConnId,
    /// Bound identity.
    pub identity: ModelIdentity,
    /// Joined rooms (sorted).
    pub rooms: Vec<ModelRoomId>,
    /// Frames waiting in the outbound queue.
    pub queued: usize,
    /// Frames drained since registration, in order.
    pub delivered: Vec<ModelFrame>,
}

/// Observable state compared between model and real implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Registered connections, sorted by id.
    pub connections: Vec<ConnectionView>,
    /// Live rooms with member counts, sorted by id.
    pub rooms: Vec<(ModelRoomId, usize)>,
}

#[derive(Debug, Clone)]
struct ModelConnection {
    identity: ModelIdentity,
    rooms: BTreeSet<ModelRoomId>,
    queued: Vec<ModelFrame>,
    delivered: Vec<ModelFrame>,
}

/// Reference implementation of the hub.
#[derive(Debug, Clone)]
pub struct ModelHub {
    max_connections: usize,
    queue_capacity: usize,
    connections: BTreeMap<ModelConnId, ModelConnection>,
    /// Last sequence per live room. Presence means the room exists.
    room_seq: BTreeMap<ModelRoomId, u64>,
    global_seq: u64,
    shut_down: bool,
}

impl ModelHub {
    /// Create a model with the same limits as `config`.
    pub fn new(config: &HubConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            queue_capacity: config.queue_capacity,
            connections: BTreeMap::new(),
            room_seq: BTreeMap::new(),
            global_seq: 0,
            shut_down: false,
        }
    }

    /// Apply an operation.
    pub fn apply(&mut self, op: &Operation) -> OperationOutcome {
        match op {
            Operation::Register { conn, identity } => self.register(*conn, *identity),
            Operation::Unregister { conn } => {
                OperationOutcome::Unregistered(self.unregister(*conn))
            },
            Operation::Join { conn, room } => OperationOutcome::Join(self.join(*conn, *room)),
            Operation::Leave { conn, room } => OperationOutcome::Leave(self.leave(*conn, *room)),
            Operation::Publish { room, message } => {
                OperationOutcome::Delivered(self.publish(*room, message.to_bytes()))
            },
            Operation::Broadcast { message } => {
                OperationOutcome::Delivered(self.broadcast(message.to_bytes()))
            },
            Operation::Drain { conn } => OperationOutcome::Drained(self.drain(*conn)),
            Operation::DisconnectIdentity { identity } => {
                let conns: Vec<_> = self
                    .connections
                    .iter()
                    .filter(|(_, c)| c.identity == *identity)
                    .map(|(id, _)| *id)
                    .collect();
                OperationOutcome::Closed(self.unregister_all(conns))
            },
            Operation::Shutdown => {
                self.shut_down = true;
                let conns: Vec<_> = self.connections.keys().copied().collect();
                OperationOutcome::Closed(self.unregister_all(conns))
            },
        }
    }

    fn register(&mut self, conn: ModelConnId, identity: ModelIdentity) -> OperationOutcome {
        if self.shut_down {
            return OperationOutcome::ShuttingDown;
        }
        if self.connections.contains_key(&conn) {
            return OperationOutcome::Duplicate;
        }
        if self.connections.len() >= self.max_connections {
            return OperationOutcome::AtCapacity;
        }

        self.connections.insert(conn, ModelConnection {
            identity,
            rooms: BTreeSet::new(),
            queued: Vec::new(),
            delivered: Vec::new(),
        });
        OperationOutcome::Registered
    }

    fn unregister(&mut self, conn: ModelConnId) -> Option<Vec<ModelRoomId>> {
        let removed = self.connections.remove(&conn)?;
        for room in &removed.rooms {
            self.reap_if_empty(*room);
        }
        Some(removed.rooms.into_iter().collect())
    }

    fn unregister_all(&mut self, conns: Vec<ModelConnId>) -> usize {
        conns.into_iter().filter(|conn| self.unregister(*conn).is_some()).count()
    }

    fn join(&mut self, conn: ModelConnId, room: ModelRoomId) -> JoinOutcome {
        let Some(connection) = self.connections.get_mut(&conn) else {
            return JoinOutcome::NotRegistered;
        };
        if !connection.rooms.insert(room) {
            return JoinOutcome::AlreadyMember;
        }
        self.room_seq.entry(room).or_insert(0);
        JoinOutcome::Joined
    }

    fn leave(&mut self, conn: ModelConnId, room: ModelRoomId) -> LeaveOutcome {
        let Some(connection) = self.connections.get_mut(&conn) else {
            return LeaveOutcome::NotRegistered;
        };
        if !connection.rooms.remove(&room) {
            return LeaveOutcome::UnknownRoom;
        }
        let room_deleted = self.reap_if_empty(room);
        LeaveOutcome::Left { room_deleted }
    }

    fn reap_if_empty(&mut self, room: ModelRoomId) -> bool {
        let occupied = self.connections.values().any(|c| c.rooms.contains(&room));
        if !occupied {
            self.room_seq.remove(&room);
        }
        !occupied
    }

    fn publish(&mut self, room: ModelRoomId, payload: Vec<u8>) -> usize {
        let Some(seq) = self.room_seq.get_mut(&room) else {
            return 0;
        };
        *seq += 1;
        let frame = ModelFrame { room: Some(room), seq: *seq, payload };

        let members: Vec<_> = self
            .connections
            .iter()
            .filter(|(_, c)| c.rooms.contains(&room))
            .map(|(id, _)| *id)
            .collect();
        self.fan_out(members, &frame)
    }

    fn broadcast(&mut self, payload: Vec<u8>) -> usize {
        self.global_seq += 1;
        let frame = ModelFrame { room: None, seq: self.global_seq, payload };

        let everyone: Vec<_> = self.connections.keys().copied().collect();
        self.fan_out(everyone, &frame)
    }

    fn fan_out(&mut self, targets: Vec<ModelConnId>, frame: &ModelFrame) -> usize {
        let mut delivered = 0;
        let mut refused = Vec::new();

        for conn in targets {
            let Some(connection) = self.connections.get_mut(&conn) else {
                continue;
            };
            if connection.queued.len() >= self.queue_capacity {
                refused.push(conn);
            } else {
                connection.queued.push(frame.clone());
                delivered += 1;
            }
        }

        for conn in refused {
            self.unregister(conn);
        }
        delivered
    }

    fn drain(&mut self, conn: ModelConnId) -> usize {
        let Some(connection) = self.connections.get_mut(&conn) else {
            return 0;
        };
        let drained = connection.queued.len();
        connection.delivered.append(&mut connection.queued);
        drained
    }

    /// Extract observable state.
    pub fn observable_state(&self) -> ObservableState {
        let connections = self
            .connections
            .iter()
            .map(|(conn, c)| ConnectionView {
                conn: *conn,
                identity: c.identity,
                rooms: c.rooms.iter().copied().collect(),
                queued: c.queued.len(),
                delivered: c.delivered.clone(),
            })
            .collect();

        let rooms = self
            .room_seq
            .keys()
            .map(|room| {
                let size = self.connections.values().filter(|c| c.rooms.contains(room)).count();
                (*room, size)
            })
            .collect();

        ObservableState { connections, rooms }
    }
}
