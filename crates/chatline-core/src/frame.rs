//! Outbound frames.

use bytes::Bytes;

use crate::ids::RoomId;

/// Where a frame was published.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameScope {
    /// Fanned out to the members of one room
    Room(RoomId),
    /// Fanned out to every registered connection
    Global,
}

/// A frame queued for delivery to one connection.
///
/// The payload is produced by the publisher and is never inspected or
/// transformed here. `seq` increases by one per publish within a scope; the
/// receiving side uses it to notice gaps, never to request re-delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    scope: FrameScope,
    seq: u64,
    payload: Bytes,
}

impl OutboundFrame {
    /// Frame published to `room` with sequence number `seq`.
    pub fn room(room: RoomId, seq: u64, payload: Bytes) -> Self {
        Self { scope: FrameScope::Room(room), seq, payload }
    }

    /// Frame published to every connection with sequence number `seq`.
    pub fn global(seq: u64, payload: Bytes) -> Self {
        Self { scope: FrameScope::Global, seq, payload }
    }

    /// Scope the frame was published to.
    pub fn scope(&self) -> &FrameScope {
        &self.scope
    }

    /// Room the frame was published to. `None` for global broadcasts.
    pub fn room_id(&self) -> Option<&RoomId> {
        match &self.scope {
            FrameScope::Room(room) => Some(room),
            FrameScope::Global => None,
        }
    }

    /// Sequence number within the scope.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Opaque payload bytes.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the frame, returning its payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}
