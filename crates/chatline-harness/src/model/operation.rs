//! Operations for model-based testing.
//!
//! Operations represent every externally triggered hub action. They are
//! generated randomly by proptest (or libFuzzer via `Arbitrary`) and applied
//! to both the model and the real implementation.

use arbitrary::Arbitrary;

/// Connection identifier (small to force collisions and reuse).
pub type ModelConnId = u8;

/// Room identifier (mapped to `room-{n}` in the real hub).
pub type ModelRoomId = u8;

/// Identity identifier (mapped to `user-{n}` in the real hub).
pub type ModelIdentity = u8;

/// Operations that can be applied to the hub.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Transport accepted and authenticated a connection.
    Register {
        /// Connection to register.
        conn: ModelConnId,
        /// Identity it authenticated as.
        identity: ModelIdentity,
    },

    /// A pump exited and the connection is torn down.
    Unregister {
        /// Connection to unregister.
        conn: ModelConnId,
    },

    /// Inbound `join_chat`.
    Join {
        /// Connection joining.
        conn: ModelConnId,
        /// Room to join.
        room: ModelRoomId,
    },

    /// Inbound `leave_chat`.
    Leave {
        /// Connection leaving.
        conn: ModelConnId,
        /// Room to leave.
        room: ModelRoomId,
    },

    /// Application service publishes to a room.
    Publish {
        /// Target room.
        room: ModelRoomId,
        /// Payload.
        message: SmallMessage,
    },

    /// Application service broadcasts to everyone.
    Broadcast {
        /// Payload.
        message: SmallMessage,
    },

    /// A delivery pump writes everything queued for a connection.
    Drain {
        /// Connection whose queue is drained.
        conn: ModelConnId,
    },

    /// Forced logout of every connection of an identity.
    DisconnectIdentity {
        /// Identity to disconnect.
        identity: ModelIdentity,
    },

    /// Server shutdown.
    Shutdown,
}

/// Small payload for testing.
///
/// Compact representation keeps cases small; content is deterministic from
/// the seed.
#[derive(Debug, Clone, Arbitrary)]
pub struct SmallMessage {
    /// Content seed.
    pub seed: u8,
    /// Length hint (0-3 maps to empty/small/medium/large).
    pub size_class: u8,
}

impl SmallMessage {
    /// Expand to payload bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = match self.size_class % 4 {
            0 => 0,
            1 => 8,
            2 => 64,
            _ => 256,
        };

        (0..len).map(|i| self.seed.wrapping_add(i as u8)).collect()
    }
}
