//! Identifier newtypes.
//!
//! Room ids and identities are opaque strings chosen by the storage layer
//! (conversation ids, user ids). They are reference counted so that cloning
//! one into every fanned-out frame costs a pointer bump.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// Process-unique identifier of one live connection.
///
/// Assigned by the runtime when a session is registered. Never reused while
/// the process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw connection number.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw connection number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation (chat, group or channel) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RoomId(Arc<str>);

impl RoomId {
    /// Create a room id from any string-like value.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id.into())
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.into())
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0.as_ref().to_owned()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated user identity bound to a connection.
///
/// Produced by token verification outside the core. One identity may hold
/// several concurrent connections (one per device).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Identity(Arc<str>);

impl Identity {
    /// Create an identity from any string-like value.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Borrow the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id.into())
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self(id.into())
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.0.as_ref().to_owned()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_serializes_as_plain_string() {
        let room = RoomId::new("65f1c0ffee");
        let json = serde_json::to_string(&room).unwrap();
        assert_eq!(json, "\"65f1c0ffee\"");

        let back: RoomId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, room);
    }

    #[test]
    fn clones_share_storage() {
        let room = RoomId::new("chat");
        let copy = room.clone();
        assert!(std::ptr::eq(room.as_str(), copy.as_str()));
    }
}
