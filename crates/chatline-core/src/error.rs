//! Error types for the fan-out core.
//!
//! Only programmer errors and capacity limits surface as `HubError`. Slow or
//! broken consumers are handled inside fan-out (the connection is dropped) and
//! never reach the publisher; leaving a room one never joined is an ordinary
//! outcome, not an error.

use thiserror::Error;

use crate::ids::ConnectionId;

/// Errors returned by hub registration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// The connection id is already registered
    #[error("connection {0} is already registered")]
    DuplicateRegistration(ConnectionId),

    /// Registering would exceed the configured connection limit
    #[error("connection limit reached ({limit} active connections)")]
    CapacityExceeded {
        /// Configured maximum
        limit: usize,
    },

    /// The hub has been shut down and accepts no new connections
    #[error("hub is shutting down")]
    ShuttingDown,
}

/// Why a sink refused a frame.
///
/// Either variant makes the hub unregister the connection.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The bounded queue is at capacity (backpressure drop)
    #[error("outbound queue full")]
    Full,

    /// The consuming side has gone away
    #[error("outbound queue closed")]
    Closed,
}

/// Errors from decoding an inbound control frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlFrameError {
    /// Not valid JSON, missing `type`, or a known type with bad fields
    #[error("malformed control frame: {0}")]
    Malformed(String),

    /// `chat_id` present but empty
    #[error("control frame has an empty chat_id")]
    EmptyRoomId,
}

impl From<serde_json::Error> for ControlFrameError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
