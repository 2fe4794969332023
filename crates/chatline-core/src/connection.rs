//! Connection lifecycle.
//!
//! # State Machine
//!
//! ```text
//! ┌────────────┐ register ┌────────────┐ pump failure / ┌─────────┐
//! │ Connecting │─────────>│ Registered │──force close──>│ Closing │
//! └────────────┘          └────────────┘                └─────────┘
//!       │                        │ unregister                │ unregister
//!       │ rejected               ↓                           ↓
//!       └───────────────────>┌────────┐<─────────────────────┘
//!                            │ Closed │
//!                            └────────┘
//! ```
//!
//! Room joins do not change the state; a registered connection may be in any
//! number of rooms. `Closed` is terminal: later transitions are ignored, so
//! racing closers (both pumps, a backpressure drop, a forced logout) all
//! converge without error.

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Transport accepted, not yet known to the hub
    Connecting,
    /// Registered with the hub; may join rooms and receive frames
    Registered,
    /// A pump failed or the server asked for a disconnect; unregistration
    /// is in progress
    Closing,
    /// Unregistered; every room membership is gone and the queue is closed
    Closed,
}

impl ConnectionState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Registered | Self::Closed)
                | (Self::Registered, Self::Closing | Self::Closed)
                | (Self::Closing, Self::Closed)
        )
    }

    /// Move to `next` if the transition is legal.
    ///
    /// Returns `true` if the state changed.
    pub fn advance(&mut self, next: Self) -> bool {
        if self.can_transition_to(next) {
            *self = next;
            true
        } else {
            false
        }
    }

    /// Registered and not shutting down.
    pub fn is_open(self) -> bool {
        self == Self::Registered
    }

    /// Closing or closed.
    pub fn is_closing(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }

    /// Terminal state reached.
    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}
