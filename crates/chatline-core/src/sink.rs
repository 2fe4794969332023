//! Outbound queue abstraction.
//!
//! The hub owns one sink per registered connection and is the only writer.
//! The connection's delivery pump is the only reader. Implementations must
//! never block in `try_enqueue`: a full queue is reported, not waited on.

use crate::{error::EnqueueError, frame::OutboundFrame};

/// Bounded, non-blocking outbound queue for one connection.
pub trait FrameSink: Sized {
    /// Offer a frame without waiting.
    ///
    /// # Errors
    ///
    /// - `EnqueueError::Full` if the queue is at capacity
    /// - `EnqueueError::Closed` if the reader has gone away
    fn try_enqueue(&self, frame: OutboundFrame) -> Result<(), EnqueueError>;

    /// Announce a server-initiated disconnect.
    ///
    /// Called before `close` when the hub tears a connection down on its own
    /// (forced logout, shutdown), so observers see `Closing` first.
    fn closing(&self) {}

    /// Close the queue and signal the connection as closed.
    ///
    /// Called exactly once, when the hub unregisters the connection. Frames
    /// already queued may still be drained by the reader.
    fn close(self);
}
