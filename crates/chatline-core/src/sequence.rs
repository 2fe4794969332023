//! Receiver-side gap detection.
//!
//! Delivery is at-most-once: a frame refused by a full queue is gone, and the
//! connection along with it. Sequence numbers let a reader notice when it saw
//! frame 3 and then frame 5 of a room, which should only happen if frames were
//! abandoned when a connection closed. There is no replay; the observation is
//! for logging and tests.

use std::collections::HashMap;

use crate::frame::{FrameScope, OutboundFrame};

/// How a frame relates to the previous one seen in its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First frame seen for this scope
    First,
    /// Exactly one past the previous frame
    InOrder,
    /// Frames were skipped
    Gap {
        /// How many sequence numbers were skipped
        missed: u64,
    },
    /// Sequence went backwards or repeated: the room was deleted and
    /// recreated since the previous frame
    Restarted,
}

/// Tracks the last sequence number seen per scope.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last: HashMap<FrameScope, u64>,
    gaps: u64,
}

impl SequenceTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame and classify it.
    pub fn observe(&mut self, frame: &OutboundFrame) -> Observation {
        let seq = frame.seq();
        let Some(prev) = self.last.insert(frame.scope().clone(), seq) else {
            return Observation::First;
        };

        if seq == prev + 1 {
            Observation::InOrder
        } else if seq > prev {
            self.gaps += 1;
            Observation::Gap { missed: seq - prev - 1 }
        } else {
            Observation::Restarted
        }
    }

    /// Number of gaps observed so far.
    pub fn gaps(&self) -> u64 {
        self.gaps
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::ids::RoomId;

    fn frame(room: &str, seq: u64) -> OutboundFrame {
        OutboundFrame::room(RoomId::new(room), seq, Bytes::new())
    }

    #[test]
    fn in_order_stream() {
        let mut tracker = SequenceTracker::new();

        assert_eq!(tracker.observe(&frame("r1", 1)), Observation::First);
        assert_eq!(tracker.observe(&frame("r1", 2)), Observation::InOrder);
        assert_eq!(tracker.observe(&frame("r1", 3)), Observation::InOrder);
        assert_eq!(tracker.gaps(), 0);
    }

    #[test]
    fn gap_is_counted() {
        let mut tracker = SequenceTracker::new();

        tracker.observe(&frame("r1", 3));
        assert_eq!(tracker.observe(&frame("r1", 5)), Observation::Gap { missed: 1 });
        assert_eq!(tracker.gaps(), 1);
    }

    #[test]
    fn scopes_are_independent() {
        let mut tracker = SequenceTracker::new();

        tracker.observe(&frame("r1", 1));
        assert_eq!(tracker.observe(&frame("r2", 7)), Observation::First);
        assert_eq!(tracker.observe(&OutboundFrame::global(1, Bytes::new())), Observation::First);
        assert_eq!(tracker.observe(&frame("r1", 2)), Observation::InOrder);
    }

    #[test]
    fn recreated_room_restarts() {
        let mut tracker = SequenceTracker::new();

        tracker.observe(&frame("r1", 4));
        assert_eq!(tracker.observe(&frame("r1", 1)), Observation::Restarted);
        assert_eq!(tracker.observe(&frame("r1", 2)), Observation::InOrder);
        assert_eq!(tracker.gaps(), 0);
    }
}
