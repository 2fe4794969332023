//! In-memory outbound queue.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chatline_core::{EnqueueError, FrameSink, OutboundFrame};

#[derive(Debug, Default)]
struct Queue {
    frames: VecDeque<OutboundFrame>,
    closed: bool,
}

fn lock(queue: &Mutex<Queue>) -> MutexGuard<'_, Queue> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded in-memory [`FrameSink`].
///
/// Refuses frames with `Full` at capacity and with `Closed` once the hub has
/// closed it or the test has called [`SinkTap::disconnect`].
#[derive(Debug)]
pub struct MemorySink {
    capacity: usize,
    queue: Arc<Mutex<Queue>>,
}

/// Test-side handle onto a [`MemorySink`].
#[derive(Debug, Clone)]
pub struct SinkTap {
    queue: Arc<Mutex<Queue>>,
}

impl MemorySink {
    /// Create a sink holding at most `capacity` undrained frames.
    pub fn with_capacity(capacity: usize) -> (Self, SinkTap) {
        let queue = Arc::new(Mutex::new(Queue::default()));
        (Self { capacity, queue: Arc::clone(&queue) }, SinkTap { queue })
    }
}

impl FrameSink for MemorySink {
    fn try_enqueue(&self, frame: OutboundFrame) -> Result<(), EnqueueError> {
        let mut queue = lock(&self.queue);
        if queue.closed {
            return Err(EnqueueError::Closed);
        }
        if queue.frames.len() >= self.capacity {
            return Err(EnqueueError::Full);
        }
        queue.frames.push_back(frame);
        Ok(())
    }

    fn close(self) {
        lock(&self.queue).closed = true;
    }
}

impl SinkTap {
    /// Take every queued frame, oldest first.
    pub fn drain(&self) -> Vec<OutboundFrame> {
        lock(&self.queue).frames.drain(..).collect()
    }

    /// Payloads of every queued frame without removing them.
    pub fn payloads(&self) -> Vec<bytes::Bytes> {
        lock(&self.queue).frames.iter().map(|frame| frame.payload().clone()).collect()
    }

    /// Number of queued frames.
    pub fn len(&self) -> usize {
        lock(&self.queue).frames.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the sink has been closed.
    pub fn is_closed(&self) -> bool {
        lock(&self.queue).closed
    }

    /// Simulate the reader going away: later enqueues fail with `Closed`.
    pub fn disconnect(&self) {
        lock(&self.queue).closed = true;
    }
}
