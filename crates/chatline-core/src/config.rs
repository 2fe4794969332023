//! Hub configuration.

/// Default maximum number of concurrently registered connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10_000;

/// Default number of frames a connection may have queued before it is
/// considered too slow and dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Hub limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Maximum concurrently registered connections
    pub max_connections: usize,
    /// Capacity of each connection's outbound queue (at least 1)
    pub queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { max_connections: DEFAULT_MAX_CONNECTIONS, queue_capacity: DEFAULT_QUEUE_CAPACITY }
    }
}

impl HubConfig {
    /// Queue capacity clamped to a usable value.
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }
}
