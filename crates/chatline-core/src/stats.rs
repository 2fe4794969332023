//! Hub statistics.

/// Counters maintained by the hub.
///
/// Totals only ever grow; `active_*` fields are filled in when a snapshot is
/// taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Connections ever registered
    pub registered_total: u64,
    /// Connections ever unregistered (for any reason)
    pub unregistered_total: u64,
    /// Publish calls that found a live room
    pub published_frames: u64,
    /// Frames successfully enqueued across all connections
    pub delivered_frames: u64,
    /// Connections dropped because their queue was full
    pub backpressure_drops: u64,
    /// Connections dropped because their queue reader had already gone away
    pub closed_queue_drops: u64,
    /// Global broadcasts issued
    pub global_broadcasts: u64,
    /// Currently registered connections
    pub active_connections: usize,
    /// Currently live rooms
    pub active_rooms: usize,
}
