//! Server configuration.

use std::time::Duration;

use chatline_core::HubConfig;

/// Default interval between WebSocket pings.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Default time without any inbound frame before a connection is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default upper bound on an inbound frame.
///
/// Control frames are a few dozen bytes; anything near this size is abuse.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Default time a new TCP connection gets to complete the WebSocket upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for the closing handshake.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time connections get to wind down after shutdown begins.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Default listen address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Per-connection timing and limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Interval between outbound pings
    pub heartbeat_interval: Duration,
    /// Maximum silence from the client before the connection is dropped
    pub idle_timeout: Duration,
    /// Inbound messages larger than this close the connection. Also bounds
    /// what the WebSocket layer buffers while reading
    pub max_frame_size: usize,
    /// Time allowed for the upgrade request after the TCP accept
    pub handshake_timeout: Duration,
    /// Time allowed for sending the close frame
    pub close_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080")
    pub bind_address: String,
    /// HS256 secret for verifying connection tokens. Required unless a
    /// custom verifier is supplied to `Server::bind_with_verifier`
    pub jwt_secret: Option<String>,
    /// Hub limits
    pub hub: HubConfig,
    /// Per-connection settings
    pub session: SessionConfig,
    /// Time connections get to close after shutdown before they are aborted
    pub shutdown_grace: Duration,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            jwt_secret: None,
            hub: HubConfig::default(),
            session: SessionConfig::default(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}
