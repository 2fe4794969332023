//! Server error types.

use std::fmt;

use chatline_core::HubError;
use tokio_tungstenite::tungstenite;

use crate::auth::AuthError;

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, missing JWT secret, etc.).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    Config(String),

    /// Transport/network error (bind failure, accept failure, etc.).
    ///
    /// May be transient (file descriptor exhaustion) or fatal (bind address
    /// in use).
    Transport(String),

    /// Hub refused an operation.
    Hub(HubError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Hub(err) => write!(f, "hub error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Hub(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HubError> for ServerError {
    fn from(err: HubError) -> Self {
        Self::Hub(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Why a WebSocket upgrade did not produce a session.
#[derive(thiserror::Error, Debug)]
pub enum UpgradeError {
    /// The upgrade request carried no acceptable token (answered with 401)
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    /// The HTTP upgrade or WebSocket handshake failed
    #[error("handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),

    /// The client did not complete the upgrade in time
    #[error("handshake timed out")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = ServerError::Config("missing JWT secret".into());
        assert_eq!(err.to_string(), "configuration error: missing JWT secret");

        let err = ServerError::from(HubError::CapacityExceeded { limit: 3 });
        assert_eq!(err.to_string(), "hub error: connection limit reached (3 active connections)");
    }

    #[test]
    fn hub_error_is_source() {
        use std::error::Error;

        let err = ServerError::from(HubError::CapacityExceeded { limit: 3 });
        assert!(err.source().is_some());
        assert!(ServerError::Transport("x".into()).source().is_none());
    }
}
