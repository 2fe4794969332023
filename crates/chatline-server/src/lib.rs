//! Chatline real-time delivery server.
//!
//! Accepts WebSocket clients, authenticates them during the handshake, and
//! connects each one to the process-wide [`Hub`] through a pair of pumps.
//! Request handlers elsewhere in the backend hold a [`Hub`] clone and call
//! [`Hub::publish`] after persisting a message.
//!
//! # Architecture
//!
//! This crate is the runtime glue around [`chatline_core`]. The core decides
//! who receives what; this crate owns sockets, tasks, timers and tokens.
//!
//! ```text
//!   TcpListener ──> upgrade (token → Identity) ──> session::serve
//!                                                   │
//!                         ┌─────────────────────────┴───────────┐
//!                         ▼                                     ▼
//!                    ingest pump ── join/leave ──> Hub <── publish ── handlers
//!                                                   │
//!                    delivery pump <── OutboundQueue┘
//! ```
//!
//! # Components
//!
//! - [`Server`]: accept loop, per-connection tasks, graceful shutdown
//! - [`Hub`]: lock-guarded [`chatline_core::HubState`] with tokio queues
//! - [`run_ingest`] / [`run_delivery`]: the per-connection pumps
//! - [`IdentityVerifier`] / [`JwtVerifier`]: handshake authentication
//! - [`ChatEvent`]: JSON envelopes for published payloads

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod config;
mod error;
pub mod events;
pub mod hub;
pub mod pump;
pub mod session;
mod transport;

use std::{future::Future, net::SocketAddr, sync::Arc};

pub use auth::{AuthError, IdentityVerifier, JwtVerifier};
pub use config::{ServerRuntimeConfig, SessionConfig};
pub use error::{ServerError, UpgradeError};
pub use events::{ChatEvent, TypingKind};
pub use hub::{ConnectionHandle, Hub, OutboundQueue, Registration};
pub use pump::{DeliveryExit, IngestExit, run_delivery, run_ingest};
use tokio::{net::TcpStream, task::JoinSet};
pub use transport::{WebSocketListener, upgrade};

/// Production Chatline server.
pub struct Server {
    /// Shared hub, also handed to request handlers
    hub: Hub,
    /// WebSocket listener
    listener: WebSocketListener,
    /// Token verification
    verifier: Arc<dyn IdentityVerifier>,
    /// Runtime configuration
    config: ServerRuntimeConfig,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("hub", &self.hub)
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Bind a server that verifies HS256 tokens with `config.jwt_secret`.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if no JWT secret is configured or the bind
    ///   address is invalid
    /// - `ServerError::Transport` if the address cannot be bound
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let secret = config
            .jwt_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| ServerError::Config("a JWT secret is required".to_string()))?;

        let verifier = JwtVerifier::new(secret.as_bytes());
        Self::bind_with_verifier(config, verifier).await
    }

    /// Bind a server with a custom identity verifier.
    pub async fn bind_with_verifier(
        config: ServerRuntimeConfig,
        verifier: impl IdentityVerifier,
    ) -> Result<Self, ServerError> {
        let listener = WebSocketListener::bind(&config.bind_address).await?;
        let hub = Hub::new(config.hub.clone());

        tracing::info!(address = %listener.local_addr()?, "WebSocket listener bound");

        Ok(Self { hub, listener, verifier: Arc::new(verifier), config })
    }

    /// Handle to the hub, for request handlers.
    pub fn hub(&self) -> Hub {
        self.hub.clone()
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr()
    }

    /// Run until the process is killed.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Run until `shutdown` resolves, then close every connection.
    ///
    /// After shutdown begins no new connections are accepted or registered.
    /// Every connection is unregistered, which makes its delivery pump send a
    /// close frame. Sessions still running after `shutdown_grace` are aborted;
    /// an aborted session unregisters itself as it is dropped.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.listener.local_addr()?);

        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        sessions.spawn(handle_connection(
                            stream,
                            peer,
                            self.hub.clone(),
                            Arc::clone(&self.verifier),
                            self.config.session.clone(),
                        ));
                    },
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    },
                },
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {},
            }
        }

        let closed = self.hub.shutdown();
        tracing::info!(connections = closed, "shutting down");

        let drain = async { while sessions.join_next().await.is_some() {} };
        let drained = tokio::time::timeout(self.config.shutdown_grace, drain).await;
        if drained.is_err() {
            tracing::warn!(remaining = sessions.len(), "aborting sessions after grace period");
            sessions.abort_all();
        }

        Ok(())
    }
}

/// Upgrade, authenticate and serve one TCP connection.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    hub: Hub,
    verifier: Arc<dyn IdentityVerifier>,
    config: SessionConfig,
) {
    let (ws, identity) = match upgrade(stream, verifier.as_ref(), &config).await {
        Ok(upgraded) => upgraded,
        Err(UpgradeError::Unauthorized(err)) => {
            tracing::info!(%peer, error = %err, "upgrade rejected");
            return;
        },
        Err(UpgradeError::Timeout) => {
            tracing::debug!(%peer, "upgrade timed out");
            return;
        },
        Err(err) => {
            tracing::debug!(%peer, error = %err, "upgrade failed");
            return;
        },
    };

    if let Err(err) = session::serve(hub, ws, identity, config).await {
        tracing::debug!(%peer, error = %err, "session refused");
    }
}
