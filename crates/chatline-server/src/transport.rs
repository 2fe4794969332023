//! WebSocket listener and authenticated upgrade.

use std::net::SocketAddr;

use chatline_core::Identity;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
};
use tokio_tungstenite::{
    WebSocketStream, accept_hdr_async_with_config,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
        protocol::WebSocketConfig,
    },
};

use crate::{
    auth::{AuthError, IdentityVerifier, token_from_query},
    config::SessionConfig,
    error::{ServerError, UpgradeError},
};

/// TCP listener accepting WebSocket clients.
#[derive(Debug)]
pub struct WebSocketListener {
    listener: TcpListener,
}

impl WebSocketListener {
    /// Bind to `address` (e.g., "0.0.0.0:8080").
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        Ok(Self { listener })
    }

    /// Accept the next TCP connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        let (stream, peer) = self.listener.accept().await?;
        // Small control frames and pings should not wait for Nagle
        let _ = stream.set_nodelay(true);
        Ok((stream, peer))
    }

    /// Local address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

/// Run the WebSocket handshake, verifying the `token` query parameter.
///
/// A missing or rejected token is answered with HTTP 401 and never reaches
/// the hub. The whole handshake must finish within
/// `config.handshake_timeout`, and the resulting stream never buffers a
/// message larger than `config.max_frame_size`.
pub async fn upgrade<S>(
    stream: S,
    verifier: &dyn IdentityVerifier,
    config: &SessionConfig,
) -> Result<(WebSocketStream<S>, Identity), UpgradeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut verified = None;
    let mut rejected = None;

    let callback = |request: &Request, response: Response| {
        let result = token_from_query(request.uri().query())
            .ok_or(AuthError::MissingToken)
            .and_then(|token| verifier.verify(&token));

        match result {
            Ok(identity) => {
                verified = Some(identity);
                Ok(response)
            },
            Err(err) => {
                let rejection = unauthorized(&err);
                rejected = Some(err);
                Err(rejection)
            },
        }
    };

    let handshake = tokio::time::timeout(
        config.handshake_timeout,
        accept_hdr_async_with_config(stream, callback, Some(websocket_config(config))),
    )
    .await
    .map_err(|_| UpgradeError::Timeout)?;

    match (handshake, verified, rejected) {
        (Ok(ws), Some(identity), _) => Ok((ws, identity)),
        (_, _, Some(err)) => Err(UpgradeError::Unauthorized(err)),
        (Err(err), _, None) => Err(UpgradeError::Handshake(err)),
        (Ok(_), None, None) => Err(UpgradeError::Unauthorized(AuthError::MissingToken)),
    }
}

/// Protocol limits derived from the session settings.
fn websocket_config(config: &SessionConfig) -> WebSocketConfig {
    WebSocketConfig::default()
        .max_message_size(Some(config.max_frame_size))
        .max_frame_size(Some(config.max_frame_size))
}

fn unauthorized(err: &AuthError) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(err.to_string()));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
}
