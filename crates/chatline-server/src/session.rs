//! One WebSocket session from registration to teardown.

use chatline_core::{HubError, Identity};
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{
    WebSocketStream,
    tungstenite::{
        Utf8Bytes,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};

use crate::{
    config::SessionConfig,
    hub::{ConnectionHandle, Hub, Registration},
    pump::{run_delivery, run_ingest},
};

/// Unregisters the connection when dropped, so a cancelled session never
/// leaves it in the hub.
struct Registered<'a> {
    hub: &'a Hub,
    handle: &'a ConnectionHandle,
}

impl Drop for Registered<'_> {
    fn drop(&mut self) {
        if self.hub.unregister(self.handle).is_some() {
            tracing::debug!(connection_id = %self.handle.id(), "session cancelled");
        }
    }
}

/// Serve an authenticated WebSocket until it closes.
///
/// Registers the connection, then drives the ingest and delivery pumps
/// together on the current task. Returns once both have stopped and the
/// connection is unregistered. Dropping the returned future at any point
/// also unregisters the connection and releases the socket.
///
/// # Errors
///
/// Returns the hub's error if registration was refused. The client gets a
/// "try again later" close frame at capacity and a "going away" close frame
/// during shutdown.
pub async fn serve<S>(
    hub: Hub,
    mut ws: WebSocketStream<S>,
    identity: Identity,
    config: SessionConfig,
) -> Result<(), HubError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let Registration { handle, outbound } = match hub.register(identity.clone()) {
        Ok(registration) => registration,
        Err(err) => {
            tracing::warn!(%identity, error = %err, "connection refused");
            let frame = match err {
                HubError::ShuttingDown => CloseFrame {
                    code: CloseCode::Away,
                    reason: Utf8Bytes::from_static("server shutting down"),
                },
                _ => CloseFrame { code: CloseCode::Again, reason: Utf8Bytes::from_static("server busy") },
            };
            let _ = ws.close(Some(frame)).await;
            return Err(err);
        },
    };

    tracing::info!(connection_id = %handle.id(), %identity, "connection opened");

    let _registered = Registered { hub: &hub, handle: &handle };
    let (mut sink, mut stream) = ws.split();

    let (ingest_exit, delivery_exit) = tokio::join!(
        run_ingest(&hub, &handle, &mut stream, &config),
        run_delivery(&hub, &handle, &mut sink, outbound, &config),
    );

    tracing::info!(
        connection_id = %handle.id(),
        %identity,
        ?ingest_exit,
        ?delivery_exit,
        "connection closed"
    );

    Ok(())
}
