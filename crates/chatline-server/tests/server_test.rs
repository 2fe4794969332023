//! End-to-end tests over loopback TCP.

use std::{net::SocketAddr, time::Duration};

use chatline_core::{Identity, RoomId};
use chatline_server::{ChatEvent, Hub, Server, ServerError, ServerRuntimeConfig, SessionConfig};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{EncodingKey, Header, encode, get_current_timestamp};
use serde::Serialize;
use tokio::{
    io::AsyncReadExt,
    net::TcpStream,
    sync::oneshot,
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message, Utf8Bytes, http::StatusCode},
};

const SECRET: &str = "integration-secret";

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Serialize)]
struct Claims<'a> {
    user_id: &'a str,
    exp: u64,
}

fn token_for(user: &str) -> String {
    let claims = Claims { user_id: user, exp: get_current_timestamp() + 600 };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

struct Running {
    addr: SocketAddr,
    hub: Hub,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), ServerError>>,
}

impl Running {
    async fn start() -> Self {
        Self::start_with(SessionConfig::default()).await
    }

    async fn start_with(session: SessionConfig) -> Self {
        let config = ServerRuntimeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            jwt_secret: Some(SECRET.to_string()),
            session,
            shutdown_grace: Duration::from_secs(2),
            ..Default::default()
        };
        let server = Server::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let hub = server.hub();
        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(server.run_until(async move {
            let _ = stopped.await;
        }));

        Self { addr, hub, stop: Some(stop), task }
    }

    async fn connect(&self, user: &str) -> Client {
        let url = format!("ws://{}/ws?token={}", self.addr, token_for(user));
        let (client, _) = connect_async(url).await.unwrap();
        client
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        timeout(Duration::from_secs(5), self.task).await.unwrap().unwrap().unwrap();
    }
}

async fn next_data(client: &mut Client) -> Message {
    loop {
        let message = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read failed");
        if !matches!(message, Message::Ping(_) | Message::Pong(_)) {
            return message;
        }
    }
}

async fn join(client: &mut Client, room: &str) {
    let frame = format!(r#"{{"type":"join_chat","chat_id":"{room}"}}"#);
    client.send(Message::Text(Utf8Bytes::from(frame))).await.unwrap();
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn authenticated_client_receives_room_events() {
    let server = Running::start().await;
    let room = RoomId::new("chat-1");
    let mut alice = server.connect("alice").await;
    let mut bob = server.connect("bob").await;

    join(&mut alice, "chat-1").await;
    join(&mut bob, "chat-1").await;
    eventually(|| server.hub.room_size(&room) == 2).await;
    assert!(server.hub.is_online(&Identity::new("alice")));

    let event = ChatEvent::NewMessage {
        chat_id: room.clone(),
        message: serde_json::json!({"id": "m1", "content": "hello"}),
    };
    assert_eq!(server.hub.publish_event(&room, &event).unwrap(), 2);

    for client in [&mut alice, &mut bob] {
        let message = next_data(client).await;
        let received = ChatEvent::decode(message.to_text().unwrap().as_bytes()).unwrap();
        assert_eq!(received, event);
    }

    server.stop().await;
}

#[tokio::test]
async fn missing_token_is_rejected_with_401() {
    let server = Running::start().await;

    let url = format!("ws://{}/ws", server.addr);
    let err = connect_async(url).await.unwrap_err();

    assert!(
        matches!(err, tungstenite::Error::Http(ref response) if response.status() == StatusCode::UNAUTHORIZED),
        "unexpected error: {err:?}"
    );
    assert_eq!(server.hub.connection_count(), 0);

    server.stop().await;
}

#[tokio::test]
async fn forged_token_is_rejected_with_401() {
    let server = Running::start().await;

    let claims = Claims { user_id: "mallory", exp: get_current_timestamp() + 600 };
    let forged = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"wrong")).unwrap();
    let url = format!("ws://{}/ws?token={forged}", server.addr);
    let err = connect_async(url).await.unwrap_err();

    assert!(matches!(err, tungstenite::Error::Http(ref response) if response.status() == StatusCode::UNAUTHORIZED));
    assert!(!server.hub.is_online(&Identity::new("mallory")));

    server.stop().await;
}

#[tokio::test]
async fn shutdown_closes_every_client() {
    let server = Running::start().await;
    let mut alice = server.connect("alice").await;
    let mut bob = server.connect("bob").await;
    eventually(|| server.hub.connection_count() == 2).await;

    let hub = server.hub.clone();
    server.stop().await;

    for client in [&mut alice, &mut bob] {
        assert!(matches!(next_data(client).await, Message::Close(_)));
    }
    assert_eq!(hub.connection_count(), 0);
    assert_eq!(hub.room_count(), 0);
}

#[tokio::test]
async fn bind_requires_jwt_secret() {
    let config = ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        jwt_secret: None,
        ..Default::default()
    };

    assert!(matches!(Server::bind(config).await, Err(ServerError::Config(_))));
}

#[tokio::test]
async fn custom_verifier_maps_tokens() {
    let config = ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        ..Default::default()
    };
    let verifier = |token: &str| token.strip_prefix("dev-").map(Identity::new);
    let server = Server::bind_with_verifier(config, verifier).await.unwrap();
    let addr = server.local_addr().unwrap();
    let hub = server.hub();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.run_until(async move {
        let _ = stopped.await;
    }));

    let (_client, _) = connect_async(format!("ws://{addr}/?token=dev-carol")).await.unwrap();
    eventually(|| hub.is_online(&Identity::new("carol"))).await;

    let _ = stop.send(());
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn silent_tcp_client_is_dropped_before_upgrade() {
    let server = Running::start_with(SessionConfig {
        handshake_timeout: Duration::from_millis(100),
        ..SessionConfig::default()
    })
    .await;

    let mut raw = TcpStream::connect(server.addr).await.unwrap();
    let mut buf = [0u8; 16];
    let read = timeout(Duration::from_secs(2), raw.read(&mut buf))
        .await
        .expect("server kept a silent socket open");

    assert!(matches!(read, Ok(0) | Err(_)), "unexpected read: {read:?}");
    assert_eq!(server.hub.connection_count(), 0);

    server.stop().await;
}

#[tokio::test]
async fn oversized_message_is_refused_by_protocol_limit() {
    let server = Running::start_with(SessionConfig {
        max_frame_size: 256,
        ..SessionConfig::default()
    })
    .await;
    let mut alice = server.connect("alice").await;
    eventually(|| server.hub.connection_count() == 1).await;

    let huge = format!(r#"{{"type":"join_chat","chat_id":"{}"}}"#, "x".repeat(64 * 1024));
    // The server may reset the socket before the write completes
    let _ = alice.send(Message::Text(Utf8Bytes::from(huge))).await;

    eventually(|| server.hub.connection_count() == 0).await;
    assert_eq!(server.hub.room_count(), 0);

    server.stop().await;
}
