//! Chatline server binary.
//!
//! # Usage
//!
//! ```bash
//! # Secret from the environment (container deployments)
//! JWT_SECRET=change-me chatline-server
//!
//! # Explicit flags
//! chatline-server --bind 127.0.0.1:9000 --jwt-secret change-me --queue-capacity 512
//! ```

use std::time::Duration;

use chatline_core::HubConfig;
use chatline_server::{Server, ServerRuntimeConfig, SessionConfig, config};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Chatline real-time delivery server
#[derive(Parser, Debug)]
#[command(name = "chatline-server")]
#[command(about = "Chatline WebSocket fan-out server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, env = "CHATLINE_BIND", default_value = config::DEFAULT_BIND_ADDRESS)]
    bind: String,

    /// Secret used to verify HS256 connection tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// Maximum concurrent connections
    #[arg(long, env = "CHATLINE_MAX_CONNECTIONS", default_value = "10000")]
    max_connections: usize,

    /// Frames a connection may have queued before it is dropped
    #[arg(long, env = "CHATLINE_QUEUE_CAPACITY", default_value = "256")]
    queue_capacity: usize,

    /// Seconds between heartbeat pings
    #[arg(long, env = "CHATLINE_HEARTBEAT_SECS", default_value = "20")]
    heartbeat_secs: u64,

    /// Seconds of client silence before disconnecting
    #[arg(long, env = "CHATLINE_IDLE_TIMEOUT_SECS", default_value = "60")]
    idle_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CHATLINE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Chatline server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        jwt_secret: Some(args.jwt_secret),
        hub: HubConfig { max_connections: args.max_connections, queue_capacity: args.queue_capacity },
        session: SessionConfig {
            heartbeat_interval: Duration::from_secs(args.heartbeat_secs),
            idle_timeout: Duration::from_secs(args.idle_timeout_secs),
            ..Default::default()
        },
        ..Default::default()
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {err}");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
