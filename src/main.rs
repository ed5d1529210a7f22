//! Chat socket server - Entry Point
//!
//! Starts the SocketServer actor, the operational HTTP listener, and the
//! WebSocket accept loop.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_socket_server::{
    handle_connection, ops, Config, HttpMessageStore, RoomRegistry, SocketServer, TypingTracker,
};

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_socket_server=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_socket_server=info")),
        )
        .init();

    let config = Config::from_env();

    // Create SocketServer actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let store = Arc::new(HttpMessageStore::new(config.backend_url.clone()));
    let server = SocketServer::new(
        RoomRegistry::new(),
        TypingTracker::new(),
        store,
        cmd_tx.clone(),
        cmd_rx,
    );
    tokio::spawn(server.run());

    info!("SocketServer actor started (backend: {})", config.backend_url);

    // Operational endpoints (/health, /stats)
    let ops_listener = TcpListener::bind(&config.ops_addr).await?;
    info!("Operational endpoints listening on {}", config.ops_addr);
    let ops_router = ops::router(cmd_tx.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(ops_listener, ops_router).await {
            error!("Operational server error: {}", e);
        }
    });

    // WebSocket listener
    let listener = TcpListener::bind(&config.socket_addr).await?;
    info!("WebSocket chat server listening on {}", config.socket_addr);

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, cmd_tx).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
