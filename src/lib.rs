//! Real-time chat socket server library
//!
//! The room/presence/typing coordination layer of a chat application:
//! authenticated clients connect over WebSocket, join rooms, exchange
//! messages (stored durably by the HTTP backend), and see live member and
//! typing-indicator updates.
//!
//! # Features
//! - WebSocket connection handling with handshake identity
//! - Room join/leave with live member-list broadcasts
//! - Message fan-out backed by the persistence backend
//! - Per-room typing indicators
//! - Disconnection cleanup (typing and membership)
//! - Operational `/health` and `/stats` endpoints
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `SocketServer` is the central actor owning all coordination state
//! - Each connection has a `handler` task communicating with the server
//! - No locks needed - all state access goes through message passing
//! - The persistence HTTP call runs on its own task and reports back as a
//!   command, so the actor never suspends on the backend
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use chat_socket_server::{
//!     handle_connection, HttpMessageStore, RoomRegistry, SocketServer, TypingTracker,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:3002").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     let store = Arc::new(HttpMessageStore::new("http://localhost:3001"));
//!     let server = SocketServer::new(
//!         RoomRegistry::new(),
//!         TypingTracker::new(),
//!         store,
//!         cmd_tx.clone(),
//!         cmd_rx,
//!     );
//!     tokio::spawn(server.run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         tokio::spawn(handle_connection(stream, cmd_tx));
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod ops;
pub mod persist;
pub mod registry;
pub mod server;
pub mod session;
pub mod typing;
pub mod types;

// Re-export main types for convenience
pub use config::Config;
pub use error::{AppError, SendError};
pub use handler::{handle_connection, Identity};
pub use message::{ChatMessage, ClientEvent, ErrorCode, ServerEvent, UserRef};
pub use persist::{HttpMessageStore, MessageStore, PersistError, StoredMessage};
pub use registry::{RoomRegistry, RoomStats, RoomUser};
pub use server::{HealthSnapshot, ServerCommand, SocketServer, StatsSnapshot};
pub use session::Session;
pub use typing::TypingTracker;
pub use types::{RoomId, SocketId, UserId};
