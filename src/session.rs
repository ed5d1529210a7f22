//! Connection session
//!
//! Represents one live client connection: the identity established at
//! handshake time plus the server→client event channel. Identity is fixed
//! for the session's lifetime; events never override it, so a client cannot
//! spoof another user within its session.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::{ServerEvent, UserRef};
use crate::types::{SocketId, UserId};

/// Live connection state
///
/// Exactly one per connection; dropped on disconnect, never persisted.
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this connection
    pub socket_id: SocketId,
    /// User identity from the handshake query
    pub user_id: UserId,
    /// Display name from the handshake query
    pub username: String,
    /// Auth credential for the persistence backend, from the handshake
    /// query; absent if the client connected without one (send requires it)
    pub auth_token: Option<String>,
    /// Server → client event channel
    pub sender: mpsc::Sender<ServerEvent>,
}

impl Session {
    pub fn new(
        socket_id: SocketId,
        user_id: UserId,
        username: String,
        auth_token: Option<String>,
        sender: mpsc::Sender<ServerEvent>,
    ) -> Self {
        Self {
            socket_id,
            user_id,
            username,
            auth_token,
            sender,
        }
    }

    /// Send an event to this client
    ///
    /// Returns an error if the channel is closed (client disconnected).
    pub async fn send(&self, event: ServerEvent) -> Result<(), SendError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Identity as carried in join/leave notifications
    pub fn user_ref(&self) -> UserRef {
        UserRef {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
        }
    }
}
