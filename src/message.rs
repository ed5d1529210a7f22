//! Wire protocol definitions
//!
//! JSON-based bidirectional event protocol using Serde's tagged enum
//! for type-safe serialization/deserialization. Inbound payloads are
//! schema-validated at the deserialization boundary; a frame that does not
//! parse into `ClientEvent` is rejected with a typed error rather than
//! propagated with missing fields.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::registry::RoomUser;
use crate::types::{RoomId, UserId};

/// Client → Server event
///
/// All events from client to server. Uses tagged enum with kebab-case naming.
/// Identity (userId/username/token) is never taken from these payloads; it is
/// fixed at handshake time for the session's lifetime.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Join a room
    Join { room_id: RoomId },
    /// Leave a room
    Leave { room_id: RoomId },
    /// Send a chat message to a room
    Send { room_id: RoomId, content: String },
    /// Started composing a message
    TypingStart { room_id: RoomId },
    /// Stopped composing a message
    TypingStop { room_id: RoomId },
}

/// Identity of a user as carried in join/leave notifications
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub user_id: UserId,
    pub username: String,
}

/// Canonical chat message as republished to room subscribers
///
/// Produced from the persistence backend's response; `created_at` is
/// republished verbatim rather than re-parsed so clients see exactly the
/// stored record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
    pub content: String,
    pub created_at: String,
}

/// Server → Client event
///
/// All events from server to client. Uses tagged enum with kebab-case naming.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Connection successful, socket ID issued
    ConnectionAck { socket_id: String, message: String },
    /// A user joined a room (sent to every member, including the joiner)
    RoomJoined {
        room_id: RoomId,
        user: UserRef,
        users: Vec<RoomUser>,
        total_users: usize,
    },
    /// A user left a room (sent to remaining members)
    RoomLeft {
        room_id: RoomId,
        user: UserRef,
        users: Vec<RoomUser>,
    },
    /// A message was stored and is being fanned out
    MessageNew(ChatMessage),
    /// The room's currently-typing set changed
    TypingUpdated {
        room_id: RoomId,
        typing_users: Vec<String>,
    },
    /// Error occurred (sent to the originating client only)
    Error { code: ErrorCode, message: String },
}

/// Error codes for ServerEvent::Error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// Message content empty after trimming
    Validation,
    /// Missing auth credential on send
    Auth,
    /// Persistence backend rejected or failed
    Persistence,
    /// Frame did not parse as a known event
    InvalidEvent,
}

/// Convert AppError to ServerEvent for client notification
impl From<AppError> for ServerEvent {
    fn from(err: AppError) -> Self {
        let (code, message) = match &err {
            AppError::Validation => (ErrorCode::Validation, "Message cannot be empty".to_string()),
            AppError::Auth => (ErrorCode::Auth, "Authentication required".to_string()),
            AppError::Persistence(e) => (ErrorCode::Persistence, format!("Failed to store message: {}", e)),
            AppError::Json(e) => (ErrorCode::InvalidEvent, format!("Invalid event format: {}", e)),
            // Fatal errors are not typically converted (connection closes)
            _ => (ErrorCode::InvalidEvent, "Internal error".to_string()),
        };
        ServerEvent::Error { code, message }
    }
}
