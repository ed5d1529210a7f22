//! Error types for the socket server
//!
//! Defines application-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::persist::PersistError;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and business errors
/// (surfaced to the originating client only, never broadcast).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal for that connection)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal for that connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Handshake rejected: identity missing from the query string
    #[error("Handshake missing required parameter: {0}")]
    Handshake(&'static str),

    /// Message content empty after trimming
    #[error("Message cannot be empty")]
    Validation,

    /// Session carries no auth credential
    #[error("Authentication required")]
    Auth,

    /// Persistence backend call failed
    #[error(transparent)]
    Persistence(#[from] PersistError),
}

/// Message send errors
///
/// Occurs when attempting to send events through closed channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
