//! Message persistence backend client
//!
//! The chat backend owns durable message storage; this server only asks it
//! to store a message and republishes the canonical stored record. The
//! `MessageStore` trait is the seam: the event router holds a trait object,
//! so tests can substitute a stub without any HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{RoomId, UserId};

/// Persistence call failure
///
/// Any non-2xx status or transport error. Not retried; the client may
/// resend (at-most-once storage attempt per send event).
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("backend returned status {0}")]
    Status(u16),
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend response malformed: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Canonical stored record as returned by the backend
///
/// `username` is optional: older backend versions omit it, in which case
/// the router falls back to the session's username.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub room_id: RoomId,
    pub user_id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    pub content: String,
    pub created_at: String,
}

/// Durable message storage seam
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Store a message, returning the canonical record
    async fn store_message(
        &self,
        room_id: &RoomId,
        content: &str,
        token: &str,
    ) -> Result<StoredMessage, PersistError>;
}

#[derive(Serialize)]
struct StoreMessageBody<'a> {
    content: &'a str,
}

/// HTTP implementation against the chat backend
///
/// `POST {base_url}/rooms/{roomId}/messages` with a bearer token. No
/// explicit timeout: a hung call hangs only its own send, never the router.
#[derive(Debug, Clone)]
pub struct HttpMessageStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMessageStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MessageStore for HttpMessageStore {
    async fn store_message(
        &self,
        room_id: &RoomId,
        content: &str,
        token: &str,
    ) -> Result<StoredMessage, PersistError> {
        let url = format!("{}/rooms/{}/messages", self.base_url, room_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&StoreMessageBody { content })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PersistError::Status(status.as_u16()));
        }

        response
            .json::<StoredMessage>()
            .await
            .map_err(PersistError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use tokio::net::TcpListener;

    async fn store_ok(
        Path(room_id): Path<String>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        assert_eq!(
            headers.get("authorization").and_then(|v| v.to_str().ok()),
            Some("Bearer jwt-123")
        );
        (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": "m1",
                "roomId": room_id,
                "userId": "u1",
                "username": "alice",
                "content": body["content"],
                "createdAt": "2026-01-01T00:00:00.000Z",
            })),
        )
    }

    async fn store_rejected() -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    async fn spawn_backend(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_store_message_success() {
        let app = Router::new().route("/rooms/:room_id/messages", post(store_ok));
        let base_url = spawn_backend(app).await;

        let store = HttpMessageStore::new(base_url);
        let stored = store
            .store_message(&RoomId::new("general"), "hi", "jwt-123")
            .await
            .unwrap();

        assert_eq!(stored.id, "m1");
        assert_eq!(stored.room_id, RoomId::new("general"));
        assert_eq!(stored.user_id, UserId::new("u1"));
        assert_eq!(stored.username.as_deref(), Some("alice"));
        assert_eq!(stored.content, "hi");
        assert_eq!(stored.created_at, "2026-01-01T00:00:00.000Z");
    }

    #[tokio::test]
    async fn test_store_message_non_2xx_is_error() {
        let app = Router::new().route("/rooms/:room_id/messages", post(store_rejected));
        let base_url = spawn_backend(app).await;

        let store = HttpMessageStore::new(base_url);
        let result = store
            .store_message(&RoomId::new("general"), "hi", "jwt-123")
            .await;

        assert!(matches!(result, Err(PersistError::Status(500))));
    }

    #[tokio::test]
    async fn test_store_message_transport_failure() {
        // Nothing listening on this port
        let store = HttpMessageStore::new("http://127.0.0.1:1");
        let result = store
            .store_message(&RoomId::new("general"), "hi", "jwt-123")
            .await;

        assert!(matches!(result, Err(PersistError::Transport(_))));
    }

    #[test]
    fn test_stored_message_username_optional() {
        let json = r#"{
            "id": "m1",
            "roomId": "general",
            "userId": "u1",
            "content": "hi",
            "createdAt": "t1"
        }"#;
        let stored: StoredMessage = serde_json::from_str(json).unwrap();
        assert!(stored.username.is_none());
    }
}
