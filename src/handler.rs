//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake with identity
//! extraction from the query string, event parsing, and bidirectional
//! communication with the SocketServer actor.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::message::{ClientEvent, ErrorCode, ServerEvent};
use crate::server::ServerCommand;
use crate::types::{SocketId, UserId};

/// Per-session event channel buffer
const SESSION_BUFFER_SIZE: usize = 32;

/// Identity established at handshake time
///
/// Parsed from the connection URL's query string
/// (`?userId=…&username=…&token=…`). `userId` and `username` are required;
/// the handshake is rejected with HTTP 400 without them. Fixed for the
/// session's lifetime: event payloads can never override it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub token: Option<String>,
}

impl Identity {
    /// Parse identity from a raw query string
    ///
    /// Returns the name of the first missing required parameter on failure.
    pub fn from_query(query: Option<&str>) -> Result<Self, &'static str> {
        let mut user_id = None;
        let mut username = None;
        let mut token = None;

        if let Some(query) = query {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                match key.as_ref() {
                    "userId" => user_id = Some(value.into_owned()),
                    "username" => username = Some(value.into_owned()),
                    "token" => token = Some(value.into_owned()),
                    _ => {}
                }
            }
        }

        let user_id = user_id.filter(|v| !v.is_empty()).ok_or("userId")?;
        let username = username.filter(|v| !v.is_empty()).ok_or("username")?;

        Ok(Self {
            user_id: UserId::new(user_id),
            username,
            token: token.filter(|v| !v.is_empty()),
        })
    }
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake (rejecting connections without
/// identity), registers the session with the SocketServer, and pumps events
/// in both directions until the connection closes.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake; the callback captures the identity query
    let mut identity: Option<Identity> = None;
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        match Identity::from_query(req.uri().query()) {
            Ok(id) => {
                identity = Some(id);
                Ok(resp)
            }
            Err(param) => {
                warn!("Handshake from {} missing {}", peer_addr, param);
                let mut resp =
                    ErrorResponse::new(Some(format!("Missing required query parameter: {param}")));
                *resp.status_mut() = StatusCode::BAD_REQUEST;
                Err(resp)
            }
        }
    })
    .await?;

    let Some(identity) = identity else {
        // accept_hdr_async errors out before reaching here when the
        // callback rejects; this is unreachable in practice
        return Err(AppError::Handshake("userId"));
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let socket_id = SocketId::new();
    info!(
        "User connected: {} ({}) from {}",
        identity.username, socket_id, peer_addr
    );

    // Create channel for server -> client events
    let (event_tx, mut event_rx) = mpsc::channel::<ServerEvent>(SESSION_BUFFER_SIZE);

    // Register with the SocketServer
    if cmd_tx
        .send(ServerCommand::Connect {
            socket_id,
            user_id: identity.user_id,
            username: identity.username,
            auth_token: identity.token,
            sender: event_tx.clone(),
        })
        .await
        .is_err()
    {
        error!("Failed to register socket {} - server closed", socket_id);
        return Err(AppError::ChannelSend);
    }

    // Confirm the connection
    let ack = ServerEvent::ConnectionAck {
        socket_id: socket_id.to_string(),
        message: "Connected to chat socket server".to_string(),
    };
    let json = serde_json::to_string(&ack)?;
    ws_sender.send(Message::Text(json.into())).await?;

    // Clone cmd_tx for read task
    let cmd_tx_read = cmd_tx.clone();

    // Spawn read task (WebSocket -> ServerCommand)
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            let cmd = client_event_to_command(socket_id, event);
                            if cmd_tx_read.send(cmd).await.is_err() {
                                debug!("Server closed, ending read task for {}", socket_id);
                                break;
                            }
                        }
                        Err(e) => {
                            // Malformed payloads are answered with a typed
                            // error, never dispatched with missing fields
                            warn!("Invalid event from {}: {}", socket_id, e);
                            let _ = event_tx
                                .send(ServerEvent::Error {
                                    code: ErrorCode::InvalidEvent,
                                    message: format!("Invalid event format: {e}"),
                                })
                                .await;
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Socket {} sent close frame", socket_id);
                    break;
                }
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping from {}", socket_id);
                }
                Ok(Message::Pong(_)) => {
                    debug!("Pong from {}", socket_id);
                }
                Ok(_) => {
                    // Binary or other frame types - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", socket_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", socket_id);
    });

    // Spawn write task (ServerEvent -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                    // Continue - don't break on serialization errors
                }
            }
        }
        debug!("Write task ended for socket");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = read_task => {
            debug!("Read task completed for {}", socket_id);
        }
        _ = write_task => {
            debug!("Write task completed for {}", socket_id);
        }
    }

    // Tear down session state; the actor removes membership and typing
    // entries even if the peer vanished mid-send
    let _ = cmd_tx.send(ServerCommand::Disconnect { socket_id }).await;

    info!("Socket {} disconnected", socket_id);

    Ok(())
}

/// Convert a ClientEvent to a ServerCommand
fn client_event_to_command(socket_id: SocketId, event: ClientEvent) -> ServerCommand {
    match event {
        ClientEvent::Join { room_id } => ServerCommand::Join { socket_id, room_id },
        ClientEvent::Leave { room_id } => ServerCommand::Leave { socket_id, room_id },
        ClientEvent::Send { room_id, content } => ServerCommand::Send {
            socket_id,
            room_id,
            content,
        },
        ClientEvent::TypingStart { room_id } => ServerCommand::TypingStart { socket_id, room_id },
        ClientEvent::TypingStop { room_id } => ServerCommand::TypingStop { socket_id, room_id },
    }
}
