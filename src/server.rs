//! SocketServer actor implementation
//!
//! The central actor owning all coordination state: sessions, room
//! subscriptions, the membership registry, and the typing tracker. Uses the
//! Actor pattern with mpsc channels for message passing: one task processes
//! commands to completion, so a state mutation and the broadcast it triggers
//! are atomic with respect to every other event, without locks.
//!
//! The only suspending operation is the persistence call during send. It is
//! spawned onto its own task so the actor keeps processing other events; the
//! result comes back as a `MessagePersisted` command and the fan-out happens
//! there, against a fresh read of the subscription table.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::message::{ChatMessage, ServerEvent};
use crate::persist::{MessageStore, PersistError, StoredMessage};
use crate::registry::{RoomRegistry, RoomStats};
use crate::session::Session;
use crate::typing::TypingTracker;
use crate::types::{RoomId, SocketId, UserId};

/// Commands sent from connection handlers (and the ops endpoints) to the
/// SocketServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New client connected; identity comes from the handshake and is fixed
    /// for the session's lifetime
    Connect {
        socket_id: SocketId,
        user_id: UserId,
        username: String,
        auth_token: Option<String>,
        sender: mpsc::Sender<ServerEvent>,
    },
    /// Client disconnected
    Disconnect { socket_id: SocketId },
    /// Join a room
    Join { socket_id: SocketId, room_id: RoomId },
    /// Leave a room
    Leave { socket_id: SocketId, room_id: RoomId },
    /// Send a chat message
    Send {
        socket_id: SocketId,
        room_id: RoomId,
        content: String,
    },
    /// Client started typing
    TypingStart { socket_id: SocketId, room_id: RoomId },
    /// Client stopped typing
    TypingStop { socket_id: SocketId, room_id: RoomId },
    /// A spawned persistence call finished
    MessagePersisted {
        socket_id: SocketId,
        room_id: RoomId,
        result: Result<StoredMessage, PersistError>,
    },
    /// Liveness snapshot for the ops endpoint
    GetHealth {
        reply: oneshot::Sender<HealthSnapshot>,
    },
    /// Stats snapshot for the ops endpoint
    GetStats { reply: oneshot::Sender<StatsSnapshot> },
}

/// Liveness numbers served by `GET /health`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub connected_users: usize,
    pub active_rooms: usize,
}

/// Registry and tracker numbers served by `GET /stats`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    #[serde(flatten)]
    pub rooms: RoomStats,
    pub connected_sockets: usize,
    pub typing_rooms: usize,
}

/// The main SocketServer actor
///
/// The registry and tracker are constructed by the caller and moved in at
/// startup; nothing else in the process can reach them.
pub struct SocketServer {
    /// All live sessions: SocketId -> Session
    sessions: HashMap<SocketId, Session>,
    /// Room broadcast channels: RoomId -> subscribed sockets
    subscriptions: HashMap<RoomId, HashSet<SocketId>>,
    /// Room↔user membership index
    registry: RoomRegistry,
    /// Per-room typing sets
    typing: TypingTracker,
    /// Durable message storage collaborator
    store: Arc<dyn MessageStore>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
    /// Loopback sender for persistence completions
    loopback: mpsc::Sender<ServerCommand>,
}

impl SocketServer {
    /// Create a new SocketServer with the given state and channel endpoints
    ///
    /// `loopback` must be a sender for the same channel `receiver` reads
    /// from; spawned persistence tasks use it to report back.
    pub fn new(
        registry: RoomRegistry,
        typing: TypingTracker,
        store: Arc<dyn MessageStore>,
        loopback: mpsc::Sender<ServerCommand>,
        receiver: mpsc::Receiver<ServerCommand>,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            subscriptions: HashMap::new(),
            registry,
            typing,
            store,
            receiver,
            loopback,
        }
    }

    /// Run the SocketServer event loop
    ///
    /// Continuously receives and processes commands until all senders are
    /// dropped.
    pub async fn run(mut self) {
        info!("SocketServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!("SocketServer shutting down");
    }

    /// Process a single command
    async fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect {
                socket_id,
                user_id,
                username,
                auth_token,
                sender,
            } => {
                self.handle_connect(socket_id, user_id, username, auth_token, sender);
            }
            ServerCommand::Disconnect { socket_id } => {
                self.handle_disconnect(socket_id).await;
            }
            ServerCommand::Join { socket_id, room_id } => {
                self.handle_join(socket_id, room_id).await;
            }
            ServerCommand::Leave { socket_id, room_id } => {
                self.handle_leave(socket_id, room_id).await;
            }
            ServerCommand::Send {
                socket_id,
                room_id,
                content,
            } => {
                self.handle_send(socket_id, room_id, content).await;
            }
            ServerCommand::TypingStart { socket_id, room_id } => {
                self.handle_typing_start(socket_id, room_id).await;
            }
            ServerCommand::TypingStop { socket_id, room_id } => {
                self.handle_typing_stop(socket_id, room_id).await;
            }
            ServerCommand::MessagePersisted {
                socket_id,
                room_id,
                result,
            } => {
                self.handle_message_persisted(socket_id, room_id, result).await;
            }
            ServerCommand::GetHealth { reply } => {
                let _ = reply.send(HealthSnapshot {
                    connected_users: self.sessions.len(),
                    active_rooms: self.registry.active_room_count(),
                });
            }
            ServerCommand::GetStats { reply } => {
                let _ = reply.send(StatsSnapshot {
                    rooms: self.registry.stats(),
                    connected_sockets: self.sessions.len(),
                    typing_rooms: self.typing.room_count(),
                });
            }
        }
    }

    /// Handle new client connection
    fn handle_connect(
        &mut self,
        socket_id: SocketId,
        user_id: UserId,
        username: String,
        auth_token: Option<String>,
        sender: mpsc::Sender<ServerEvent>,
    ) {
        info!("User connected: {} ({})", username, socket_id);
        let session = Session::new(socket_id, user_id, username, auth_token, sender);
        self.sessions.insert(socket_id, session);
        debug!(
            "Total sessions: {}, active rooms: {}",
            self.sessions.len(),
            self.registry.active_room_count()
        );
    }

    /// Handle client disconnection
    ///
    /// Tears down typing state and room membership for the session. Each
    /// step is best-effort: a closed peer channel never prevents the
    /// bookkeeping entries from being removed.
    async fn handle_disconnect(&mut self, socket_id: SocketId) {
        let Some(session) = self.sessions.remove(&socket_id) else {
            return;
        };
        info!("User disconnected: {} ({})", session.username, socket_id);

        let rooms = self.registry.user_rooms_of(&session.user_id);

        // Typing cleanup first, so nobody is shown as typing after they left
        let changed = self.typing.cleanup(&session.username, &rooms);
        for room_id in changed {
            let typing_users = self.typing.typing_users(&room_id);
            self.broadcast_to_room(
                &room_id,
                ServerEvent::TypingUpdated {
                    room_id: room_id.clone(),
                    typing_users,
                },
            )
            .await;
        }

        // Membership teardown, notifying each room's remaining members
        let user = session.user_ref();
        for room_id in self.registry.remove_user_from_all_rooms(&session.user_id) {
            self.unsubscribe(&room_id, socket_id);
            let users = self.registry.room_users(&room_id);
            self.broadcast_to_room(
                &room_id,
                ServerEvent::RoomLeft {
                    room_id: room_id.clone(),
                    user: user.clone(),
                    users,
                },
            )
            .await;
        }

        // The socket may still sit in subscription sets for rooms it was
        // subscribed to without registry membership (shared userId)
        self.subscriptions.retain(|_, socks| {
            socks.remove(&socket_id);
            !socks.is_empty()
        });

        debug!(
            "Total sessions: {}, active rooms: {}",
            self.sessions.len(),
            self.registry.active_room_count()
        );
    }

    /// Handle room join
    ///
    /// Idempotent; always succeeds. Everyone in the room, the joiner
    /// included, gets the fresh member list.
    async fn handle_join(&mut self, socket_id: SocketId, room_id: RoomId) {
        let Some(session) = self.sessions.get(&socket_id) else {
            return;
        };
        let user = session.user_ref();

        self.registry
            .add_user_to_room(&room_id, &user.user_id, &user.username);
        self.subscriptions
            .entry(room_id.clone())
            .or_default()
            .insert(socket_id);

        let users = self.registry.room_users(&room_id);
        let total_users = self.registry.room_user_count(&room_id);

        info!("{} joined room {} ({} users)", user.username, room_id, total_users);

        self.broadcast_to_room(
            &room_id,
            ServerEvent::RoomJoined {
                room_id: room_id.clone(),
                user,
                users,
                total_users,
            },
        )
        .await;
    }

    /// Handle room leave
    async fn handle_leave(&mut self, socket_id: SocketId, room_id: RoomId) {
        let Some(session) = self.sessions.get(&socket_id) else {
            return;
        };
        let user = session.user_ref();
        let username = user.username.clone();

        self.registry.remove_user_from_room(&room_id, &user.user_id);
        self.unsubscribe(&room_id, socket_id);

        // Drop the leaver from the room's typing set and tell the remaining
        // members, so no stale indicator survives the departure
        let changed = self.typing.cleanup(&username, std::slice::from_ref(&room_id));
        if !changed.is_empty() {
            let typing_users = self.typing.typing_users(&room_id);
            self.broadcast_to_room(
                &room_id,
                ServerEvent::TypingUpdated {
                    room_id: room_id.clone(),
                    typing_users,
                },
            )
            .await;
        }

        let users = self.registry.room_users(&room_id);

        info!("{} left room {}", username, room_id);

        self.broadcast_to_room(
            &room_id,
            ServerEvent::RoomLeft {
                room_id: room_id.clone(),
                user,
                users,
            },
        )
        .await;
    }

    /// Handle chat message send
    ///
    /// Validates locally, then spawns the persistence call so the actor
    /// never suspends on the backend. Nothing is mutated or broadcast until
    /// the completion command arrives.
    async fn handle_send(&mut self, socket_id: SocketId, room_id: RoomId, content: String) {
        let Some(session) = self.sessions.get(&socket_id) else {
            return;
        };

        if content.trim().is_empty() {
            warn!("{} sent empty message to room {}", session.username, room_id);
            let _ = session.send(AppError::Validation.into()).await;
            return;
        }

        let Some(token) = session.auth_token.clone() else {
            warn!("{} sent message without credential", session.username);
            let _ = session.send(AppError::Auth.into()).await;
            return;
        };

        let store = Arc::clone(&self.store);
        let loopback = self.loopback.clone();
        tokio::spawn(async move {
            let result = store.store_message(&room_id, &content, &token).await;
            let _ = loopback
                .send(ServerCommand::MessagePersisted {
                    socket_id,
                    room_id,
                    result,
                })
                .await;
        });
    }

    /// Handle a finished persistence call
    ///
    /// On success, republishes the stored record to every socket currently
    /// subscribed to the room, sender included (clients render the echo).
    /// On failure, only the sender hears about it.
    async fn handle_message_persisted(
        &mut self,
        socket_id: SocketId,
        room_id: RoomId,
        result: Result<StoredMessage, PersistError>,
    ) {
        let stored = match result {
            Ok(stored) => stored,
            Err(e) => {
                error!("Failed to store message for room {}: {}", room_id, e);
                if let Some(session) = self.sessions.get(&socket_id) {
                    let _ = session.send(AppError::Persistence(e).into()).await;
                }
                return;
            }
        };

        // The backend record is canonical; only a missing username falls
        // back to what the session knows
        let username = stored
            .username
            .or_else(|| self.sessions.get(&socket_id).map(|s| s.username.clone()))
            .unwrap_or_else(|| "Unknown".to_string());

        let message = ChatMessage {
            id: stored.id,
            room_id: stored.room_id,
            user_id: stored.user_id,
            username,
            content: stored.content,
            created_at: stored.created_at,
        };

        debug!("Message {} stored for room {}", message.id, room_id);

        self.broadcast_to_room(&room_id, ServerEvent::MessageNew(message))
            .await;
    }

    /// Handle typing indicator start
    async fn handle_typing_start(&mut self, socket_id: SocketId, room_id: RoomId) {
        let Some(session) = self.sessions.get(&socket_id) else {
            return;
        };
        let username = session.username.clone();

        self.typing.start_typing(&room_id, &username);
        self.broadcast_typing(&room_id).await;
    }

    /// Handle typing indicator stop
    async fn handle_typing_stop(&mut self, socket_id: SocketId, room_id: RoomId) {
        let Some(session) = self.sessions.get(&socket_id) else {
            return;
        };
        let username = session.username.clone();

        self.typing.stop_typing(&room_id, &username);
        // Broadcast even when the list emptied
        self.broadcast_typing(&room_id).await;
    }

    /// Broadcast the room's current typing list to its members
    async fn broadcast_typing(&self, room_id: &RoomId) {
        let typing_users = self.typing.typing_users(room_id);
        self.broadcast_to_room(
            room_id,
            ServerEvent::TypingUpdated {
                room_id: room_id.clone(),
                typing_users,
            },
        )
        .await;
    }

    /// Send an event to every socket subscribed to a room
    async fn broadcast_to_room(&self, room_id: &RoomId, event: ServerEvent) {
        let Some(sockets) = self.subscriptions.get(room_id) else {
            return;
        };
        for socket_id in sockets {
            if let Some(session) = self.sessions.get(socket_id) {
                let _ = session.send(event.clone()).await;
            }
        }
    }

    /// Remove a socket from a room's subscription set, pruning empty sets
    fn unsubscribe(&mut self, room_id: &RoomId, socket_id: SocketId) {
        if let Some(sockets) = self.subscriptions.get_mut(room_id) {
            sockets.remove(&socket_id);
            if sockets.is_empty() {
                self.subscriptions.remove(room_id);
            }
        }
    }
}
