//! Typing tracker
//!
//! Per-room set of usernames currently composing a message. Ephemeral and
//! session-scoped: state is lost on restart by design. Same emptiness
//! invariant as the membership registry: a room's entry is pruned in the
//! same operation that empties its set.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::types::RoomId;

#[derive(Debug, Default)]
pub struct TypingTracker {
    typing: HashMap<RoomId, HashSet<String>>,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a user as typing in a room (idempotent)
    pub fn start_typing(&mut self, room_id: &RoomId, username: &str) {
        self.typing
            .entry(room_id.clone())
            .or_default()
            .insert(username.to_string());
        debug!("{} typing in room {}", username, room_id);
    }

    /// Mark a user as no longer typing; prunes the room entry if emptied
    pub fn stop_typing(&mut self, room_id: &RoomId, username: &str) {
        if let Some(users) = self.typing.get_mut(room_id) {
            users.remove(username);
            if users.is_empty() {
                self.typing.remove(room_id);
            }
        }
    }

    /// Usernames currently typing in a room, sorted for stable output
    pub fn typing_users(&self, room_id: &RoomId) -> Vec<String> {
        let Some(users) = self.typing.get(room_id) else {
            return Vec::new();
        };
        let mut users: Vec<String> = users.iter().cloned().collect();
        users.sort();
        users
    }

    /// Number of rooms with at least one typing user
    pub fn room_count(&self) -> usize {
        self.typing.len()
    }

    /// Remove a user from the typing set of each given room
    ///
    /// Used on disconnect. Returns the rooms whose set actually changed so
    /// the caller can broadcast the updated list (which may be empty, when
    /// the departing user was the last typist).
    pub fn cleanup(&mut self, username: &str, rooms: &[RoomId]) -> Vec<RoomId> {
        let mut changed = Vec::new();
        for room_id in rooms {
            if let Some(users) = self.typing.get_mut(room_id) {
                if users.remove(username) {
                    changed.push(room_id.clone());
                }
                if users.is_empty() {
                    self.typing.remove(room_id);
                }
            }
        }
        if !changed.is_empty() {
            debug!("Typing cleanup for {} touched {} rooms", username, changed.len());
        }
        changed
    }
}
