//! Membership registry
//!
//! In-memory bidirectional index of room↔user membership. Both maps are
//! private and mutated only through paired operations, so the inverse-index
//! invariant (a user appears in `user_rooms` for room R iff R's member map
//! contains that user) cannot be violated from outside. Empty collections
//! are pruned in the same operation that empties them: no room or user
//! entry ever exists with zero members.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::types::{RoomId, UserId};

/// One user's live presence in one room
///
/// Created on join, removed on leave/disconnect. Not persisted; distinct
/// from the backend's durable room-member records.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUser {
    pub user_id: UserId,
    pub username: String,
    pub joined_at: DateTime<Utc>,
}

/// Per-room user count, as reported by `/stats`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetail {
    pub room_id: RoomId,
    pub user_count: usize,
}

/// Snapshot of registry state for the stats endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStats {
    pub total_rooms: usize,
    pub total_users: usize,
    pub room_details: Vec<RoomDetail>,
}

/// Bidirectional room↔user membership index
///
/// All operations are synchronous and purely in-memory. Constructed once at
/// startup and owned by the event router; handlers never touch the maps
/// directly.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    /// roomId -> userId -> presence record
    rooms: HashMap<RoomId, HashMap<UserId, RoomUser>>,
    /// userId -> set of roomIds (exact inverse of `rooms`)
    user_rooms: HashMap<UserId, HashSet<RoomId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user to a room
    ///
    /// Idempotent upsert: re-adding a present user refreshes `joined_at`
    /// without duplicating the membership.
    pub fn add_user_to_room(&mut self, room_id: &RoomId, user_id: &UserId, username: &str) {
        self.rooms.entry(room_id.clone()).or_default().insert(
            user_id.clone(),
            RoomUser {
                user_id: user_id.clone(),
                username: username.to_string(),
                joined_at: Utc::now(),
            },
        );

        self.user_rooms
            .entry(user_id.clone())
            .or_default()
            .insert(room_id.clone());

        debug!("{} added to room {}", username, room_id);
    }

    /// Remove a user from a room
    ///
    /// No-op if the user was not a member. Prunes the room entry when it
    /// empties, and the user's reverse-index entry when their last room
    /// is removed.
    pub fn remove_user_from_room(&mut self, room_id: &RoomId, user_id: &UserId) {
        if let Some(users) = self.rooms.get_mut(room_id) {
            if let Some(removed) = users.remove(user_id) {
                debug!("{} removed from room {}", removed.username, room_id);
            }
            if users.is_empty() {
                self.rooms.remove(room_id);
            }
        }

        if let Some(rooms) = self.user_rooms.get_mut(user_id) {
            rooms.remove(room_id);
            if rooms.is_empty() {
                self.user_rooms.remove(user_id);
            }
        }
    }

    /// Remove a user from every room they belong to
    ///
    /// Returns the affected room ids so the caller can notify remaining
    /// members.
    pub fn remove_user_from_all_rooms(&mut self, user_id: &UserId) -> Vec<RoomId> {
        let rooms = self.user_rooms_of(user_id);
        for room_id in &rooms {
            self.remove_user_from_room(room_id, user_id);
        }
        rooms
    }

    /// All users currently in a room, in join order
    ///
    /// Empty for unknown rooms, never an error.
    pub fn room_users(&self, room_id: &RoomId) -> Vec<RoomUser> {
        let Some(users) = self.rooms.get(room_id) else {
            return Vec::new();
        };
        let mut users: Vec<RoomUser> = users.values().cloned().collect();
        users.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.user_id.0.cmp(&b.user_id.0))
        });
        users
    }

    /// All rooms a user currently belongs to (empty for unknown users)
    pub fn user_rooms_of(&self, user_id: &UserId) -> Vec<RoomId> {
        self.user_rooms
            .get(user_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a user is currently in a room
    pub fn is_user_in_room(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|users| users.contains_key(user_id))
    }

    /// Number of users in a room (0 for unknown rooms)
    pub fn room_user_count(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map_or(0, HashMap::len)
    }

    /// Ids of all rooms with at least one member
    pub fn active_rooms(&self) -> Vec<RoomId> {
        self.rooms.keys().cloned().collect()
    }

    /// Number of rooms with at least one member
    pub fn active_room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of distinct users present in at least one room
    pub fn tracked_user_count(&self) -> usize {
        self.user_rooms.len()
    }

    /// Snapshot for the stats endpoint
    pub fn stats(&self) -> RoomStats {
        let mut room_details: Vec<RoomDetail> = self
            .rooms
            .iter()
            .map(|(room_id, users)| RoomDetail {
                room_id: room_id.clone(),
                user_count: users.len(),
            })
            .collect();
        room_details.sort_by(|a, b| a.room_id.0.cmp(&b.room_id.0));

        RoomStats {
            total_rooms: self.rooms.len(),
            total_users: self.user_rooms.len(),
            room_details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: &str) -> RoomId {
        RoomId::new(id)
    }

    fn user(id: &str) -> UserId {
        UserId::new(id)
    }

    #[test]
    fn test_add_and_count() {
        let mut registry = RoomRegistry::new();
        registry.add_user_to_room(&room("general"), &user("u1"), "alice");
        registry.add_user_to_room(&room("general"), &user("u2"), "bob");

        assert_eq!(registry.room_user_count(&room("general")), 2);
        assert_eq!(registry.active_room_count(), 1);
        assert_eq!(registry.tracked_user_count(), 2);
    }

    #[test]
    fn test_join_is_idempotent() {
        let mut registry = RoomRegistry::new();
        registry.add_user_to_room(&room("general"), &user("u1"), "alice");
        registry.add_user_to_room(&room("general"), &user("u1"), "alice");

        assert_eq!(registry.room_user_count(&room("general")), 1);
        assert_eq!(registry.user_rooms_of(&user("u1")), vec![room("general")]);
    }

    #[test]
    fn test_room_users_in_join_order() {
        let mut registry = RoomRegistry::new();
        registry.add_user_to_room(&room("general"), &user("u1"), "alice");
        registry.add_user_to_room(&room("general"), &user("u2"), "bob");

        let users = registry.room_users(&room("general"));
        let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[test]
    fn test_unknown_room_and_user_are_empty() {
        let registry = RoomRegistry::new();
        assert!(registry.room_users(&room("nope")).is_empty());
        assert!(registry.user_rooms_of(&user("nobody")).is_empty());
        assert_eq!(registry.room_user_count(&room("nope")), 0);
        assert!(!registry.is_user_in_room(&room("nope"), &user("nobody")));
    }

    #[test]
    fn test_empty_room_is_pruned() {
        let mut registry = RoomRegistry::new();
        registry.add_user_to_room(&room("general"), &user("u1"), "alice");
        registry.remove_user_from_room(&room("general"), &user("u1"));

        // Never present with count 0
        assert!(registry.active_rooms().is_empty());
        assert_eq!(registry.active_room_count(), 0);
        assert_eq!(registry.tracked_user_count(), 0);
    }

    #[test]
    fn test_remove_absent_user_is_noop() {
        let mut registry = RoomRegistry::new();
        registry.add_user_to_room(&room("general"), &user("u1"), "alice");
        registry.remove_user_from_room(&room("general"), &user("u2"));

        assert_eq!(registry.room_user_count(&room("general")), 1);
    }

    #[test]
    fn test_inverse_index_tracks_membership() {
        let mut registry = RoomRegistry::new();
        registry.add_user_to_room(&room("general"), &user("u1"), "alice");
        registry.add_user_to_room(&room("random"), &user("u1"), "alice");

        let mut rooms = registry.user_rooms_of(&user("u1"));
        rooms.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(rooms, vec![room("general"), room("random")]);

        registry.remove_user_from_room(&room("general"), &user("u1"));
        assert_eq!(registry.user_rooms_of(&user("u1")), vec![room("random")]);
        assert!(!registry.is_user_in_room(&room("general"), &user("u1")));
        assert!(registry.is_user_in_room(&room("random"), &user("u1")));
    }

    #[test]
    fn test_remove_from_all_rooms() {
        let mut registry = RoomRegistry::new();
        registry.add_user_to_room(&room("general"), &user("u1"), "alice");
        registry.add_user_to_room(&room("random"), &user("u1"), "alice");
        registry.add_user_to_room(&room("general"), &user("u2"), "bob");

        let mut affected = registry.remove_user_from_all_rooms(&user("u1"));
        affected.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(affected, vec![room("general"), room("random")]);

        assert!(registry.user_rooms_of(&user("u1")).is_empty());
        assert_eq!(registry.room_user_count(&room("general")), 1);
        // "random" emptied and was pruned
        assert_eq!(registry.active_rooms(), vec![room("general")]);
    }

    #[test]
    fn test_stats_snapshot() {
        let mut registry = RoomRegistry::new();
        registry.add_user_to_room(&room("general"), &user("u1"), "alice");
        registry.add_user_to_room(&room("general"), &user("u2"), "bob");
        registry.add_user_to_room(&room("random"), &user("u1"), "alice");

        let stats = registry.stats();
        assert_eq!(stats.total_rooms, 2);
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.room_details.len(), 2);
        assert_eq!(stats.room_details[0].room_id, room("general"));
        assert_eq!(stats.room_details[0].user_count, 2);
        assert_eq!(stats.room_details[1].user_count, 1);
    }
}
