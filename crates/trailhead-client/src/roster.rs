//! Room roster manager.
//!
//! Derives the rooms a session tracks from the signed-in user's profile and
//! keeps that list stable across profile refreshes.
//!
//! # Reconciliation
//!
//! Profile data arrives repeatedly and may briefly lag or omit entries, so
//! merges are additive: a room is only dropped by an explicit
//! [`RoomRoster::remove`]. A removed room stays *removal pending* until a
//! profile without it arrives (removal confirmed by the backend). While
//! pending, merges do not resurrect it.

use std::collections::HashSet;

use trailhead_core::{Profile, Room};

/// Rooms derivable from a profile: direct partners first, then groups.
pub fn derive_rooms(profile: &Profile) -> Vec<Room> {
    let direct = profile
        .chatrooms_with
        .iter()
        .map(|partner| Room::direct(&profile.auth_id, partner.id.clone(), &partner.auth_id));
    let groups = profile.chatrooms_groups.iter().map(|group| Room::group(group.id.clone()));
    direct.chain(groups).collect()
}

/// Rooms the session is tracking.
#[derive(Debug, Clone, Default)]
pub struct RoomRoster {
    rooms: Vec<Room>,
    pending_removals: HashSet<String>,
}

impl RoomRoster {
    /// Empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracked rooms in insertion order.
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// Whether no room is tracked.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Tracked room by key.
    pub fn get(&self, key: &str) -> Option<&Room> {
        self.rooms.iter().find(|room| room.key == key)
    }

    /// Whether `key` was removed locally and the profile still lists it.
    pub fn is_removal_pending(&self, key: &str) -> bool {
        self.pending_removals.contains(key)
    }

    /// Populate an empty roster from `profile`.
    ///
    /// No-op if rooms are already present. Returns whether the roster changed.
    pub fn initialize(&mut self, profile: &Profile) -> bool {
        if !self.rooms.is_empty() {
            return false;
        }
        self.reconcile(profile)
    }

    /// Merge rooms from `profile` that are not yet tracked.
    ///
    /// Never removes a tracked room. Settles pending removals the profile no
    /// longer lists. Returns whether the tracked rooms changed.
    pub fn reconcile(&mut self, profile: &Profile) -> bool {
        let derived = derive_rooms(profile);

        let listed: HashSet<&str> = derived.iter().map(|room| room.key.as_str()).collect();
        self.pending_removals.retain(|key| listed.contains(key.as_str()));

        let before = self.rooms.len();
        for room in derived {
            if self.get(&room.key).is_none() && !self.pending_removals.contains(&room.key) {
                self.rooms.push(room);
            }
        }
        self.rooms.len() != before
    }

    /// Stop tracking a room. Returns it if it was tracked.
    pub fn remove(&mut self, key: &str) -> Option<Room> {
        let index = self.rooms.iter().position(|room| room.key == key)?;
        self.pending_removals.insert(key.to_string());
        Some(self.rooms.remove(index))
    }

    /// Forget everything, including pending removals.
    pub fn clear(&mut self) {
        self.rooms.clear();
        self.pending_removals.clear();
    }
}
