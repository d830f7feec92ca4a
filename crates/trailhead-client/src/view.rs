//! Observable chat view state.
//!
//! [`ChatView`] is the view model list screens render from: the tracked
//! rooms, each room's latest message, and the signed-in user's unread count
//! per room. It is a cache rebuilt from subscriptions and never authoritative.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use trailhead_core::{Message, Room, lock};

/// Chat list view model, keyed by [`Room::key`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatView {
    /// Tracked rooms in roster order.
    pub rooms: Vec<Room>,
    /// Latest message per room. `None` while a room has no messages.
    pub last_messages: HashMap<String, Option<Message>>,
    /// Unread count per room.
    pub unread_counts: HashMap<String, u64>,
}

impl ChatView {
    /// Unread count of one room. Unknown rooms read as 0.
    pub fn unread(&self, key: &str) -> u64 {
        self.unread_counts.get(key).copied().unwrap_or(0)
    }

    /// Sum of unread counts over tracked rooms, for the tab badge.
    pub fn total_unread(&self) -> u64 {
        self.rooms.iter().map(|room| self.unread(&room.key)).sum()
    }

    /// Latest message of one room.
    pub fn last_message(&self, key: &str) -> Option<&Message> {
        self.last_messages.get(key).and_then(Option::as_ref)
    }

    /// Rooms ordered by latest activity, newest first. Rooms without
    /// messages keep roster order at the end.
    pub fn rooms_by_recency(&self) -> Vec<&Room> {
        let mut rooms: Vec<&Room> = self.rooms.iter().collect();
        // Stable sort keeps roster order among equal keys.
        rooms.sort_by(|a, b| {
            let a = self.last_message(&a.key).map(|m| m.created_at);
            let b = self.last_message(&b.key).map(|m| m.created_at);
            b.cmp(&a)
        });
        rooms
    }

    fn clear(&mut self) {
        self.rooms.clear();
        self.last_messages.clear();
        self.unread_counts.clear();
    }
}

/// Notifications from the view to the UI layer.
pub trait ViewObserver: Send + Sync {
    /// The room list is about to reorder; animate the next layout.
    fn layout_transition(&self) {}

    /// View state changed.
    fn view_changed(&self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ViewObserver for NoopObserver {}

/// Shared handle to the live view, written by subscription callbacks.
///
/// Clones observe the same state.
#[derive(Clone)]
pub struct SharedView {
    state: Arc<Mutex<ChatView>>,
    observer: Arc<dyn ViewObserver>,
}

impl SharedView {
    pub(crate) fn new(observer: Arc<dyn ViewObserver>) -> Self {
        Self { state: Arc::new(Mutex::new(ChatView::default())), observer }
    }

    /// Apply `f` and notify the observer after the lock is released.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut ChatView) -> R) -> R {
        let result = f(&mut lock(&self.state));
        self.observer.view_changed();
        result
    }

    pub(crate) fn layout_transition(&self) {
        self.observer.layout_transition();
    }

    /// Copy of the current view.
    pub fn snapshot(&self) -> ChatView {
        lock(&self.state).clone()
    }

    pub(crate) fn clear(&self) {
        self.update(ChatView::clear);
    }
}
