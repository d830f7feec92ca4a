//! Last-message tracker.
//!
//! Watches the newest message of every tracked room and mirrors it into
//! [`crate::ChatView::last_messages`], so the chat list can show a preview
//! and order rooms by activity.

use trailhead_core::{Document, Message, Query, Room, SharedStore, Subscription};

use crate::{SubscriptionRegistry, view::SharedView};

/// Live latest-message previews for the tracked rooms.
#[derive(Debug, Default)]
pub struct LastMessageTracker {
    active: Vec<Subscription>,
}

impl LastMessageTracker {
    /// Tracker with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-subscribe for `rooms`, replacing any previous subscriptions.
    pub(crate) async fn start(
        &mut self,
        store: &SharedStore,
        rooms: &[Room],
        view: &SharedView,
        registry: &SubscriptionRegistry,
    ) {
        self.stop();
        if rooms.is_empty() {
            return;
        }

        view.update(|v| {
            for room in rooms {
                v.last_messages.insert(room.key.clone(), None);
            }
        });

        for room in rooms {
            let query = Query::messages(&room.room_id).descending().limit(1);
            let callback = {
                let view = view.clone();
                let key = room.key.clone();
                Box::new(move |docs: Vec<Document>| apply_snapshot(&view, &key, &docs))
            };

            match store.subscribe_query(query, callback).await {
                Ok(sub) => {
                    registry.register(sub.clone());
                    self.active.push(sub);
                },
                Err(e) => {
                    tracing::warn!("last-message subscription for {} failed: {}", room.room_id, e);
                },
            }
        }
    }

    /// Cancel every subscription this tracker opened.
    pub fn stop(&mut self) {
        for sub in self.active.drain(..) {
            sub.cancel();
        }
    }

    /// Number of open subscriptions.
    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|s| !s.is_cancelled()).count()
    }
}

fn apply_snapshot(view: &SharedView, key: &str, docs: &[Document]) {
    let latest = match docs.first().map(Message::from_document) {
        None => None,
        Some(Ok(message)) => Some(message),
        Some(Err(e)) => {
            tracing::warn!("skipping last message for {}: {}", key, e);
            return;
        },
    };

    view.layout_transition();
    view.update(|v| {
        v.last_messages.insert(key.to_string(), latest);
    });
}
