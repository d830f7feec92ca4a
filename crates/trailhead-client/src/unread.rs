//! Unread-count tracker.
//!
//! Watches one room document per tracked room and mirrors the signed-in
//! user's participant counter into [`crate::ChatView::unread_counts`].

use trailhead_core::{DocPath, Document, Room, SharedStore, Subscription, UserId};

use crate::{SubscriptionRegistry, view::SharedView};

/// Live unread counters for the tracked rooms.
#[derive(Debug, Default)]
pub struct UnreadTracker {
    active: Vec<Subscription>,
}

impl UnreadTracker {
    /// Tracker with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-subscribe for `rooms`, replacing any previous subscriptions.
    ///
    /// Every room's counter starts at 0 until its first snapshot arrives.
    /// Rooms whose subscription cannot be set up keep that 0; the failure is
    /// logged.
    pub(crate) async fn start(
        &mut self,
        store: &SharedStore,
        me: &UserId,
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
                v.unread_counts.insert(room.key.clone(), 0);
            }
        });

        for room in rooms {
            let path = DocPath::room(&room.room_id);
            let callback = {
                let view = view.clone();
                let key = room.key.clone();
                let me = me.clone();
                Box::new(move |doc: Option<Document>| {
                    apply_snapshot(&view, &key, &me, doc.as_ref());
                })
            };

            match store.subscribe_document(&path, callback).await {
                Ok(sub) => {
                    registry.register(sub.clone());
                    self.active.push(sub);
                },
                Err(e) => tracing::warn!("unread subscription for {} failed: {}", room.room_id, e),
            }
        }
        tracing::debug!("tracking unread counts for {} rooms", self.active.len());
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

/// Write the user's counter from a room snapshot.
///
/// A snapshot without a participant map, or without this user's entry,
/// leaves the previous value in place.
fn apply_snapshot(view: &SharedView, key: &str, me: &UserId, doc: Option<&Document>) {
    let Some(count) = doc.and_then(Document::participants).and_then(|p| p.get(me).copied()) else {
        return;
    };
    view.update(|v| {
        v.unread_counts.insert(key.to_string(), count);
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Map, Value, json};

    use super::*;
    use crate::view::NoopObserver;

    fn room_doc(value: Value) -> Document {
        Document::new("room", value.as_object().cloned().unwrap_or_else(Map::new))
    }

    #[test]
    fn snapshot_writes_own_counter() {
        let view = SharedView::new(Arc::new(NoopObserver));
        let me = UserId::new("a");

        let doc = room_doc(json!({ "participants": { "a": 4, "b": 1 } }));
        apply_snapshot(&view, "k", &me, Some(&doc));
        assert_eq!(view.snapshot().unread("k"), 4);
    }

    #[test]
    fn snapshot_without_participants_keeps_previous() {
        let view = SharedView::new(Arc::new(NoopObserver));
        let me = UserId::new("a");
        view.update(|v| {
            v.unread_counts.insert("k".to_string(), 2);
        });

        apply_snapshot(&view, "k", &me, Some(&room_doc(json!({ "type": "group" }))));
        apply_snapshot(&view, "k", &me, None);
        apply_snapshot(&view, "k", &me, Some(&room_doc(json!({ "participants": { "b": 7 } }))));

        assert_eq!(view.snapshot().unread("k"), 2);
    }
}
