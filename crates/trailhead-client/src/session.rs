//! Chat room session.
//!
//! A [`ChatRoomSession`] drives one open room: it makes sure the room
//! document exists, loads the newest page of messages, follows new messages
//! through a live tail query, sends messages and keeps the signed-in user's
//! unread counter at zero while the room is open.
//!
//! # Timeline
//!
//! The displayed list is assembled from three segments, deduplicated by
//! message id and ordered by `(created_at, id)`:
//!
//! - older pages fetched with [`ChatRoomSession::load_older`]
//! - the initial page, read once on open
//! - the tail: everything after the initial page, replaced wholesale by
//!   every tail snapshot
//!
//! Sent messages are shown as [`PendingMessage`]s until a tail snapshot
//! contains their store id.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use serde_json::json;
use trailhead_core::{
    Cursor, DocPath, Document, Fields, Message, NewMessage, Profile, Query, RoomId, RoomKind,
    SharedStore, Subscription, UserId, direct_room_id, group_room_id, lock, participant_field,
};

use crate::{
    ChatError, ClientConfig, PushDispatcher, SubscriptionRegistry, UnreadFanout,
    push::{PushNotification, dispatch_detached},
};

/// Room a session opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomTarget {
    /// Direct room with a partner.
    Direct {
        /// Partner's remote-auth id.
        partner: UserId,
    },
    /// Group room.
    Group {
        /// Group record id.
        group_id: String,
        /// Remote-auth ids of the known members.
        members: Vec<UserId>,
    },
}

impl RoomTarget {
    /// Remote room id as seen by `me`.
    pub fn room_id(&self, me: &UserId) -> RoomId {
        match self {
            Self::Direct { partner } => direct_room_id(me, partner),
            Self::Group { group_id, .. } => group_room_id(group_id),
        }
    }

    /// Kind of room.
    pub fn kind(&self) -> RoomKind {
        match self {
            Self::Direct { .. } => RoomKind::User,
            Self::Group { .. } => RoomKind::Group,
        }
    }

    /// Everyone who gets a counter when the room is created, `me` included.
    fn members(&self, me: &UserId) -> Vec<UserId> {
        let mut members = match self {
            Self::Direct { partner } => vec![partner.clone()],
            Self::Group { members, .. } => members.clone(),
        };
        if !members.contains(me) {
            members.push(me.clone());
        }
        members
    }
}

/// Lifecycle of a room session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Room setup and initial page in progress.
    LoadingInitial,
    /// Following new messages.
    Live,
    /// A send is in flight.
    Sending,
    /// Closed; no further updates.
    Closed,
}

/// A sent message not yet seen in a tail snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    /// Session-local id.
    pub local_id: u64,
    /// Store id once the write returned.
    pub remote_id: Option<String>,
    /// Body as sent.
    pub text: String,
}

#[derive(Debug)]
struct Timeline {
    state: SessionState,
    older: Vec<Message>,
    initial: Vec<Message>,
    tail: Vec<Message>,
    pending: Vec<PendingMessage>,
    history_exhausted: bool,
}

impl Timeline {
    fn new() -> Self {
        Self {
            state: SessionState::LoadingInitial,
            older: Vec::new(),
            initial: Vec::new(),
            tail: Vec::new(),
            pending: Vec::new(),
            history_exhausted: false,
        }
    }

    fn messages(&self) -> Vec<Message> {
        let mut seen = HashSet::new();
        let mut messages: Vec<Message> = self
            .older
            .iter()
            .chain(&self.initial)
            .chain(&self.tail)
            .filter(|m| seen.insert(m.id.as_str()))
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        messages
    }

    fn oldest(&self) -> Option<Cursor> {
        self.older
            .iter()
            .chain(&self.initial)
            .chain(&self.tail)
            .min_by(|a, b| a.sort_key().cmp(&b.sort_key()))
            .map(Message::cursor)
    }

    fn newest_initial(&self) -> Option<Cursor> {
        self.initial.iter().max_by(|a, b| a.sort_key().cmp(&b.sort_key())).map(Message::cursor)
    }

    /// Replace the tail and confirm pending messages it contains.
    fn apply_tail(&mut self, messages: Vec<Message>) {
        if self.state == SessionState::Closed {
            return;
        }
        let delivered: HashSet<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        self.pending
            .retain(|p| p.remote_id.as_deref().is_none_or(|id| !delivered.contains(id)));
        self.tail = messages;
        if self.state == SessionState::LoadingInitial {
            self.state = SessionState::Live;
        }
    }

    /// Record the store id of a pending message. Drops it right away if a
    /// snapshot delivered it before the write returned.
    fn confirm(&mut self, local_id: u64, remote_id: &str) {
        let delivered = self.initial.iter().chain(&self.tail).any(|m| m.id == remote_id);
        if delivered {
            self.pending.retain(|p| p.local_id != local_id);
        } else if let Some(pending) = self.pending.iter_mut().find(|p| p.local_id == local_id) {
            pending.remote_id = Some(remote_id.to_string());
        }
    }

    fn abandon(&mut self, local_id: u64) {
        self.pending.retain(|p| p.local_id != local_id);
    }

    fn settle(&mut self) {
        if matches!(self.state, SessionState::Sending | SessionState::LoadingInitial) {
            self.state = SessionState::Live;
        }
    }

    /// Prepend a page of older messages. Returns how many were new.
    fn prepend_older(&mut self, mut page: Vec<Message>) -> usize {
        let known: HashSet<String> = self
            .older
            .iter()
            .chain(&self.initial)
            .chain(&self.tail)
            .map(|m| m.id.clone())
            .collect();
        page.retain(|m| !known.contains(&m.id));
        let added = page.len();
        page.append(&mut self.older);
        self.older = page;
        added
    }
}

struct PushTarget {
    dispatcher: Arc<dyn PushDispatcher>,
    tokens: Vec<String>,
}

/// Controller of one open room.
pub struct ChatRoomSession {
    store: SharedStore,
    registry: Arc<SubscriptionRegistry>,
    config: ClientConfig,
    me: UserId,
    my_name: String,
    room_id: RoomId,
    timeline: Arc<Mutex<Timeline>>,
    tail: Option<Subscription>,
    next_local_id: u64,
    push: Option<PushTarget>,
}

impl ChatRoomSession {
    /// Open `target` as `me`.
    ///
    /// Creates the room document if absent, resets the user's unread counter,
    /// loads the newest page and subscribes to the tail. Store failures along
    /// the way are logged; the session opens with whatever could be loaded.
    pub async fn open(
        store: SharedStore,
        registry: Arc<SubscriptionRegistry>,
        config: ClientConfig,
        me: &Profile,
        target: &RoomTarget,
    ) -> Self {
        let room_id = target.room_id(&me.auth_id);
        let mut session = Self {
            store,
            registry,
            config,
            me: me.auth_id.clone(),
            my_name: me.name.clone(),
            room_id,
            timeline: Arc::new(Mutex::new(Timeline::new())),
            tail: None,
            next_local_id: 0,
            push: None,
        };

        session.ensure_room(target).await;
        session.load_initial().await;
        session.subscribe_tail().await;
        lock(&session.timeline).settle();

        tracing::debug!("opened room {}", session.room_id);
        session
    }

    /// Send push notifications for every message to `tokens`.
    #[must_use]
    pub fn with_push(mut self, dispatcher: Arc<dyn PushDispatcher>, tokens: Vec<String>) -> Self {
        self.push = Some(PushTarget { dispatcher, tokens });
        self
    }

    async fn ensure_room(&self, target: &RoomTarget) {
        let path = DocPath::room(&self.room_id);
        match self.store.get_document(&path).await {
            Ok(Some(_)) => {},
            Ok(None) => {
                let fields = target
                    .members(&self.me)
                    .iter()
                    .fold(Fields::new().set("type", target.kind().as_str()), |fields, member| {
                        fields.set(participant_field(member), 0)
                    });
                match self.store.set_document(&path, fields).await {
                    Ok(()) => tracing::info!("created room {}", self.room_id),
                    Err(e) => tracing::warn!("creating room {} failed: {}", self.room_id, e),
                }
            },
            Err(e) => tracing::warn!("reading room {} failed: {}", self.room_id, e),
        }

        self.clear_unread().await;
    }

    async fn load_initial(&self) {
        let page_size = self.config.page_size;
        let query = Query::messages(&self.room_id).descending().limit(page_size);
        match self.store.query(&query).await {
            Ok(docs) => {
                let mut messages = decode_all(&docs);
                messages.reverse();
                let mut timeline = lock(&self.timeline);
                timeline.history_exhausted = docs.len() < page_size;
                timeline.initial = messages;
            },
            Err(e) => tracing::warn!("initial load of {} failed: {}", self.room_id, e),
        }
    }

    async fn subscribe_tail(&mut self) {
        let mut query = Query::messages(&self.room_id);
        if let Some(cursor) = lock(&self.timeline).newest_initial() {
            query = query.after(cursor);
        }

        let callback = {
            let timeline = Arc::clone(&self.timeline);
            Box::new(move |docs: Vec<Document>| {
                let messages = decode_all(&docs);
                lock(&timeline).apply_tail(messages);
            })
        };

        match self.store.subscribe_query(query, callback).await {
            Ok(sub) => {
                self.registry.register(sub.clone());
                self.tail = Some(sub);
            },
            Err(e) => tracing::warn!("tail subscription for {} failed: {}", self.room_id, e),
        }
    }

    /// Send `text` to the room.
    ///
    /// Returns the stored message id, or `None` when `text` is blank (nothing
    /// is sent). After the message is stored, every other participant's
    /// unread counter goes up by one. Store failures are returned; a session
    /// closed directly or through listener teardown returns
    /// [`ChatError::SessionClosed`].
    ///
    /// With push configured, the notification is spawned on the current
    /// Tokio runtime; outside one it is skipped and logged.
    pub async fn send_message(&mut self, text: &str) -> Result<Option<String>, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        if self.is_closed() {
            return Err(ChatError::SessionClosed(self.room_id.clone()));
        }

        let local_id = self.next_local_id;
        self.next_local_id += 1;
        {
            let mut timeline = lock(&self.timeline);
            timeline.pending.push(PendingMessage {
                local_id,
                remote_id: None,
                text: text.to_string(),
            });
            timeline.state = SessionState::Sending;
        }

        let message = NewMessage {
            sender_id: self.me.clone(),
            sender_name: self.my_name.clone(),
            text: text.to_string(),
        };
        let added =
            self.store.add_document(&DocPath::messages(&self.room_id), message.into_fields()).await;
        let id = match added {
            Ok(id) => {
                let mut timeline = lock(&self.timeline);
                if self.tail.is_some() {
                    timeline.confirm(local_id, &id);
                } else {
                    // No tail will ever deliver it.
                    timeline.abandon(local_id);
                }
                id
            },
            Err(e) => {
                let mut timeline = lock(&self.timeline);
                timeline.abandon(local_id);
                timeline.settle();
                return Err(e.into());
            },
        };

        let fanout = self.fan_out_unread().await;
        lock(&self.timeline).settle();
        fanout?;

        self.notify(text, &id);
        Ok(Some(id))
    }

    /// Bump every other participant's counter by one.
    async fn fan_out_unread(&self) -> Result<(), ChatError> {
        let path = DocPath::room(&self.room_id);
        let participants = self
            .store
            .get_document(&path)
            .await?
            .and_then(|doc| doc.participants())
            .unwrap_or_default();
        let others = participants.into_iter().filter(|(uid, _)| *uid != self.me);

        let fields = match self.config.unread_fanout {
            UnreadFanout::ReadModifyWrite => others
                .fold(Fields::new(), |f, (uid, count)| {
                    f.set(participant_field(&uid), count.saturating_add(1))
                }),
            UnreadFanout::AtomicIncrement => {
                others.fold(Fields::new(), |f, (uid, _)| f.increment(participant_field(&uid), 1))
            },
        };
        if fields.is_empty() {
            return Ok(());
        }
        self.store.update_document(&path, fields).await?;
        Ok(())
    }

    fn notify(&self, text: &str, message_id: &str) {
        let Some(push) = &self.push else {
            return;
        };
        dispatch_detached(Arc::clone(&push.dispatcher), PushNotification {
            tokens: push.tokens.clone(),
            title: self.my_name.clone(),
            body: text.to_string(),
            data: json!({ "roomId": self.room_id.as_str(), "messageId": message_id }),
        });
    }

    /// Reset the user's unread counter for this room. Failures are logged.
    pub async fn clear_unread(&self) {
        let fields = Fields::new().set(participant_field(&self.me), 0);
        if let Err(e) = self.store.update_document(&DocPath::room(&self.room_id), fields).await {
            tracing::warn!("clearing unread for {} failed: {}", self.room_id, e);
        }
    }

    /// Fetch the page before the oldest displayed message.
    ///
    /// Returns how many messages were added; 0 once history is exhausted.
    pub async fn load_older(&mut self) -> Result<usize, ChatError> {
        if self.is_closed() {
            return Err(ChatError::SessionClosed(self.room_id.clone()));
        }
        let oldest = {
            let timeline = lock(&self.timeline);
            if timeline.history_exhausted {
                return Ok(0);
            }
            timeline.oldest()
        };
        let Some(oldest) = oldest else {
            return Ok(0);
        };

        let page_size = self.config.page_size;
        let query = Query::messages(&self.room_id).before(oldest).descending().limit(page_size);
        let docs = self.store.query(&query).await?;
        let mut page = decode_all(&docs);
        page.reverse();

        let mut timeline = lock(&self.timeline);
        if docs.len() < page_size {
            timeline.history_exhausted = true;
        }
        Ok(timeline.prepend_older(page))
    }

    /// Stop following the room. Idempotent.
    pub fn close(&mut self) {
        if let Some(tail) = self.tail.take() {
            tail.cancel();
            tracing::debug!("closed room {}", self.room_id);
        }
        lock(&self.timeline).state = SessionState::Closed;
    }

    /// Remote room id.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Current lifecycle state.
    ///
    /// A session whose tail was cancelled from outside (listener teardown,
    /// sign-out) reads as [`SessionState::Closed`].
    pub fn state(&self) -> SessionState {
        let mut timeline = lock(&self.timeline);
        if self.tail.as_ref().is_some_and(Subscription::is_cancelled) {
            timeline.state = SessionState::Closed;
        }
        timeline.state
    }

    fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Stored messages in room order.
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.timeline).messages()
    }

    /// Sent messages not yet seen in a snapshot.
    pub fn pending(&self) -> Vec<PendingMessage> {
        lock(&self.timeline).pending.clone()
    }

    /// Whether older pages may exist.
    pub fn has_more_history(&self) -> bool {
        !lock(&self.timeline).history_exhausted
    }
}

impl Drop for ChatRoomSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn decode_all(docs: &[Document]) -> Vec<Message> {
    docs.iter()
        .filter_map(|doc| match Message::from_document(doc) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!("skipping message: {}", e);
                None
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use trailhead_core::Timestamp;

    use super::*;

    fn message(id: &str, at: u64) -> Message {
        Message {
            id: id.to_string(),
            sender_id: UserId::new("a"),
            sender_name: "Ann".to_string(),
            text: format!("text {id}"),
            created_at: Timestamp::from_millis(at),
        }
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn timeline_merges_segments_without_duplicates() {
        let mut timeline = Timeline::new();
        timeline.initial = vec![message("m2", 2), message("m3", 3)];
        timeline.apply_tail(vec![message("m3", 3), message("m4", 4)]);
        timeline.prepend_older(vec![message("m1", 1), message("m2", 2)]);

        let messages = timeline.messages();
        assert_eq!(ids(&messages), ["m1", "m2", "m3", "m4"]);
        assert_eq!(timeline.state, SessionState::Live);
    }

    #[test]
    fn timestamp_ties_break_on_id() {
        let mut timeline = Timeline::new();
        timeline.initial = vec![message("b", 5), message("a", 5)];
        assert_eq!(ids(&timeline.messages()), ["a", "b"]);
    }

    #[test]
    fn pending_confirmed_by_later_snapshot() {
        let mut timeline = Timeline::new();
        timeline.pending.push(PendingMessage { local_id: 0, remote_id: None, text: "hi".into() });

        timeline.confirm(0, "m9");
        assert_eq!(timeline.pending[0].remote_id.as_deref(), Some("m9"));

        timeline.apply_tail(vec![message("m1", 1)]);
        assert_eq!(timeline.pending.len(), 1);

        timeline.apply_tail(vec![message("m1", 1), message("m9", 2)]);
        assert!(timeline.pending.is_empty());
    }

    #[test]
    fn pending_dropped_when_snapshot_won_the_race() {
        let mut timeline = Timeline::new();
        timeline.pending.push(PendingMessage { local_id: 3, remote_id: None, text: "hi".into() });
        timeline.apply_tail(vec![message("m9", 2)]);

        timeline.confirm(3, "m9");
        assert!(timeline.pending.is_empty());
    }

    #[test]
    fn closed_timeline_ignores_snapshots() {
        let mut timeline = Timeline::new();
        timeline.state = SessionState::Closed;
        timeline.apply_tail(vec![message("m1", 1)]);

        assert!(timeline.tail.is_empty());
        assert_eq!(timeline.state, SessionState::Closed);
    }

    #[test]
    fn group_members_include_self_once() {
        let me = UserId::new("me");
        let target = RoomTarget::Group {
            group_id: "g".to_string(),
            members: vec![UserId::new("x"), me.clone()],
        };
        assert_eq!(target.members(&me), vec![UserId::new("x"), me.clone()]);

        let direct = RoomTarget::Direct { partner: UserId::new("p") };
        assert_eq!(direct.members(&me), vec![UserId::new("p"), me]);
    }
}
