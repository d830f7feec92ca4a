//! Room session behavior: history paging, sending, closing, push.

#![allow(clippy::unwrap_used)]

use std::{
    collections::HashSet,
    pin::pin,
    sync::Arc,
    task::{Context, Poll, Waker},
};

use async_trait::async_trait;
use trailhead_client::{
    AuthUser, ChatContext, ChatError, ChatRoomSession, ClientConfig, RoomTarget, SessionState,
    SubscriptionRegistry,
};
use trailhead_core::{
    ChatPartner, DocPath, Document, DocumentCallback, DocumentStore, Fields, Profile, Query,
    QueryCallback, StoreError, Subscription, UserId, direct_room_id, participant_field,
};
use trailhead_harness::{ChaoticStore, MemoryStore, RecordingPush};

fn user(id: &str) -> Profile {
    Profile::new(id, UserId::new(format!("uid-{id}")), id.to_uppercase())
}

async fn open(store: &MemoryStore, me: &Profile, partner: &Profile) -> ChatRoomSession {
    ChatRoomSession::open(
        store.shared(),
        Arc::new(SubscriptionRegistry::new()),
        ClientConfig::default(),
        me,
        &RoomTarget::Direct { partner: partner.auth_id.clone() },
    )
    .await
}

#[tokio::test]
async fn load_older_fills_history_without_duplicates() {
    let memory = MemoryStore::new();
    let (a, b) = (user("a"), user("b"));
    let room_id = direct_room_id(&a.auth_id, &b.auth_id);
    memory.seed_messages(&room_id, &b.auth_id, 45);

    let mut session = open(&memory, &a, &b).await;
    assert!(session.has_more_history());

    assert_eq!(session.load_older().await.unwrap(), 20);
    assert_eq!(session.messages().first().unwrap().text, "message 6");
    assert!(session.has_more_history());

    assert_eq!(session.load_older().await.unwrap(), 5);
    assert!(!session.has_more_history());
    assert_eq!(session.load_older().await.unwrap(), 0);

    let messages = session.messages();
    assert_eq!(messages.len(), 45);
    let ids: HashSet<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids.len(), 45);
    assert_eq!(messages, memory.messages(&room_id));
}

#[tokio::test]
async fn short_history_is_exhausted_on_open() {
    let memory = MemoryStore::new();
    let (a, b) = (user("a"), user("b"));
    memory.seed_messages(&direct_room_id(&a.auth_id, &b.auth_id), &a.auth_id, 3);

    let mut session = open(&memory, &a, &b).await;
    assert_eq!(session.messages().len(), 3);
    assert!(!session.has_more_history());
    assert_eq!(session.load_older().await.unwrap(), 0);
}

#[tokio::test]
async fn sent_message_is_confirmed_by_tail() {
    let memory = MemoryStore::new();
    let (a, b) = (user("a"), user("b"));
    let mut session = open(&memory, &a, &b).await;
    assert_eq!(session.state(), SessionState::Live);

    let id = session.send_message("  on the ridge  ").await.unwrap().unwrap();

    assert!(session.pending().is_empty());
    assert_eq!(session.state(), SessionState::Live);
    let messages = session.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, id);
    assert_eq!(messages[0].text, "on the ridge");
    assert_eq!(messages[0].sender_name, "A");
}

#[tokio::test]
async fn blank_message_is_ignored() {
    let memory = MemoryStore::new();
    let (a, b) = (user("a"), user("b"));
    let room_id = direct_room_id(&a.auth_id, &b.auth_id);
    let mut session = open(&memory, &a, &b).await;

    assert_eq!(session.send_message("   \n").await.unwrap(), None);
    assert!(memory.messages(&room_id).is_empty());
    assert_eq!(memory.participants(&room_id).unwrap()[&b.auth_id], 0);
}

#[tokio::test]
async fn failed_send_is_returned_and_not_left_pending() {
    let memory = MemoryStore::new();
    let (a, b) = (user("a"), user("b"));
    // Create the room first so only the send hits the failing store.
    drop(open(&memory, &a, &b).await);

    let failing = ChaoticStore::new(memory.clone(), 1.0);
    let mut session = ChatRoomSession::open(
        Arc::new(failing),
        Arc::new(SubscriptionRegistry::new()),
        ClientConfig::default(),
        &a,
        &RoomTarget::Direct { partner: b.auth_id.clone() },
    )
    .await;

    let err = session.send_message("hello").await.unwrap_err();
    assert!(matches!(err, ChatError::Store(e) if e.is_transient()));
    assert!(session.pending().is_empty());
    assert_eq!(session.state(), SessionState::Live);
}

#[tokio::test]
async fn opening_resets_own_counter() {
    let memory = MemoryStore::new();
    let (a, b) = (user("a"), user("b"));
    let room_id = direct_room_id(&a.auth_id, &b.auth_id);
    memory
        .set_document(
            &DocPath::room(&room_id),
            Fields::new()
                .set(participant_field(&a.auth_id), 7)
                .set(participant_field(&b.auth_id), 1),
        )
        .await
        .unwrap();

    let _session = open(&memory, &a, &b).await;
    let counters = memory.participants(&room_id).unwrap();
    assert_eq!(counters[&a.auth_id], 0);
    assert_eq!(counters[&b.auth_id], 1);
}

#[tokio::test]
async fn closed_session_stops_listening_and_rejects_sends() {
    let memory = MemoryStore::new();
    let (a, b) = (user("a"), user("b"));
    let room_id = direct_room_id(&a.auth_id, &b.auth_id);
    let mut session = open(&memory, &a, &b).await;
    assert_eq!(memory.listener_count(), 1);

    session.close();
    session.close();
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(memory.listener_count(), 0);

    memory.seed_messages(&room_id, &b.auth_id, 2);
    assert!(session.messages().is_empty());
    assert!(matches!(session.send_message("late").await, Err(ChatError::SessionClosed(_))));
}

#[tokio::test]
async fn dropping_session_cancels_tail() {
    let memory = MemoryStore::new();
    let (a, b) = (user("a"), user("b"));
    let session = open(&memory, &a, &b).await;
    assert_eq!(memory.listener_count(), 1);
    drop(session);
    assert_eq!(memory.listener_count(), 0);
}

#[tokio::test]
async fn send_notifies_recipients() {
    let memory = MemoryStore::new();
    let push = RecordingPush::new();
    let (a, b) = (user("a"), user("b"));

    let mut ctx =
        ChatContext::new(memory.shared(), ClientConfig::default()).with_push(push.clone());
    ctx.set_auth(Some(AuthUser { profile: a.clone(), token: "t".to_string() })).await;
    let mut session = ctx
        .open_room_notifying(
            &RoomTarget::Direct { partner: b.auth_id.clone() },
            vec!["device-b".to_string()],
        )
        .await
        .unwrap();

    let id = session.send_message("summit at noon").await.unwrap().unwrap();
    for _ in 0..10 {
        if !push.sent().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }

    let sent = push.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].tokens, ["device-b"]);
    assert_eq!(sent[0].title, "A");
    assert_eq!(sent[0].body, "summit at noon");
    assert_eq!(sent[0].data["messageId"], id.as_str());
}

#[tokio::test]
async fn open_room_requires_sign_in() {
    let ctx = ChatContext::new(MemoryStore::new().shared(), ClientConfig::default());
    let target = RoomTarget::Direct { partner: UserId::new("uid-b") };
    assert!(matches!(ctx.open_room(&target).await, Err(ChatError::NotAuthenticated)));
}

#[tokio::test]
async fn saturated_counter_stays_saturated() {
    let memory = MemoryStore::new();
    let (a, b) = (user("a"), user("b"));
    let room_id = direct_room_id(&a.auth_id, &b.auth_id);
    memory
        .set_document(
            &DocPath::room(&room_id),
            Fields::new()
                .set(participant_field(&a.auth_id), 0)
                .set(participant_field(&b.auth_id), u64::MAX),
        )
        .await
        .unwrap();

    let mut session = open(&memory, &a, &b).await;
    session.send_message("still here").await.unwrap().unwrap();

    assert_eq!(memory.participants(&room_id).unwrap()[&b.auth_id], u64::MAX);
}

#[tokio::test]
async fn clear_unread_resets_counter_and_view() {
    let memory = MemoryStore::new();
    let (mut a, b) = (user("a"), user("b"));
    a.chatrooms_with.push(ChatPartner { id: b.id.clone(), auth_id: b.auth_id.clone() });
    let room_id = direct_room_id(&a.auth_id, &b.auth_id);

    let mut ctx = ChatContext::new(memory.shared(), ClientConfig::default());
    ctx.set_auth(Some(AuthUser { profile: a.clone(), token: "t".to_string() })).await;
    let session = ctx.open_room(&RoomTarget::Direct { partner: b.auth_id.clone() }).await.unwrap();

    let mut from_b = open(&memory, &b, &a).await;
    for text in ["trail", "is", "muddy"] {
        from_b.send_message(text).await.unwrap();
    }
    assert_eq!(memory.participants(&room_id).unwrap()[&a.auth_id], 3);
    assert_eq!(ctx.view().unread("b"), 3);

    session.clear_unread().await;
    assert_eq!(memory.participants(&room_id).unwrap()[&a.auth_id], 0);
    assert_eq!(ctx.view().unread("b"), 0);
}

#[tokio::test]
async fn listener_teardown_closes_open_sessions() {
    let memory = MemoryStore::new();
    let (a, b) = (user("a"), user("b"));
    let room_id = direct_room_id(&a.auth_id, &b.auth_id);
    let mut ctx = ChatContext::new(memory.shared(), ClientConfig::default());
    ctx.set_auth(Some(AuthUser { profile: a.clone(), token: "t".to_string() })).await;
    let mut session =
        ctx.open_room(&RoomTarget::Direct { partner: b.auth_id.clone() }).await.unwrap();

    ctx.clear_all_listeners();

    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(session.send_message("hi").await, Err(ChatError::SessionClosed(_))));
    assert!(session.pending().is_empty());
    assert!(memory.messages(&room_id).is_empty());
}

/// Memory store whose live queries cannot be set up.
struct NoLiveQueries(MemoryStore);

#[async_trait]
impl DocumentStore for NoLiveQueries {
    async fn get_document(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        self.0.get_document(path).await
    }

    async fn set_document(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        self.0.set_document(path, fields).await
    }

    async fn update_document(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        self.0.update_document(path, fields).await
    }

    async fn add_document(
        &self,
        collection: &DocPath,
        fields: Fields,
    ) -> Result<String, StoreError> {
        self.0.add_document(collection, fields).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.0.query(query).await
    }

    async fn subscribe_document(
        &self,
        path: &DocPath,
        callback: DocumentCallback,
    ) -> Result<Subscription, StoreError> {
        self.0.subscribe_document(path, callback).await
    }

    async fn subscribe_query(
        &self,
        _query: Query,
        _callback: QueryCallback,
    ) -> Result<Subscription, StoreError> {
        Err(StoreError::Rejected("live queries disabled".to_string()))
    }
}

#[tokio::test]
async fn send_without_tail_leaves_nothing_pending() {
    let memory = MemoryStore::new();
    let (a, b) = (user("a"), user("b"));
    let mut session = ChatRoomSession::open(
        Arc::new(NoLiveQueries(memory.clone())),
        Arc::new(SubscriptionRegistry::new()),
        ClientConfig::default(),
        &a,
        &RoomTarget::Direct { partner: b.auth_id.clone() },
    )
    .await;

    for text in ["one", "two"] {
        session.send_message(text).await.unwrap().unwrap();
    }

    assert!(session.pending().is_empty());
    assert_eq!(session.state(), SessionState::Live);
    assert_eq!(memory.messages(&direct_room_id(&a.auth_id, &b.auth_id)).len(), 2);
}

/// Drive `future` with a no-op waker and no runtime. Every in-memory store
/// call completes on first poll.
fn poll_to_completion<F: std::future::Future>(future: F) -> F::Output {
    let mut future = pin!(future);
    let mut cx = Context::from_waker(Waker::noop());
    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
            return output;
        }
    }
}

#[test]
fn send_outside_tokio_stores_message_and_skips_push() {
    let memory = MemoryStore::new();
    let push = RecordingPush::new();
    let (a, b) = (user("a"), user("b"));

    let id = poll_to_completion(async {
        let mut ctx =
            ChatContext::new(memory.shared(), ClientConfig::default()).with_push(push.clone());
        ctx.set_auth(Some(AuthUser { profile: a.clone(), token: "t".to_string() })).await;
        let mut session = ctx
            .open_room_notifying(
                &RoomTarget::Direct { partner: b.auth_id.clone() },
                vec!["device-b".to_string()],
            )
            .await
            .unwrap();
        session.send_message("no runtime").await.unwrap().unwrap()
    });

    let stored = memory.messages(&direct_room_id(&a.auth_id, &b.auth_id));
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, id);
    assert!(push.sent().is_empty());
}
