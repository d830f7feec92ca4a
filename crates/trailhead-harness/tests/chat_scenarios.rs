//! End-to-end chat scenarios against the in-memory store.
//!
//! Each test drives real `ChatContext`s and room sessions; only the store,
//! backend and push gateway are in-process stand-ins.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use serde_json::json;
use trailhead_client::{
    AuthUser, ChatContext, ChatRoomSession, ChatTarget, ClientConfig, RoomTarget,
    SubscriptionRegistry,
};
use trailhead_core::{
    ChatPartner, DocPath, DocumentStore, FieldValue, Fields, GroupMembership, Profile, SharedStore,
    UserId, direct_room_id, group_room_id, participant_field,
};
use trailhead_harness::{
    BackendCall, ChatSnapshot, FakeBackend, InvariantRegistry, MemoryStore, RecordingStore,
    WriteKind,
};

fn user(id: &str) -> Profile {
    Profile::new(id, UserId::new(format!("uid-{id}")), id.to_uppercase())
}

fn auth(profile: &Profile) -> AuthUser {
    AuthUser { profile: profile.clone(), token: format!("token-{}", profile.id) }
}

/// A has no rooms, opens a chat with B, sends "hi".
#[tokio::test]
async fn new_direct_chat() {
    let memory = MemoryStore::new();
    let backend = FakeBackend::new();
    let a = user("a");
    let b = user("b");
    let room_id = direct_room_id(&a.auth_id, &b.auth_id);

    let mut ctx =
        ChatContext::new(memory.shared(), ClientConfig::default()).with_backend(backend.clone());
    ctx.set_auth(Some(auth(&a))).await;
    assert!(ctx.view().rooms.is_empty());

    let mut session =
        ctx.open_room(&RoomTarget::Direct { partner: b.auth_id.clone() }).await.unwrap();
    assert_eq!(session.room_id(), &room_id);

    let room = memory.document(&DocPath::room(&room_id)).unwrap();
    assert_eq!(room.get("type"), Some(&json!("user")));
    assert_eq!(room.get("participants"), Some(&json!({ "uid-a": 0, "uid-b": 0 })));

    session.send_message("hi").await.unwrap().unwrap();
    let counters = memory.participants(&room_id).unwrap();
    assert_eq!(counters[&b.auth_id], 1);
    assert_eq!(counters[&a.auth_id], 0);

    // The chat is recorded with the backend; the refreshed profile lists it.
    ctx.add_chat(&ChatTarget::User(b.id.clone())).await.unwrap();
    assert_eq!(backend.calls(), [BackendCall::Open(ChatTarget::User("b".to_string()))]);
    assert_eq!(backend.tokens(), ["token-a"]);

    let mut refreshed = a.clone();
    refreshed.chatrooms_with.push(ChatPartner { id: b.id.clone(), auth_id: b.auth_id.clone() });
    ctx.set_auth(Some(auth(&refreshed))).await;

    let view = ctx.view();
    let last = view.last_message("b").unwrap();
    assert_eq!(last.sender_id, a.auth_id);
    assert_eq!(last.text, "hi");
    assert_eq!(view.unread("b"), 0);
    InvariantRegistry::strict().assert_all(&ChatSnapshot::from_context(&ctx), "after new chat");
}

/// 45 stored messages, opened fresh, then a 46th arrives.
#[tokio::test]
async fn pagination_load() {
    let memory = MemoryStore::new();
    let a = user("a");
    let b = user("b");
    let room_id = direct_room_id(&a.auth_id, &b.auth_id);
    memory.seed_messages(&room_id, &b.auth_id, 45);

    let session = ChatRoomSession::open(
        memory.shared(),
        Arc::new(SubscriptionRegistry::new()),
        ClientConfig::default(),
        &a,
        &RoomTarget::Direct { partner: b.auth_id.clone() },
    )
    .await;

    let initial = session.messages();
    assert_eq!(initial.len(), 20);
    assert_eq!(initial.first().unwrap().text, "message 26");
    assert_eq!(initial.last().unwrap().text, "message 45");
    assert!(initial.windows(2).all(|w| w[0].created_at < w[1].created_at));

    let newest = memory.seed_messages(&room_id, &b.auth_id, 1).pop().unwrap();

    let messages = session.messages();
    assert_eq!(messages.len(), 21);
    assert_eq!(messages.last().unwrap().id, newest);
    assert_eq!(&messages[..20], &initial[..]);
}

/// Removing a group room updates the roster before the remote write lands.
#[tokio::test]
async fn group_room_removal() {
    let memory = MemoryStore::new();
    let recording = RecordingStore::new(memory.clone());
    let store: SharedStore = Arc::new(recording.clone());
    let backend = FakeBackend::new();

    let mut me = user("me");
    me.chatrooms_with.push(ChatPartner { id: "p".to_string(), auth_id: UserId::new("uid-p") });
    me.chatrooms_groups
        .push(GroupMembership { id: "g1".to_string(), members: vec![me.auth_id.clone()] });
    let group_path = DocPath::room(&group_room_id("g1"));
    memory
        .set_document(
            &group_path,
            Fields::new()
                .set("type", "group")
                .set(participant_field(&me.auth_id), 2)
                .set(participant_field(&UserId::new("uid-x")), 0),
        )
        .await
        .unwrap();

    let mut ctx = ChatContext::new(store, ClientConfig::default()).with_backend(backend.clone());
    ctx.set_auth(Some(auth(&me))).await;
    assert_eq!(ctx.view().rooms.len(), 2);
    assert_eq!(ctx.view().unread("g1"), 2);

    recording.hold_updates();
    let view = ctx.view_handle();
    let observe_in_flight = async {
        while recording.calls_to(WriteKind::Update, &group_path).is_empty() {
            tokio::task::yield_now().await;
        }
        let snapshot = view.snapshot();
        assert!(snapshot.rooms.iter().all(|room| room.key != "g1"));
        assert!(!snapshot.unread_counts.contains_key("g1"));
        // Remote entry still present while the update is held.
        assert!(memory.participants(&group_room_id("g1")).unwrap().contains_key(&me.auth_id));
        recording.release_updates();
    };
    let (removed, ()) = tokio::join!(ctx.remove_room("g1"), observe_in_flight);
    removed.unwrap();

    let update = &recording.calls_to(WriteKind::Update, &group_path)[0];
    assert_eq!(
        update.fields.entries(),
        [(participant_field(&me.auth_id), FieldValue::Delete)].as_slice()
    );
    let counters = memory.participants(&group_room_id("g1")).unwrap();
    assert!(!counters.contains_key(&me.auth_id));
    assert!(counters.contains_key(&UserId::new("uid-x")));

    assert_eq!(backend.calls(), [BackendCall::Close(ChatTarget::Group("g1".to_string()))]);
    assert!(ctx.auth().unwrap().profile.chatrooms_groups.is_empty());
    assert!(ctx.roster().is_removal_pending("g1"));
    InvariantRegistry::strict().assert_all(&ChatSnapshot::from_context(&ctx), "after removal");
}

#[tokio::test]
async fn removed_room_stays_gone_until_backend_confirms() {
    let memory = MemoryStore::new();
    let mut me = user("me");
    me.chatrooms_groups.push(GroupMembership { id: "g1".to_string(), members: Vec::new() });
    me.chatrooms_groups.push(GroupMembership { id: "g2".to_string(), members: Vec::new() });
    let stale = me.clone();

    let mut ctx = ChatContext::new(memory.shared(), ClientConfig::default());
    ctx.set_auth(Some(auth(&me))).await;
    ctx.remove_room("g1").await.unwrap();

    // A profile fetched before the backend processed the removal.
    ctx.set_auth(Some(auth(&stale))).await;
    let keys: Vec<String> = ctx.view().rooms.iter().map(|r| r.key.clone()).collect();
    assert_eq!(keys, ["g2"]);

    // Confirmed: the backend no longer lists it.
    me.chatrooms_groups.retain(|g| g.id != "g1");
    ctx.set_auth(Some(auth(&me))).await;
    assert!(!ctx.roster().is_removal_pending("g1"));

    // Re-joined later.
    ctx.set_auth(Some(auth(&stale))).await;
    let keys: Vec<String> = ctx.view().rooms.iter().map(|r| r.key.clone()).collect();
    assert_eq!(keys, ["g2", "g1"]);
    InvariantRegistry::strict().assert_all(&ChatSnapshot::from_context(&ctx), "after re-join");
}

#[tokio::test]
async fn rooms_reorder_by_latest_message() {
    let memory = MemoryStore::new();
    let mut me = user("me");
    for partner in ["p1", "p2"] {
        me.chatrooms_with
            .push(ChatPartner {
                id: partner.to_string(),
                auth_id: UserId::new(format!("uid-{partner}")),
            });
    }

    let mut ctx = ChatContext::new(memory.shared(), ClientConfig::default());
    ctx.set_auth(Some(auth(&me))).await;

    memory.seed_messages(&direct_room_id(&me.auth_id, &UserId::new("uid-p1")), &me.auth_id, 1);
    memory.seed_messages(&direct_room_id(&me.auth_id, &UserId::new("uid-p2")), &me.auth_id, 1);

    let view = ctx.view();
    let order: Vec<&str> = view.rooms_by_recency().iter().map(|r| r.key.as_str()).collect();
    assert_eq!(order, ["p2", "p1"]);
}
