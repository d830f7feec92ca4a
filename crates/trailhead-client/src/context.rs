//! Session-scoped chat context.
//!
//! [`ChatContext`] owns everything that lives for one signed-in session: the
//! subscription registry, the room roster, both trackers and the view they
//! write to. It is created per session and passed explicitly to whoever
//! needs it; tests build as many isolated contexts as they like.
//!
//! # Invariants
//!
//! - The view's room list equals the roster after every operation.
//! - Tracker subscriptions cover exactly the roster's rooms.
//! - With no authenticated user, the roster and view are empty and no
//!   tracker subscription is live.

use std::sync::Arc;

use async_trait::async_trait;
use trailhead_core::{DocPath, Fields, Profile, Room, RoomKind, SharedStore, participant_field};

use crate::{
    ChatBackend, ChatError, ChatRoomSession, ChatTarget, ChatView, ClientConfig,
    LastMessageTracker, NoopObserver, PushDispatcher, RoomRoster, RoomTarget,
    SubscriptionRegistry, UnreadTracker, ViewObserver, view::SharedView,
};

/// The signed-in user.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    /// Profile as last fetched from the backend.
    pub profile: Profile,
    /// Bearer token for backend calls.
    pub token: String,
}

/// Host-side session teardown steps run by [`ChatContext::logout`].
#[async_trait]
pub trait SessionHooks: Send + Sync {
    /// Sign out of the authentication provider.
    async fn sign_out(&self) -> Result<(), ChatError> {
        Ok(())
    }

    /// Wipe locally persisted session data.
    async fn clear_local_storage(&self) -> Result<(), ChatError> {
        Ok(())
    }
}

/// Chat state for one signed-in session.
pub struct ChatContext {
    store: SharedStore,
    config: ClientConfig,
    registry: Arc<SubscriptionRegistry>,
    view: SharedView,
    roster: RoomRoster,
    unread: UnreadTracker,
    last_messages: LastMessageTracker,
    auth: Option<AuthUser>,
    backend: Option<Arc<dyn ChatBackend>>,
    hooks: Option<Arc<dyn SessionHooks>>,
    push: Option<Arc<dyn PushDispatcher>>,
}

impl ChatContext {
    /// Signed-out context over `store`.
    pub fn new(store: SharedStore, config: ClientConfig) -> Self {
        Self {
            store,
            config,
            registry: Arc::new(SubscriptionRegistry::new()),
            view: SharedView::new(Arc::new(NoopObserver)),
            roster: RoomRoster::new(),
            unread: UnreadTracker::new(),
            last_messages: LastMessageTracker::new(),
            auth: None,
            backend: None,
            hooks: None,
            push: None,
        }
    }

    /// Use `backend` for chat bookkeeping and push-token cleanup.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Run `hooks` on logout.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn SessionHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Report view changes to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ViewObserver>) -> Self {
        self.view = SharedView::new(observer);
        self
    }

    /// Dispatch push notifications through `push`.
    #[must_use]
    pub fn with_push(mut self, push: Arc<dyn PushDispatcher>) -> Self {
        self.push = Some(push);
        self
    }

    /// Apply a change of authenticated user or a refreshed profile.
    ///
    /// `None`, or a different user than before, tears the session down. A
    /// profile for the current user is merged into the roster; trackers are
    /// restarted only when the roster changed.
    pub async fn set_auth(&mut self, auth: Option<AuthUser>) {
        let Some(auth) = auth else {
            if self.auth.take().is_some() {
                tracing::info!("signed out, tearing down chat session");
            }
            self.clear_all_listeners();
            return;
        };

        let switched =
            self.auth.as_ref().is_some_and(|cur| cur.profile.auth_id != auth.profile.auth_id);
        if switched {
            tracing::info!("user changed, tearing down chat session");
            self.clear_all_listeners();
        }

        let changed = if self.roster.is_empty() {
            self.roster.initialize(&auth.profile)
        } else {
            self.roster.reconcile(&auth.profile)
        };
        self.auth = Some(auth);

        if changed {
            self.restart_trackers().await;
        }
    }

    async fn restart_trackers(&mut self) {
        let Some(auth) = &self.auth else {
            return;
        };
        let rooms = self.roster.rooms().to_vec();
        self.view.update(|v| {
            let tracked = |key: &String| rooms.iter().any(|room| &room.key == key);
            v.rooms.clone_from(&rooms);
            v.unread_counts.retain(|key, _| tracked(key));
            v.last_messages.retain(|key, _| tracked(key));
        });

        self.unread
            .start(&self.store, &auth.profile.auth_id, &rooms, &self.view, &self.registry)
            .await;
        self.last_messages.start(&self.store, &rooms, &self.view, &self.registry).await;
        tracing::debug!("tracking {} rooms", rooms.len());
    }

    /// Remove a room from the roster.
    ///
    /// The local roster and view change first. For group rooms the user's
    /// participant entry is then deleted remotely. Finally the backend is told
    /// the chat was closed. Remote failures are logged and never rolled back.
    pub async fn remove_room(&mut self, key: &str) -> Result<(), ChatError> {
        let auth = self.auth.as_mut().ok_or(ChatError::NotAuthenticated)?;
        let Some(room) = self.roster.remove(key) else {
            return Ok(());
        };
        if room.is_group() {
            auth.profile.chatrooms_groups.retain(|group| group.id != room.key);
        }
        let me = auth.profile.auth_id.clone();
        let token = auth.token.clone();

        self.restart_trackers().await;
        tracing::info!("removed room {}", room.key);

        if room.is_group() {
            let fields = Fields::new().delete(participant_field(&me));
            if let Err(e) = self.store.update_document(&DocPath::room(&room.room_id), fields).await
            {
                tracing::warn!("leaving room {} failed: {}", room.room_id, e);
            }
        }

        if let Some(backend) = &self.backend
            && let Err(e) = backend.close_chat(&token, &chat_target(&room)).await
        {
            tracing::warn!("closing chat {} failed: {}", room.key, e);
        }
        Ok(())
    }

    /// Cancel every live subscription and clear the roster and view.
    ///
    /// Safe to call any number of times. The authenticated user is kept.
    pub fn clear_all_listeners(&mut self) {
        let cancelled = self.registry.clear_all();
        self.unread.stop();
        self.last_messages.stop();
        self.roster.clear();
        self.view.clear();
        tracing::debug!("cleared chat listeners ({} live)", cancelled);
    }

    /// Open a room session as the signed-in user.
    pub async fn open_room(&self, target: &RoomTarget) -> Result<ChatRoomSession, ChatError> {
        let auth = self.auth.as_ref().ok_or(ChatError::NotAuthenticated)?;
        Ok(ChatRoomSession::open(
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            self.config.clone(),
            &auth.profile,
            target,
        )
        .await)
    }

    /// Open a room session that notifies `recipient_tokens` of every sent
    /// message. Without a push dispatcher this is [`Self::open_room`].
    ///
    /// Notifications are spawned on the Tokio runtime the send runs on and
    /// skipped when there is none.
    pub async fn open_room_notifying(
        &self,
        target: &RoomTarget,
        recipient_tokens: Vec<String>,
    ) -> Result<ChatRoomSession, ChatError> {
        let session = self.open_room(target).await?;
        Ok(match &self.push {
            Some(push) => session.with_push(Arc::clone(push), recipient_tokens),
            None => session,
        })
    }

    /// Record a newly opened chat with the backend.
    ///
    /// The room shows up in the roster once a refreshed profile lists it.
    pub async fn add_chat(&self, target: &ChatTarget) -> Result<(), ChatError> {
        let auth = self.auth.as_ref().ok_or(ChatError::NotAuthenticated)?;
        let Some(backend) = &self.backend else {
            tracing::debug!("no backend configured, not recording chat");
            return Ok(());
        };
        backend.open_chat(&auth.token, target).await?;
        Ok(())
    }

    /// Mute or unmute push notifications for a chat.
    pub async fn set_muted(&self, target: &ChatTarget, muted: bool) -> Result<(), ChatError> {
        let auth = self.auth.as_ref().ok_or(ChatError::NotAuthenticated)?;
        let Some(backend) = &self.backend else {
            tracing::debug!("no backend configured, not muting chat");
            return Ok(());
        };
        backend.set_muted(&auth.token, target, muted).await?;
        Ok(())
    }

    /// End the session.
    ///
    /// Clears all listeners, unregisters the device push token, then signs
    /// out and clears local storage through the hooks. Each remote step is
    /// best effort; sign-out always runs.
    pub async fn logout(&mut self) {
        self.clear_all_listeners();

        if let Some(auth) = self.auth.take()
            && let (Some(backend), Some(device)) = (&self.backend, &auth.profile.push_token)
            && let Err(e) = backend.unregister_push_token(&auth.token, device).await
        {
            tracing::warn!("unregistering push token failed: {}", e);
        }

        if let Some(hooks) = &self.hooks {
            if let Err(e) = hooks.sign_out().await {
                tracing::warn!("sign-out failed: {}", e);
            }
            if let Err(e) = hooks.clear_local_storage().await {
                tracing::warn!("clearing local storage failed: {}", e);
            }
        }
        tracing::info!("logged out");
    }

    /// Copy of the current view.
    pub fn view(&self) -> ChatView {
        self.view.snapshot()
    }

    /// Live handle to the view, usable while the context is borrowed.
    pub fn view_handle(&self) -> SharedView {
        self.view.clone()
    }

    /// Tracked rooms.
    pub fn roster(&self) -> &RoomRoster {
        &self.roster
    }

    /// The signed-in user, if any.
    pub fn auth(&self) -> Option<&AuthUser> {
        self.auth.as_ref()
    }

    /// Subscription ledger of this session.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Live tracker subscriptions (unread plus last message).
    pub fn tracker_subscriptions(&self) -> usize {
        self.unread.active_count() + self.last_messages.active_count()
    }
}

impl Drop for ChatContext {
    fn drop(&mut self) {
        self.registry.clear_all();
    }
}

fn chat_target(room: &Room) -> ChatTarget {
    match room.kind {
        RoomKind::User => ChatTarget::User(room.key.clone()),
        RoomKind::Group => ChatTarget::Group(room.key.clone()),
    }
}
