//! In-process stand-ins for the REST backend, push gateway and host hooks.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use trailhead_client::{
    BackendError, ChatBackend, ChatError, ChatTarget, PushDispatcher, PushNotification,
    SessionHooks,
};
use trailhead_core::lock;

/// A call received by [`FakeBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `open_chat`
    Open(ChatTarget),
    /// `close_chat`
    Close(ChatTarget),
    /// `set_muted`
    Mute(ChatTarget, bool),
    /// `unregister_push_token` with the device token
    UnregisterPushToken(String),
}

/// Backend that records calls and the bearer token they carried.
#[derive(Debug, Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<(String, BackendCall)>>,
    failing: AtomicBool,
}

impl FakeBackend {
    /// Backend that accepts everything.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every later call fail with a 500.
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Calls so far, without tokens.
    pub fn calls(&self) -> Vec<BackendCall> {
        lock(&self.calls).iter().map(|(_, call)| call.clone()).collect()
    }

    /// Bearer tokens of the calls so far.
    pub fn tokens(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|(token, _)| token.clone()).collect()
    }

    fn record(&self, token: &str, call: BackendCall) -> Result<(), BackendError> {
        lock(&self.calls).push((token.to_string(), call));
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Http { status: 500, message: "backend down".to_string() });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn open_chat(&self, token: &str, target: &ChatTarget) -> Result<(), BackendError> {
        self.record(token, BackendCall::Open(target.clone()))
    }

    async fn close_chat(&self, token: &str, target: &ChatTarget) -> Result<(), BackendError> {
        self.record(token, BackendCall::Close(target.clone()))
    }

    async fn set_muted(
        &self,
        token: &str,
        target: &ChatTarget,
        muted: bool,
    ) -> Result<(), BackendError> {
        self.record(token, BackendCall::Mute(target.clone(), muted))
    }

    async fn unregister_push_token(
        &self,
        token: &str,
        device_token: &str,
    ) -> Result<(), BackendError> {
        self.record(token, BackendCall::UnregisterPushToken(device_token.to_string()))
    }
}

/// Session hooks that record the order they ran in.
#[derive(Debug, Default)]
pub struct FakeHooks {
    steps: Mutex<Vec<&'static str>>,
    fail_sign_out: AtomicBool,
}

impl FakeHooks {
    /// Hooks that succeed.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `sign_out` fail.
    pub fn fail_sign_out(&self) {
        self.fail_sign_out.store(true, Ordering::SeqCst);
    }

    /// Hook names in call order.
    pub fn steps(&self) -> Vec<&'static str> {
        lock(&self.steps).clone()
    }
}

#[async_trait]
impl SessionHooks for FakeHooks {
    async fn sign_out(&self) -> Result<(), ChatError> {
        lock(&self.steps).push("sign_out");
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(ChatError::Auth("provider unreachable".to_string()));
        }
        Ok(())
    }

    async fn clear_local_storage(&self) -> Result<(), ChatError> {
        lock(&self.steps).push("clear_local_storage");
        Ok(())
    }
}

/// Push dispatcher that keeps what it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingPush {
    sent: Mutex<Vec<PushNotification>>,
}

impl RecordingPush {
    /// Empty recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Notifications dispatched so far.
    pub fn sent(&self) -> Vec<PushNotification> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl PushDispatcher for RecordingPush {
    async fn dispatch(&self, notification: PushNotification) -> Result<(), BackendError> {
        lock(&self.sent).push(notification);
        Ok(())
    }
}
