//! REST backend client for chat bookkeeping.
//!
//! Opening, closing and muting chats is recorded by the REST backend, which
//! also maintains the profile lists the roster is derived from. Every call
//! carries the user's bearer token; failures come back as non-2xx with a
//! JSON `{ "error": "..." }` body.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{BackendConfig, BackendError};

/// Conversation a bookkeeping call targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChatTarget {
    /// Direct chat with a user, by backend record id.
    User(String),
    /// Group chat, by group record id.
    Group(String),
}

impl ChatTarget {
    /// Endpoint path of this chat.
    pub fn path(&self) -> String {
        match self {
            Self::User(id) => format!("/api/chat/user/{id}"),
            Self::Group(id) => format!("/api/chat/group/{id}"),
        }
    }
}

/// REST operations the chat layer needs.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Record a new open chat (`POST`).
    async fn open_chat(&self, token: &str, target: &ChatTarget) -> Result<(), BackendError>;

    /// Record a closed chat (`DELETE`).
    async fn close_chat(&self, token: &str, target: &ChatTarget) -> Result<(), BackendError>;

    /// Mute (`POST .../mute`) or unmute (`DELETE .../mute`) a chat.
    async fn set_muted(
        &self,
        token: &str,
        target: &ChatTarget,
        muted: bool,
    ) -> Result<(), BackendError>;

    /// Forget this device's push token.
    async fn unregister_push_token(
        &self,
        token: &str,
        device_token: &str,
    ) -> Result<(), BackendError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`ChatBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Build a client from configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_string() })
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: Option<Value>,
    ) -> Result<(), BackendError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.request(method.clone(), &url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!("{} {} -> {}", method, path, status);
            return Ok(());
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
        };
        Err(BackendError::Http { status: status.as_u16(), message })
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn open_chat(&self, token: &str, target: &ChatTarget) -> Result<(), BackendError> {
        self.call(Method::POST, &target.path(), token, None).await
    }

    async fn close_chat(&self, token: &str, target: &ChatTarget) -> Result<(), BackendError> {
        self.call(Method::DELETE, &target.path(), token, None).await
    }

    async fn set_muted(
        &self,
        token: &str,
        target: &ChatTarget,
        muted: bool,
    ) -> Result<(), BackendError> {
        let method = if muted { Method::POST } else { Method::DELETE };
        self.call(method, &format!("{}/mute", target.path()), token, None).await
    }

    async fn unregister_push_token(
        &self,
        token: &str,
        device_token: &str,
    ) -> Result<(), BackendError> {
        let body = json!({ "token": device_token });
        self.call(Method::DELETE, "/api/users/push-token", token, Some(body)).await
    }
}
