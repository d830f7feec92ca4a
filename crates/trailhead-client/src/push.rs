//! Push notification dispatch.
//!
//! Delivery is someone else's job; the chat layer only hands a notification
//! to a dispatcher after a message is stored and never waits on the result.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;

use crate::BackendError;

/// A notification for a set of devices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushNotification {
    /// Device push tokens.
    pub tokens: Vec<String>,
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// Arbitrary payload delivered to the app.
    pub data: Value,
}

/// Sends push notifications.
#[async_trait]
pub trait PushDispatcher: Send + Sync {
    /// Send `notification` to its devices.
    async fn dispatch(&self, notification: PushNotification) -> Result<(), BackendError>;
}

/// [`PushDispatcher`] posting one message per token to a push gateway.
#[derive(Debug, Clone)]
pub struct HttpPushDispatcher {
    client: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct GatewayMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    data: &'a Value,
}

impl HttpPushDispatcher {
    /// Dispatcher for the gateway at `endpoint`.
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self { client, endpoint: endpoint.into() }
    }
}

#[async_trait]
impl PushDispatcher for HttpPushDispatcher {
    async fn dispatch(&self, notification: PushNotification) -> Result<(), BackendError> {
        let messages: Vec<GatewayMessage<'_>> = notification
            .tokens
            .iter()
            .map(|to| GatewayMessage {
                to,
                title: &notification.title,
                body: &notification.body,
                data: &notification.data,
            })
            .collect();

        let response = self.client.post(&self.endpoint).json(&messages).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::Http {
                status: status.as_u16(),
                message: "push gateway rejected".to_string(),
            })
        }
    }
}

/// Hand `notification` to `dispatcher` without waiting. Failures are logged.
///
/// Spawns on the current Tokio runtime. Outside one the notification is
/// dropped with a warning; the message it announces is already stored.
pub(crate) fn dispatch_detached(
    dispatcher: Arc<dyn PushDispatcher>,
    notification: PushNotification,
) {
    if notification.tokens.is_empty() {
        return;
    }
    let Ok(runtime) = Handle::try_current() else {
        tracing::warn!("no tokio runtime, dropping push to {} devices", notification.tokens.len());
        return;
    };
    runtime.spawn(async move {
        if let Err(e) = dispatcher.dispatch(notification).await {
            tracing::warn!("push dispatch failed: {}", e);
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use serde_json::json;
    use trailhead_core::lock;

    use super::*;

    #[derive(Default)]
    struct Collect {
        sent: Mutex<Vec<PushNotification>>,
    }

    #[async_trait]
    impl PushDispatcher for Collect {
        async fn dispatch(&self, notification: PushNotification) -> Result<(), BackendError> {
            lock(&self.sent).push(notification);
            Ok(())
        }
    }

    fn notification(tokens: &[&str]) -> PushNotification {
        PushNotification {
            tokens: tokens.iter().map(|t| (*t).to_string()).collect(),
            title: "Ann".to_string(),
            body: "hi".to_string(),
            data: json!({ "roomId": "ab", "messageId": "m1" }),
        }
    }

    #[tokio::test]
    async fn no_tokens_no_dispatch() {
        let collect = Arc::new(Collect::default());
        dispatch_detached(collect.clone(), notification(&[]));
        tokio::task::yield_now().await;
        assert!(lock(&collect.sent).is_empty());
    }

    #[test]
    fn detached_dispatch_outside_runtime_is_skipped() {
        let collect = Arc::new(Collect::default());
        dispatch_detached(collect.clone(), notification(&["device-1"]));
        assert!(lock(&collect.sent).is_empty());
    }

    #[tokio::test]
    async fn detached_dispatch_runs_in_background() {
        let collect = Arc::new(Collect::default());
        dispatch_detached(collect.clone(), notification(&["device-1"]));
        for _ in 0..10 {
            if !lock(&collect.sent).is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(lock(&collect.sent).len(), 1);
    }

    #[tokio::test]
    async fn unreachable_gateway_is_transport_error() {
        let client = Client::builder().timeout(Duration::from_millis(500)).build().unwrap();
        let dispatcher = HttpPushDispatcher::new(client, "http://127.0.0.1:9/push");

        let err = dispatcher.dispatch(notification(&["device-1"])).await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
