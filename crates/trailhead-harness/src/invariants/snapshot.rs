//! Observable chat state for invariant checking.
//!
//! Invariants run against a copy of the state rather than the live context,
//! so one check sees one consistent moment.

use trailhead_client::{ChatContext, ChatView};

/// Observable state of one [`ChatContext`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSnapshot {
    /// Whether a user is signed in.
    pub authenticated: bool,
    /// Roster keys in roster order.
    pub roster_keys: Vec<String>,
    /// View as the UI would render it.
    pub view: ChatView,
    /// Live tracker subscriptions (unread plus last message).
    pub tracker_subscriptions: usize,
}

impl ChatSnapshot {
    /// Snapshot of a signed-out, empty context.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture `context`.
    pub fn from_context(context: &ChatContext) -> Self {
        Self {
            authenticated: context.auth().is_some(),
            roster_keys: context.roster().rooms().iter().map(|room| room.key.clone()).collect(),
            view: context.view(),
            tracker_subscriptions: context.tracker_subscriptions(),
        }
    }
}
