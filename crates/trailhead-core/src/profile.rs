//! Authenticated user profile.
//!
//! Only the parts of the profile the chat layer reads: identity, display
//! name, the two lists the room roster is derived from, and the device push
//! token.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Profile of the signed-in user as served by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Backend record id.
    pub id: String,
    /// Remote-auth id. Keys participant maps.
    pub auth_id: UserId,
    /// Display name attached to sent messages.
    pub name: String,
    /// Users with an open direct chat.
    #[serde(default)]
    pub chatrooms_with: Vec<ChatPartner>,
    /// Groups with an open group chat.
    #[serde(default)]
    pub chatrooms_groups: Vec<GroupMembership>,
    /// Device push token, if registered.
    #[serde(default)]
    pub push_token: Option<String>,
}

impl Profile {
    /// Profile with no chats.
    pub fn new(id: impl Into<String>, auth_id: UserId, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            auth_id,
            name: name.into(),
            chatrooms_with: Vec::new(),
            chatrooms_groups: Vec::new(),
            push_token: None,
        }
    }
}

/// Partner of a direct chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPartner {
    /// Partner's backend record id.
    pub id: String,
    /// Partner's remote-auth id.
    pub auth_id: UserId,
}

/// A group the user chats in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    /// Group record id, also the room id.
    pub id: String,
    /// Remote-auth ids of every member, including the user.
    #[serde(default)]
    pub members: Vec<UserId>,
}
