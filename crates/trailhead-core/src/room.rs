//! Room identity.
//!
//! A room is either a direct conversation between two users or a group
//! conversation. Direct rooms are identified by the two participants'
//! remote-auth ids, combined so that both sides compute the same id without
//! coordinating. Group rooms reuse the group's own id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Remote-auth identifier of a user.
///
/// This is the id that keys a room's participant map, not the backend's
/// internal record id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw remote-auth id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identity of a room document in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wrap a raw room id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical id of the direct room between `a` and `b`.
///
/// # Invariants
///
/// - `direct_room_id(a, b) == direct_room_id(b, a)` for all `a`, `b`.
pub fn direct_room_id(a: &UserId, b: &UserId) -> RoomId {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    RoomId(format!("{first}{second}"))
}

/// Id of a group room. Groups are their own room.
pub fn group_room_id(group_id: &str) -> RoomId {
    RoomId::new(group_id)
}

/// Kind of conversation a room holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    /// Two-party conversation.
    User,
    /// Group conversation.
    Group,
}

impl RoomKind {
    /// Wire name stored in the room document's `type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }
}

/// A room tracked by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Room {
    /// Direct or group.
    pub kind: RoomKind,
    /// Stable local key: the partner's or the group's record id.
    pub key: String,
    /// Identity used for remote lookups.
    pub room_id: RoomId,
}

impl Room {
    /// Direct room between `me` and a partner.
    pub fn direct(me: &UserId, partner_key: impl Into<String>, partner: &UserId) -> Self {
        Self { kind: RoomKind::User, key: partner_key.into(), room_id: direct_room_id(me, partner) }
    }

    /// Group room.
    pub fn group(group_id: impl Into<String>) -> Self {
        let key = group_id.into();
        let room_id = group_room_id(&key);
        Self { kind: RoomKind::Group, key, room_id }
    }

    /// Whether this is a group room.
    pub fn is_group(&self) -> bool {
        self.kind == RoomKind::Group
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn direct_id_sorts_participants() {
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        assert_eq!(direct_room_id(&alice, &bob).as_str(), "alicebob");
        assert_eq!(direct_room_id(&bob, &alice).as_str(), "alicebob");
    }

    #[test]
    fn group_room_uses_group_id() {
        let room = Room::group("g-42");
        assert_eq!(room.room_id.as_str(), "g-42");
        assert_eq!(room.key, "g-42");
        assert!(room.is_group());
    }

    #[test]
    fn direct_room_keeps_partner_key() {
        let room = Room::direct(&UserId::new("uid-b"), "17", &UserId::new("uid-a"));
        assert_eq!(room.key, "17");
        assert_eq!(room.room_id.as_str(), "uid-auid-b");
        assert_eq!(room.kind.as_str(), "user");
    }

    proptest! {
        #[test]
        fn prop_direct_id_is_symmetric(a in "[a-zA-Z0-9]{1,28}", b in "[a-zA-Z0-9]{1,28}") {
            let a = UserId::new(a);
            let b = UserId::new(b);
            prop_assert_eq!(direct_room_id(&a, &b), direct_room_id(&b, &a));
        }
    }
}
