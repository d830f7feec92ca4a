//! Document model of the remote store.
//!
//! Documents are JSON objects addressed by slash-separated paths. Document
//! paths have an even number of segments (`collection/id`), collection paths
//! an odd number. Writes are expressed as [`Fields`]: a list of dotted field
//! paths with a value or a sentinel the store resolves on its side.
//!
//! Layout used by the chat layer:
//!
//! ```text
//! chatrooms/{roomId}                 { type, participants: { uid: count } }
//! chatrooms/{roomId}/messages/{id}   { senderId, senderName, text, createdAt }
//! ```

use std::{collections::BTreeMap, fmt};

use serde_json::{Map, Value};

use crate::{RoomId, Timestamp, UserId};

/// Top-level collection holding room documents.
pub const ROOMS_COLLECTION: &str = "chatrooms";

/// Sub-collection of a room holding its messages.
pub const MESSAGES_COLLECTION: &str = "messages";

/// Field of the room document holding unread counters.
pub const PARTICIPANTS_FIELD: &str = "participants";

/// Field every message carries its store-assigned timestamp in.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Per-room map from participant to unread count.
pub type ParticipantMap = BTreeMap<UserId, u64>;

/// Slash-separated path to a document or collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath(String);

impl DocPath {
    /// Wrap a raw path. Validity is checked by the store.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Path of a room document.
    pub fn room(room_id: &RoomId) -> Self {
        Self(format!("{ROOMS_COLLECTION}/{room_id}"))
    }

    /// Path of a room's message collection.
    pub fn messages(room_id: &RoomId) -> Self {
        Self(format!("{ROOMS_COLLECTION}/{room_id}/{MESSAGES_COLLECTION}"))
    }

    /// Child of this path.
    pub fn child(&self, segment: &str) -> Self {
        Self(format!("{}/{segment}", self.0))
    }

    /// Parent path. `None` for a single segment.
    pub fn parent(&self) -> Option<Self> {
        self.0.rsplit_once('/').map(|(parent, _)| Self(parent.to_string()))
    }

    /// Last segment.
    pub fn leaf(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, leaf)| leaf)
    }

    /// Number of segments. Empty segments count, so the store can reject them.
    pub fn depth(&self) -> usize {
        self.0.split('/').count()
    }

    /// Whether any segment is empty.
    pub fn has_empty_segment(&self) -> bool {
        self.0.split('/').any(str::is_empty)
    }

    /// Raw path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Last path segment.
    pub id: String,
    /// Field data.
    pub data: Map<String, Value>,
}

impl Document {
    /// Build a snapshot.
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self { id: id.into(), data }
    }

    /// Top-level field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Unread counters of a room document. `None` if the document has no
    /// participant map.
    pub fn participants(&self) -> Option<ParticipantMap> {
        self.get(PARTICIPANTS_FIELD).and_then(participants_from_value)
    }

    /// Store timestamp in [`CREATED_AT_FIELD`].
    pub fn created_at(&self) -> Option<Timestamp> {
        self.get(CREATED_AT_FIELD).and_then(Value::as_u64).map(Timestamp::from_millis)
    }
}

/// Read a participant map out of a JSON object.
///
/// Counters that are negative or not integers read as zero; a counter is
/// never negative on this side.
pub fn participants_from_value(value: &Value) -> Option<ParticipantMap> {
    let object = value.as_object()?;
    Some(
        object
            .iter()
            .map(|(uid, count)| {
                let count = count.as_u64().unwrap_or(0);
                (UserId::new(uid.clone()), count)
            })
            .collect(),
    )
}

/// Value written to a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Replace with a JSON value.
    Set(Value),
    /// Remove the field.
    Delete,
    /// Add to the current integer value (missing reads as 0), atomically.
    Increment(i64),
    /// Store-assigned timestamp, monotonic per store.
    ServerTimestamp,
}

/// Ordered set of field writes.
///
/// Field paths are dotted (`participants.<uid>`) and address nested objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, FieldValue)>,
}

impl Fields {
    /// Empty write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field` to `value`.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((field.into(), FieldValue::Set(value.into())));
        self
    }

    /// Delete `field`.
    #[must_use]
    pub fn delete(mut self, field: impl Into<String>) -> Self {
        self.entries.push((field.into(), FieldValue::Delete));
        self
    }

    /// Increment `field` by `by`.
    #[must_use]
    pub fn increment(mut self, field: impl Into<String>, by: i64) -> Self {
        self.entries.push((field.into(), FieldValue::Increment(by)));
        self
    }

    /// Set `field` to the store's timestamp.
    #[must_use]
    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.entries.push((field.into(), FieldValue::ServerTimestamp));
        self
    }

    /// Whether no writes are queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes in insertion order.
    pub fn entries(&self) -> &[(String, FieldValue)] {
        &self.entries
    }
}

/// Dotted path of a participant's counter.
pub fn participant_field(user: &UserId) -> String {
    format!("{PARTICIPANTS_FIELD}.{user}")
}

/// Sort direction over [`CREATED_AT_FIELD`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Oldest first.
    #[default]
    Ascending,
    /// Newest first.
    Descending,
}

/// Position in `(createdAt, id)` order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    /// Store timestamp of the boundary document.
    pub created_at: Timestamp,
    /// Id of the boundary document, breaks timestamp ties.
    pub id: String,
}

/// Query over a collection, ordered by [`CREATED_AT_FIELD`] then id.
///
/// `after` and `before` are exclusive bounds in ascending order and apply
/// before `direction` and `limit`.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Collection to read.
    pub collection: DocPath,
    /// Result order.
    pub direction: Direction,
    /// Maximum number of documents. `None` for all.
    pub limit: Option<usize>,
    /// Only documents strictly after this position.
    pub after: Option<Cursor>,
    /// Only documents strictly before this position.
    pub before: Option<Cursor>,
}

impl Query {
    /// All documents of `collection`, oldest first.
    pub fn collection(collection: DocPath) -> Self {
        Self { collection, direction: Direction::Ascending, limit: None, after: None, before: None }
    }

    /// All messages of a room, oldest first.
    pub fn messages(room_id: &RoomId) -> Self {
        Self::collection(DocPath::messages(room_id))
    }

    /// Newest first.
    #[must_use]
    pub fn descending(mut self) -> Self {
        self.direction = Direction::Descending;
        self
    }

    /// Cap the result size.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Exclusive lower bound.
    #[must_use]
    pub fn after(mut self, cursor: Cursor) -> Self {
        self.after = Some(cursor);
        self
    }

    /// Exclusive upper bound.
    #[must_use]
    pub fn before(mut self, cursor: Cursor) -> Self {
        self.before = Some(cursor);
        self
    }
}
