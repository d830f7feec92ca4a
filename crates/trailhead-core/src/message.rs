//! Chat messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Cursor, Document, Fields, StoreError, UserId, document::CREATED_AT_FIELD};

/// Store-assigned creation time in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Timestamp from milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds.
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A message stored in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned document id.
    pub id: String,
    /// Sender's remote-auth id.
    pub sender_id: UserId,
    /// Sender's display name at send time.
    pub sender_name: String,
    /// Body.
    pub text: String,
    /// Store-assigned creation time.
    pub created_at: Timestamp,
}

impl Message {
    /// Decode a message document.
    ///
    /// A document whose timestamp is still missing is rejected rather than
    /// ordered arbitrarily.
    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let field = |name: &str| -> Result<String, StoreError> {
            doc.get(name).and_then(Value::as_str).map(str::to_owned).ok_or_else(|| {
                StoreError::InvalidDocument {
                    path: doc.id.clone(),
                    reason: format!("missing string field {name}"),
                }
            })
        };

        let created_at = doc.created_at().ok_or_else(|| StoreError::InvalidDocument {
            path: doc.id.clone(),
            reason: format!("missing {CREATED_AT_FIELD}"),
        })?;

        Ok(Self {
            id: doc.id.clone(),
            sender_id: UserId::new(field("senderId")?),
            sender_name: field("senderName")?,
            text: field("text")?,
            created_at,
        })
    }

    /// Position of this message in room order.
    pub fn cursor(&self) -> Cursor {
        Cursor { created_at: self.created_at, id: self.id.clone() }
    }

    /// Room order key: creation time, then id.
    pub fn sort_key(&self) -> (Timestamp, &str) {
        (self.created_at, self.id.as_str())
    }
}

/// A message about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Sender's remote-auth id.
    pub sender_id: UserId,
    /// Sender's display name.
    pub sender_name: String,
    /// Body.
    pub text: String,
}

impl NewMessage {
    /// Fields of the message document. The timestamp is left to the store.
    pub fn into_fields(self) -> Fields {
        Fields::new()
            .set("senderId", self.sender_id.as_str())
            .set("senderName", self.sender_name)
            .set("text", self.text)
            .server_timestamp(CREATED_AT_FIELD)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::{Map, json};

    use super::*;
    use crate::FieldValue;

    fn doc(value: Value) -> Document {
        let data: Map<String, Value> = value.as_object().cloned().unwrap_or_default();
        Document::new("m1", data)
    }

    #[test]
    fn decode_message_document() {
        let message = Message::from_document(&doc(json!({
            "senderId": "a",
            "senderName": "Ann",
            "text": "hi",
            "createdAt": 12,
        })))
        .unwrap();

        assert_eq!(message.sender_id, UserId::new("a"));
        assert_eq!(message.created_at, Timestamp::from_millis(12));
        assert_eq!(message.sort_key(), (Timestamp::from_millis(12), "m1"));
    }

    #[test]
    fn missing_timestamp_rejected() {
        let result = Message::from_document(&doc(json!({
            "senderId": "a",
            "senderName": "Ann",
            "text": "hi",
        })));

        assert!(matches!(result, Err(StoreError::InvalidDocument { .. })));
    }

    #[test]
    fn new_message_defers_timestamp_to_store() {
        let fields = NewMessage {
            sender_id: UserId::new("a"),
            sender_name: "Ann".to_string(),
            text: "hi".to_string(),
        }
        .into_fields();

        assert!(
            fields
                .entries()
                .iter()
                .any(|(name, value)| name == "createdAt" && *value == FieldValue::ServerTimestamp)
        );
    }
}
