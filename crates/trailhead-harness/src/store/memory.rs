//! In-memory live document store.
//!
//! Keeps documents in a single ordered map keyed by path and drives
//! subscriptions synchronously: every write re-evaluates the affected
//! listeners and invokes their callbacks before the write returns. Callbacks
//! run after the store lock is released, so they may call back into the
//! store.
//!
//! Server timestamps come from a logical clock that advances by one
//! millisecond per write, which makes them strictly monotonic.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use serde_json::{Map, Value};
use trailhead_core::{
    DocPath, Document, DocumentCallback, DocumentStore, FieldValue, Fields, Message, NewMessage,
    ParticipantMap, Query, QueryCallback, RoomId, StoreError, Subscription, Timestamp, UserId,
    document::Direction,
    lock,
};

/// First value of the logical clock.
const CLOCK_START_MS: u64 = 1_700_000_000_000;

type SharedDocCallback = Arc<dyn Fn(Option<Document>) + Send + Sync>;
type SharedQueryCallback = Arc<dyn Fn(Vec<Document>) + Send + Sync>;

struct DocListener {
    path: DocPath,
    active: Arc<AtomicBool>,
    callback: SharedDocCallback,
}

struct QueryListener {
    query: Query,
    active: Arc<AtomicBool>,
    callback: SharedQueryCallback,
}

enum Delivery {
    Document(Arc<AtomicBool>, SharedDocCallback, Option<Document>),
    Query(Arc<AtomicBool>, SharedQueryCallback, Vec<Document>),
}

impl Delivery {
    fn run(self) {
        match self {
            Self::Document(active, callback, doc) => {
                if active.load(Ordering::SeqCst) {
                    callback(doc);
                }
            },
            Self::Query(active, callback, docs) => {
                if active.load(Ordering::SeqCst) {
                    callback(docs);
                }
            },
        }
    }
}

#[derive(Default)]
struct Inner {
    docs: BTreeMap<DocPath, Map<String, Value>>,
    clock: u64,
    next_id: u64,
    next_listener: u64,
    doc_listeners: HashMap<u64, DocListener>,
    query_listeners: HashMap<u64, QueryListener>,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock = if self.clock == 0 { CLOCK_START_MS } else { self.clock + 1 };
        self.clock
    }

    fn document(&self, path: &DocPath) -> Option<Document> {
        self.docs.get(path).map(|data| Document::new(path.leaf(), data.clone()))
    }

    fn run_query(&self, query: &Query) -> Vec<Document> {
        let collection = &query.collection;
        let mut docs: Vec<Document> = self
            .docs
            .iter()
            .filter(|(path, _)| path.parent().as_ref() == Some(collection))
            .map(|(path, data)| Document::new(path.leaf(), data.clone()))
            .filter(|doc| doc.created_at().is_some())
            .collect();

        let key = |doc: &Document| (doc.created_at().unwrap_or_default(), doc.id.clone());
        docs.sort_by_key(key);
        if let Some(after) = &query.after {
            docs.retain(|doc| key(doc) > (after.created_at, after.id.clone()));
        }
        if let Some(before) = &query.before {
            docs.retain(|doc| key(doc) < (before.created_at, before.id.clone()));
        }
        if query.direction == Direction::Descending {
            docs.reverse();
        }
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }
        docs
    }

    /// Deliveries owed to listeners affected by a write to `path`.
    fn deliveries_for(&self, path: &DocPath) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        for listener in self.doc_listeners.values().filter(|l| &l.path == path) {
            deliveries.push(Delivery::Document(
                Arc::clone(&listener.active),
                Arc::clone(&listener.callback),
                self.document(path),
            ));
        }
        let parent = path.parent();
        for listener in
            self.query_listeners.values().filter(|l| Some(&l.query.collection) == parent.as_ref())
        {
            deliveries.push(Delivery::Query(
                Arc::clone(&listener.active),
                Arc::clone(&listener.callback),
                self.run_query(&listener.query),
            ));
        }
        deliveries
    }
}

/// Live document store held in memory.
///
/// Cloning yields another handle to the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// This store as a [`trailhead_core::SharedStore`].
    pub fn shared(&self) -> Arc<dyn DocumentStore> {
        Arc::new(self.clone())
    }

    /// Current document at `path`.
    pub fn document(&self, path: &DocPath) -> Option<Document> {
        lock(&self.inner).document(path)
    }

    /// Unread counters of a room.
    pub fn participants(&self, room_id: &RoomId) -> Option<ParticipantMap> {
        self.document(&DocPath::room(room_id)).and_then(|doc| doc.participants())
    }

    /// All messages of a room, oldest first.
    pub fn messages(&self, room_id: &RoomId) -> Vec<Message> {
        lock(&self.inner)
            .run_query(&Query::messages(room_id))
            .iter()
            .filter_map(|doc| Message::from_document(doc).ok())
            .collect()
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        let inner = lock(&self.inner);
        inner.doc_listeners.len() + inner.query_listeners.len()
    }

    /// Current logical time.
    pub fn now(&self) -> Timestamp {
        Timestamp::from_millis(lock(&self.inner).clock)
    }

    /// Store `count` messages from `sender` in a room, numbered from 1.
    ///
    /// Returns their ids, oldest first. Each message gets its own timestamp.
    pub fn seed_messages(&self, room_id: &RoomId, sender: &UserId, count: usize) -> Vec<String> {
        let collection = DocPath::messages(room_id);
        (1..=count)
            .filter_map(|n| {
                let message = NewMessage {
                    sender_id: sender.clone(),
                    sender_name: sender.to_string(),
                    text: format!("message {n}"),
                };
                self.insert_new(&collection, &message.into_fields()).ok()
            })
            .collect()
    }

    fn insert_new(&self, collection: &DocPath, fields: &Fields) -> Result<String, StoreError> {
        check_collection_path(collection)?;
        let (id, deliveries) = {
            let mut inner = lock(&self.inner);
            inner.next_id += 1;
            let id = format!("auto{:06}", inner.next_id);
            let path = collection.child(&id);
            let now = inner.tick();
            let mut data = Map::new();
            apply_fields(&mut data, fields, now, &path)?;
            inner.docs.insert(path.clone(), data);
            (id, inner.deliveries_for(&path))
        };
        deliver(deliveries);
        Ok(id)
    }

    fn write(&self, path: &DocPath, fields: &Fields, replace: bool) -> Result<(), StoreError> {
        check_document_path(path)?;
        let deliveries = {
            let mut inner = lock(&self.inner);
            let now = inner.tick();
            let mut data = if replace {
                Map::new()
            } else {
                inner
                    .docs
                    .get(path)
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound { path: path.to_string() })?
            };
            apply_fields(&mut data, fields, now, path)?;
            inner.docs.insert(path.clone(), data);
            inner.deliveries_for(path)
        };
        deliver(deliveries);
        Ok(())
    }

    fn add_listener(&self, listener: Listener) -> (Subscription, Delivery) {
        let active = Arc::new(AtomicBool::new(true));
        let mut inner = lock(&self.inner);
        inner.next_listener += 1;
        let id = inner.next_listener;

        let initial = match listener {
            Listener::Document(path, callback) => {
                let initial = Delivery::Document(
                    Arc::clone(&active),
                    Arc::clone(&callback),
                    inner.document(&path),
                );
                inner
                    .doc_listeners
                    .insert(id, DocListener { path, active: Arc::clone(&active), callback });
                initial
            },
            Listener::Query(query, callback) => {
                let initial = Delivery::Query(
                    Arc::clone(&active),
                    Arc::clone(&callback),
                    inner.run_query(&query),
                );
                inner
                    .query_listeners
                    .insert(id, QueryListener { query, active: Arc::clone(&active), callback });
                initial
            },
        };

        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let subscription = Subscription::new(move || {
            active.store(false, Ordering::SeqCst);
            if let Some(inner) = weak.upgrade() {
                let mut inner = lock(&inner);
                inner.doc_listeners.remove(&id);
                inner.query_listeners.remove(&id);
            }
        });
        (subscription, initial)
    }
}

enum Listener {
    Document(DocPath, SharedDocCallback),
    Query(Query, SharedQueryCallback),
}

fn deliver(deliveries: Vec<Delivery>) {
    for delivery in deliveries {
        delivery.run();
    }
}

fn check_document_path(path: &DocPath) -> Result<(), StoreError> {
    if path.has_empty_segment() {
        return Err(StoreError::InvalidPath { path: path.to_string(), reason: "empty segment" });
    }
    if path.depth() % 2 != 0 {
        return Err(StoreError::InvalidPath {
            path: path.to_string(),
            reason: "not a document path",
        });
    }
    Ok(())
}

fn check_collection_path(path: &DocPath) -> Result<(), StoreError> {
    if path.has_empty_segment() {
        return Err(StoreError::InvalidPath { path: path.to_string(), reason: "empty segment" });
    }
    if path.depth() % 2 != 1 {
        return Err(StoreError::InvalidPath {
            path: path.to_string(),
            reason: "not a collection path",
        });
    }
    Ok(())
}

/// Apply every write in `fields` to `data`.
fn apply_fields(
    data: &mut Map<String, Value>,
    fields: &Fields,
    now: u64,
    path: &DocPath,
) -> Result<(), StoreError> {
    for (field, value) in fields.entries() {
        let segments: Vec<&str> = field.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(StoreError::InvalidDocument {
                path: path.to_string(),
                reason: format!("bad field path `{field}`"),
            });
        }
        apply_field(data, &segments, value, now, path)?;
    }
    Ok(())
}

fn apply_field(
    data: &mut Map<String, Value>,
    segments: &[&str],
    value: &FieldValue,
    now: u64,
    path: &DocPath,
) -> Result<(), StoreError> {
    let Some((leaf, parents)) = segments.split_last() else {
        return Ok(());
    };

    let mut object = data;
    for segment in parents {
        if matches!(value, FieldValue::Delete)
            && !object.get(*segment).is_some_and(Value::is_object)
        {
            return Ok(());
        }
        let entry =
            object.entry((*segment).to_string()).or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        object = match entry {
            Value::Object(map) => map,
            _ => return Err(not_an_object(path)),
        };
    }

    match value {
        FieldValue::Set(v) => {
            object.insert((*leaf).to_string(), v.clone());
        },
        FieldValue::Delete => {
            object.remove(*leaf);
        },
        FieldValue::Increment(by) => {
            let current = object.get(*leaf).and_then(Value::as_i64).unwrap_or(0);
            object.insert((*leaf).to_string(), Value::from(current.saturating_add(*by)));
        },
        FieldValue::ServerTimestamp => {
            object.insert((*leaf).to_string(), Value::from(now));
        },
    }
    Ok(())
}

fn not_an_object(path: &DocPath) -> StoreError {
    StoreError::InvalidDocument {
        path: path.to_string(),
        reason: "field parent is not an object".to_string(),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        check_document_path(path)?;
        Ok(self.document(path))
    }

    async fn set_document(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        self.write(path, &fields, true)
    }

    async fn update_document(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        self.write(path, &fields, false)
    }

    async fn add_document(
        &self,
        collection: &DocPath,
        fields: Fields,
    ) -> Result<String, StoreError> {
        self.insert_new(collection, &fields)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        check_collection_path(&query.collection)?;
        Ok(lock(&self.inner).run_query(query))
    }

    async fn subscribe_document(
        &self,
        path: &DocPath,
        callback: DocumentCallback,
    ) -> Result<Subscription, StoreError> {
        check_document_path(path)?;
        let (subscription, initial) =
            self.add_listener(Listener::Document(path.clone(), Arc::from(callback)));
        initial.run();
        Ok(subscription)
    }

    async fn subscribe_query(
        &self,
        query: Query,
        callback: QueryCallback,
    ) -> Result<Subscription, StoreError> {
        check_collection_path(&query.collection)?;
        let (subscription, initial) =
            self.add_listener(Listener::Query(query, Arc::from(callback)));
        initial.run();
        Ok(subscription)
    }
}
