//! Call-recording store wrapper.
//!
//! Records every write before delegating it, and can hold updates at a gate
//! so a test can look at local state while a remote write is in flight.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use trailhead_core::{
    DocPath, Document, DocumentCallback, DocumentStore, Fields, Query, QueryCallback, StoreError,
    Subscription, lock,
};

/// Kind of recorded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// `set_document`
    Set,
    /// `update_document`
    Update,
    /// `add_document`
    Add,
}

/// One recorded write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    /// Which operation.
    pub kind: WriteKind,
    /// Document path, or collection path for [`WriteKind::Add`].
    pub path: DocPath,
    /// Fields as passed by the caller.
    pub fields: Fields,
}

/// Store wrapper that records writes.
#[derive(Clone)]
pub struct RecordingStore<S: DocumentStore> {
    inner: S,
    calls: Arc<Mutex<Vec<WriteCall>>>,
    hold_updates: Arc<AtomicBool>,
    gate: Arc<Semaphore>,
}

impl<S: DocumentStore> RecordingStore<S> {
    /// Record writes going to `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Arc::new(Mutex::new(Vec::new())),
            hold_updates: Arc::new(AtomicBool::new(false)),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Make `update_document` wait (after recording) until
    /// [`Self::release_updates`].
    pub fn hold_updates(&self) {
        self.hold_updates.store(true, Ordering::SeqCst);
    }

    /// Let held and future updates through.
    pub fn release_updates(&self) {
        self.hold_updates.store(false, Ordering::SeqCst);
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    /// Underlying store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Writes so far, in call order.
    pub fn calls(&self) -> Vec<WriteCall> {
        lock(&self.calls).clone()
    }

    /// Writes of one kind to one path.
    pub fn calls_to(&self, kind: WriteKind, path: &DocPath) -> Vec<WriteCall> {
        lock(&self.calls).iter().filter(|c| c.kind == kind && &c.path == path).cloned().collect()
    }

    fn record(&self, kind: WriteKind, path: &DocPath, fields: &Fields) {
        lock(&self.calls).push(WriteCall { kind, path: path.clone(), fields: fields.clone() });
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for RecordingStore<S> {
    async fn get_document(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        self.inner.get_document(path).await
    }

    async fn set_document(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        self.record(WriteKind::Set, path, &fields);
        self.inner.set_document(path, fields).await
    }

    async fn update_document(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        self.record(WriteKind::Update, path, &fields);
        if self.hold_updates.load(Ordering::SeqCst) {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| StoreError::Unavailable("update gate closed".to_string()))?;
        }
        self.inner.update_document(path, fields).await
    }

    async fn add_document(
        &self,
        collection: &DocPath,
        fields: Fields,
    ) -> Result<String, StoreError> {
        self.record(WriteKind::Add, collection, &fields);
        self.inner.add_document(collection, fields).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.inner.query(query).await
    }

    async fn subscribe_document(
        &self,
        path: &DocPath,
        callback: DocumentCallback,
    ) -> Result<Subscription, StoreError> {
        self.inner.subscribe_document(path, callback).await
    }

    async fn subscribe_query(
        &self,
        query: Query,
        callback: QueryCallback,
    ) -> Result<Subscription, StoreError> {
        self.inner.subscribe_query(query, callback).await
    }
}
