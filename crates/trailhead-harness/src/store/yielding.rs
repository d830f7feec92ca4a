//! Store wrapper that yields to the scheduler after every read.
//!
//! Concurrent tasks on one runtime thread then interleave between a read
//! and the write that depends on it, which is how lost updates happen
//! against a real remote store.

use async_trait::async_trait;
use trailhead_core::{
    DocPath, Document, DocumentCallback, DocumentStore, Fields, Query, QueryCallback, StoreError,
    Subscription,
};

/// Store wrapper that yields after `get_document` and `query`.
#[derive(Clone)]
pub struct YieldingStore<S: DocumentStore> {
    inner: S,
}

impl<S: DocumentStore> YieldingStore<S> {
    /// Wrap `inner`.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for YieldingStore<S> {
    async fn get_document(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let doc = self.inner.get_document(path).await;
        tokio::task::yield_now().await;
        doc
    }

    async fn set_document(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        self.inner.set_document(path, fields).await
    }

    async fn update_document(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        self.inner.update_document(path, fields).await
    }

    async fn add_document(
        &self,
        collection: &DocPath,
        fields: Fields,
    ) -> Result<String, StoreError> {
        self.inner.add_document(collection, fields).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let docs = self.inner.query(query).await;
        tokio::task::yield_now().await;
        docs
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
