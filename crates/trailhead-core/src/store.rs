//! Remote document store capability.
//!
//! The chat layer never talks to a concrete backend. It consumes this trait,
//! which models a real-time document database: point reads and writes,
//! ordered collection queries, and push-based subscriptions that deliver the
//! full current result on every change.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{DocPath, Document, Fields, Query, StoreError, Subscription};

/// Callback of a document subscription. Receives `None` while the document
/// does not exist.
pub type DocumentCallback = Box<dyn Fn(Option<Document>) + Send + Sync>;

/// Callback of a query subscription. Receives the full result every time.
pub type QueryCallback = Box<dyn Fn(Vec<Document>) + Send + Sync>;

/// Shared handle to a store.
pub type SharedStore = Arc<dyn DocumentStore>;

/// Real-time document store.
///
/// # Delivery
///
/// Subscriptions deliver the current state once on setup and again after
/// every change that affects them. Delivery is at-least-once and monotonic
/// per document. After [`Subscription::cancel`] returns, the callback is not
/// invoked again.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document. `None` if absent.
    async fn get_document(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    /// Create or replace a document with `fields` applied to an empty object.
    async fn set_document(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError>;

    /// Apply `fields` to an existing document.
    ///
    /// Fails with [`StoreError::NotFound`] if the document does not exist.
    async fn update_document(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError>;

    /// Add a document with a store-generated id to `collection`.
    async fn add_document(&self, collection: &DocPath, fields: Fields)
    -> Result<String, StoreError>;

    /// Run a query once.
    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Watch a document.
    async fn subscribe_document(
        &self,
        path: &DocPath,
        callback: DocumentCallback,
    ) -> Result<Subscription, StoreError>;

    /// Watch a query.
    async fn subscribe_query(
        &self,
        query: Query,
        callback: QueryCallback,
    ) -> Result<Subscription, StoreError>;
}
