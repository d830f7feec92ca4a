//! Chaotic store wrapper for fault injection testing
//!
//! Delegates to another store but fails a configurable share of calls with
//! [`StoreError::Unavailable`]. Used to check that background failures are
//! logged and swallowed while user actions surface them.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use trailhead_core::{
    DocPath, Document, DocumentCallback, DocumentStore, Fields, Query, QueryCallback, StoreError,
    Subscription, lock,
};

/// Store wrapper that randomly fails operations.
///
/// Uses `Arc<Mutex<>>` for the RNG state, so clones share one failure
/// sequence.
#[derive(Clone)]
pub struct ChaoticStore<S: DocumentStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<Mutex<usize>>,
    failure_count: Arc<Mutex<usize>>,
}

/// Linear congruential generator, so chaos runs replay from a seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        #[allow(clippy::cast_precision_loss)]
        let value = (self.state as f64) / (M as f64);
        value
    }
}

impl<S: DocumentStore> ChaoticStore<S> {
    /// Wrap `inner` with the default seed. `failure_rate` is clamped to
    /// [0.0, 1.0].
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        Self {
            inner,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(Mutex::new(0)),
            failure_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Underlying store (for checking state after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Store calls attempted.
    pub fn operation_count(&self) -> usize {
        *lock(&self.operation_count)
    }

    /// Store calls failed on purpose.
    pub fn failure_count(&self) -> usize {
        *lock(&self.failure_count)
    }

    /// Count the call and decide whether it fails.
    fn roll(&self, operation: &'static str) -> Result<(), StoreError> {
        *lock(&self.operation_count) += 1;
        if lock(&self.rng).next() < self.failure_rate {
            *lock(&self.failure_count) += 1;
            tracing::debug!("injecting failure into {}", operation);
            return Err(StoreError::Unavailable(format!("chaotic failure injection ({operation})")));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for ChaoticStore<S> {
    async fn get_document(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        self.roll("get_document")?;
        self.inner.get_document(path).await
    }

    async fn set_document(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        self.roll("set_document")?;
        self.inner.set_document(path, fields).await
    }

    async fn update_document(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        self.roll("update_document")?;
        self.inner.update_document(path, fields).await
    }

    async fn add_document(
        &self,
        collection: &DocPath,
        fields: Fields,
    ) -> Result<String, StoreError> {
        self.roll("add_document")?;
        self.inner.add_document(collection, fields).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.roll("query")?;
        self.inner.query(query).await
    }

    async fn subscribe_document(
        &self,
        path: &DocPath,
        callback: DocumentCallback,
    ) -> Result<Subscription, StoreError> {
        self.roll("subscribe_document")?;
        self.inner.subscribe_document(path, callback).await
    }

    async fn subscribe_query(
        &self,
        query: Query,
        callback: QueryCallback,
    ) -> Result<Subscription, StoreError> {
        self.roll("subscribe_query")?;
        self.inner.subscribe_query(query, callback).await
    }
}
