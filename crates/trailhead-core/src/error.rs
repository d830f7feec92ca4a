//! Error types for the remote document store.
//!
//! The store is an external collaborator; these errors describe how a call
//! against it failed, independent of which backend implements it.

use thiserror::Error;

/// Errors returned by [`crate::DocumentStore`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store could not be reached (network loss, backend outage).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Update targeted a document that does not exist.
    #[error("document not found: {path}")]
    NotFound {
        /// Path of the missing document
        path: String,
    },

    /// Path is malformed or points at the wrong kind of node.
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// Offending path
        path: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Stored document does not have the expected shape.
    #[error("invalid document {path}: {reason}")]
    InvalidDocument {
        /// Path of the malformed document
        path: String,
        /// What was wrong with it
        reason: String,
    },

    /// Store refused the operation (permissions, quota).
    #[error("rejected by store: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Only availability failures are transient. Malformed paths, malformed
    /// documents and rejections will fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
