//! Client error types.
//!
//! Only user-initiated actions surface these. Background reads and
//! subscription setup log their failures and keep the cached state.

use thiserror::Error;
use trailhead_core::{RoomId, StoreError};

/// Errors from chat operations.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Document store call failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// REST backend call failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Operation needs a signed-in user.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Room session was already closed.
    #[error("session closed for room {0}")]
    SessionClosed(RoomId),

    /// Sign-out or local storage hook failed.
    #[error("auth hook failed: {0}")]
    Auth(String),
}

/// Errors from the REST backend and push endpoints.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Non-2xx response. `message` is the body's `error` field when present.
    #[error("http {status}: {message}")]
    Http {
        /// Response status code
        status: u16,
        /// Server-provided error message
        message: String,
    },

    /// Request never produced a response (connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body was not what the endpoint documents.
    #[error("decode error: {0}")]
    Decode(String),
}

impl BackendError {
    /// Returns true if retrying the request may succeed.
    ///
    /// Transport failures and 5xx responses are transient. 4xx responses
    /// mean the request itself is wrong.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status >= 500,
            Self::Transport(_) => true,
            Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
