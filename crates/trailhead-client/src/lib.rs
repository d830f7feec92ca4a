//! Trailhead chat client
//!
//! The chat sync layer of the Trailhead app: keeps the list of chat rooms,
//! their unread counters and latest messages live from a remote document
//! store, and drives individual room sessions.
//!
//! # Architecture
//!
//! Everything for one signed-in session hangs off a [`ChatContext`]:
//!
//! - [`RoomRoster`]: rooms derived from the profile, merged additively
//! - [`UnreadTracker`] and [`LastMessageTracker`]: one live subscription per
//!   room, writing into the shared [`ChatView`]
//! - [`SubscriptionRegistry`]: every live subscription, torn down together
//! - [`ChatRoomSession`]: one open room (history, live tail, sending)
//!
//! The store is reached through [`trailhead_core::DocumentStore`]; the REST
//! backend through [`ChatBackend`]; push delivery through
//! [`PushDispatcher`]. None of them are implemented against a concrete
//! vendor SDK here, so the whole layer runs against in-memory fakes in tests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod backend;
mod config;
mod context;
mod error;
mod last_message;
mod push;
mod registry;
mod roster;
mod session;
mod unread;
mod view;

pub use backend::{ChatBackend, ChatTarget, HttpBackend};
pub use config::{BackendConfig, ClientConfig, DEFAULT_PAGE_SIZE, UnreadFanout};
pub use context::{AuthUser, ChatContext, SessionHooks};
pub use error::{BackendError, ChatError};
pub use last_message::LastMessageTracker;
pub use push::{HttpPushDispatcher, PushDispatcher, PushNotification};
pub use registry::SubscriptionRegistry;
pub use roster::{RoomRoster, derive_rooms};
pub use session::{ChatRoomSession, PendingMessage, RoomTarget, SessionState};
pub use unread::UnreadTracker;
pub use view::{ChatView, NoopObserver, SharedView, ViewObserver};
