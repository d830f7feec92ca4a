//! Trailhead chat core
//!
//! Domain types shared by the chat sync layer and its test harness. Nothing
//! in this crate performs I/O: the remote document store is described by the
//! [`DocumentStore`] trait and implemented elsewhere.
//!
//! # Components
//!
//! - [`room`]: room identity ([`direct_room_id`], [`Room`])
//! - [`Message`]: decoded chat messages and their ordering
//! - [`document`]: paths, field writes and queries of the document store
//! - [`DocumentStore`]: the store capability, with [`Subscription`] handles
//! - [`Profile`]: the authenticated user's chat-relevant profile

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod document;
mod error;
mod message;
mod profile;
pub mod room;
mod store;
mod subscription;

pub use document::{
    Cursor, DocPath, Document, FieldValue, Fields, ParticipantMap, Query, participant_field,
};
pub use error::StoreError;
pub use message::{Message, NewMessage, Timestamp};
pub use profile::{ChatPartner, GroupMembership, Profile};
pub use room::{Room, RoomId, RoomKind, UserId, direct_room_id, group_room_id};
pub use store::{DocumentCallback, DocumentStore, QueryCallback, SharedStore};
pub use subscription::{Subscription, lock};
