//! Test and simulation harness for the Trailhead chat layer.
//!
//! The client never talks to a concrete store, backend or push gateway.
//! This crate provides in-process implementations of all three, plus the
//! tools the integration tests are built from.
//!
//! # Stores
//!
//! [`MemoryStore`] is a live document store with synchronous delivery.
//! Wrappers layer behavior on top of any store: [`ChaoticStore`] injects
//! seeded failures, [`RecordingStore`] records writes and can hold updates
//! in flight, [`YieldingStore`] yields after reads so concurrent senders
//! interleave.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties of a [`ChatSnapshot`] that must
//! hold after every operation. Use [`InvariantRegistry::standard()`] under
//! faults and [`InvariantRegistry::strict()`] otherwise.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod fakes;
pub mod invariants;
pub mod scenario;
pub mod store;

pub use fakes::{BackendCall, FakeBackend, FakeHooks, RecordingPush};
pub use invariants::{
    ChatSnapshot, Invariant, InvariantKind, InvariantRegistry, InvariantResult, NoStaleEntries,
    RoomsMatchRoster, SignedOutIsEmpty, TrackerCoverage, UniqueRooms, Violation,
};
pub use scenario::{ScenarioConfig, ScenarioReport, run_two_user_chat};
pub use store::{ChaoticStore, MemoryStore, RecordingStore, WriteCall, WriteKind, YieldingStore};
