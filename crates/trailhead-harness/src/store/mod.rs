//! Document store implementations for tests and simulation.
//!
//! - [`MemoryStore`]: live in-memory store, the base of everything else
//! - [`ChaoticStore`]: random failure injection
//! - [`RecordingStore`]: records writes, can hold updates in flight
//! - [`YieldingStore`]: yields after reads to expose read-modify-write races

mod chaotic;
mod memory;
mod recording;
mod yielding;

pub use chaotic::ChaoticStore;
pub use memory::MemoryStore;
pub use recording::{RecordingStore, WriteCall, WriteKind};
pub use yielding::YieldingStore;
