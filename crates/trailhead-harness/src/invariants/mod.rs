//! Invariant checking over chat state.
//!
//! Invariants are properties that must hold after every operation on a
//! [`trailhead_client::ChatContext`], whatever sequence of sign-ins, profile
//! refreshes, removals and teardowns led there.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! registry.assert_all(&ChatSnapshot::from_context(&context), "after removal");
//! ```

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{
    NoStaleEntries, RoomsMatchRoster, SignedOutIsEmpty, TrackerCoverage, UniqueRooms,
};
pub use snapshot::ChatSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Which invariant was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantKind {
    /// [`RoomsMatchRoster`]
    RoomsMatchRoster,
    /// [`UniqueRooms`]
    UniqueRooms,
    /// [`NoStaleEntries`]
    NoStaleEntries,
    /// [`SignedOutIsEmpty`]
    SignedOutIsEmpty,
    /// [`TrackerCoverage`]
    TrackerCoverage,
}

impl fmt::Display for InvariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RoomsMatchRoster => "rooms-match-roster",
            Self::UniqueRooms => "unique-rooms",
            Self::NoStaleEntries => "no-stale-entries",
            Self::SignedOutIsEmpty => "signed-out-is-empty",
            Self::TrackerCoverage => "tracker-coverage",
        };
        f.write_str(name)
    }
}

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Violated invariant.
    pub invariant: InvariantKind,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property checked against a [`ChatSnapshot`].
pub trait Invariant: Send + Sync {
    /// Which invariant this is.
    fn kind(&self) -> InvariantKind;

    /// `Ok(())` if the invariant holds.
    fn check(&self, state: &ChatSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Invariants that hold under any store behavior:
    /// [`RoomsMatchRoster`], [`UniqueRooms`], [`NoStaleEntries`] and
    /// [`SignedOutIsEmpty`].
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(RoomsMatchRoster);
        registry.add(UniqueRooms);
        registry.add(NoStaleEntries);
        registry.add(SignedOutIsEmpty);
        registry
    }

    /// [`Self::standard`] plus [`TrackerCoverage`], for fault-free stores.
    pub fn strict() -> Self {
        let mut registry = Self::standard();
        registry.add(TrackerCoverage);
        registry
    }

    /// Add an invariant.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants, collecting every violation.
    pub fn check_all(&self, state: &ChatSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &ChatSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether no invariant is registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
