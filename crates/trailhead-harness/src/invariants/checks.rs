//! Standard invariant checks.

use std::collections::HashSet;

use super::{ChatSnapshot, Invariant, InvariantKind, InvariantResult, Violation};

/// The view lists exactly the roster's rooms, in roster order.
pub struct RoomsMatchRoster;

impl Invariant for RoomsMatchRoster {
    fn kind(&self) -> InvariantKind {
        InvariantKind::RoomsMatchRoster
    }

    fn check(&self, state: &ChatSnapshot) -> InvariantResult {
        let view_keys: Vec<&str> = state.view.rooms.iter().map(|room| room.key.as_str()).collect();
        if view_keys != state.roster_keys {
            return Err(Violation {
                invariant: self.kind(),
                message: format!("view rooms {:?} != roster {:?}", view_keys, state.roster_keys),
            });
        }
        Ok(())
    }
}

/// No room appears twice.
pub struct UniqueRooms;

impl Invariant for UniqueRooms {
    fn kind(&self) -> InvariantKind {
        InvariantKind::UniqueRooms
    }

    fn check(&self, state: &ChatSnapshot) -> InvariantResult {
        let mut seen = HashSet::new();
        for key in &state.roster_keys {
            if !seen.insert(key) {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!("room {key} tracked twice"),
                });
            }
        }
        Ok(())
    }
}

/// Unread counts and last messages only exist for tracked rooms.
pub struct NoStaleEntries;

impl Invariant for NoStaleEntries {
    fn kind(&self) -> InvariantKind {
        InvariantKind::NoStaleEntries
    }

    fn check(&self, state: &ChatSnapshot) -> InvariantResult {
        let tracked: HashSet<&str> = state.roster_keys.iter().map(String::as_str).collect();
        let stale = state
            .view
            .unread_counts
            .keys()
            .chain(state.view.last_messages.keys())
            .find(|key| !tracked.contains(key.as_str()));
        if let Some(key) = stale {
            return Err(Violation {
                invariant: self.kind(),
                message: format!("entry for untracked room {key}"),
            });
        }
        Ok(())
    }
}

/// Without a signed-in user nothing is tracked and nothing is subscribed.
pub struct SignedOutIsEmpty;

impl Invariant for SignedOutIsEmpty {
    fn kind(&self) -> InvariantKind {
        InvariantKind::SignedOutIsEmpty
    }

    fn check(&self, state: &ChatSnapshot) -> InvariantResult {
        if state.authenticated {
            return Ok(());
        }
        let view = &state.view;
        if !state.roster_keys.is_empty()
            || !view.rooms.is_empty()
            || !view.unread_counts.is_empty()
            || !view.last_messages.is_empty()
            || state.tracker_subscriptions != 0
        {
            return Err(Violation {
                invariant: self.kind(),
                message: format!(
                    "signed out with {} rooms and {} subscriptions",
                    state.roster_keys.len(),
                    state.tracker_subscriptions
                ),
            });
        }
        Ok(())
    }
}

/// Every tracked room has both tracker subscriptions.
///
/// Only holds while the store accepts every subscription, so it is not part
/// of the standard set.
pub struct TrackerCoverage;

impl Invariant for TrackerCoverage {
    fn kind(&self) -> InvariantKind {
        InvariantKind::TrackerCoverage
    }

    fn check(&self, state: &ChatSnapshot) -> InvariantResult {
        let expected = 2 * state.roster_keys.len();
        if state.tracker_subscriptions != expected {
            return Err(Violation {
                invariant: self.kind(),
                message: format!(
                    "{} rooms but {} tracker subscriptions",
                    state.roster_keys.len(),
                    state.tracker_subscriptions
                ),
            });
        }
        Ok(())
    }
}
