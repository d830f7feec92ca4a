//! Seeded two-user chat scenario.
//!
//! Alice and Bob share a direct room. Each step a seeded RNG picks who
//! sends next; afterwards the stored counters, both views and both message
//! lists are collected into a [`ScenarioReport`]. The same seed always
//! produces the same run, chaos included.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use trailhead_client::{AuthUser, ChatContext, ClientConfig, RoomTarget};
use trailhead_core::{ChatPartner, Profile, SharedStore, UserId, direct_room_id};

use crate::{ChaoticStore, ChatSnapshot, FakeBackend, InvariantRegistry, MemoryStore, Violation};

/// Scenario parameters.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Messages to send in total.
    pub messages: usize,
    /// RNG seed for sender choice and fault injection.
    pub seed: u64,
    /// Share of store calls that fail (0.0 to 1.0).
    pub failure_rate: f64,
    /// Client configuration for both users.
    pub client: ClientConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self { messages: 10, seed: 0, failure_rate: 0.0, client: ClientConfig::default() }
    }
}

/// What a scenario run observed.
#[derive(Debug, Clone, Default)]
pub struct ScenarioReport {
    /// Sends that returned a message id.
    pub sent: usize,
    /// Sends that returned an error.
    pub failed_sends: usize,
    /// Messages in the store afterwards.
    pub stored_messages: usize,
    /// Messages Alice's session displays.
    pub alice_displayed: usize,
    /// Messages Bob's session displays.
    pub bob_displayed: usize,
    /// Alice's stored unread counter.
    pub alice_unread: u64,
    /// Bob's stored unread counter.
    pub bob_unread: u64,
    /// Alice's tab badge.
    pub alice_badge: u64,
    /// Bob's tab badge.
    pub bob_badge: u64,
    /// Store calls failed on purpose.
    pub injected_failures: usize,
    /// Store subscriptions still open after both users logged out.
    pub listeners_after_logout: usize,
    /// Invariant violations seen along the way.
    pub violations: Vec<Violation>,
}

fn profile(id: &str, name: &str, partner: &str) -> Profile {
    let mut profile = Profile::new(id, UserId::new(format!("uid-{id}")), name);
    profile.chatrooms_with =
        vec![ChatPartner {
            id: partner.to_string(),
            auth_id: UserId::new(format!("uid-{partner}")),
        }];
    profile
}

/// Run the scenario against a fresh in-memory store.
pub async fn run_two_user_chat(config: &ScenarioConfig) -> ScenarioReport {
    let memory = MemoryStore::new();
    let chaos = (config.failure_rate > 0.0)
        .then(|| ChaoticStore::with_seed(memory.clone(), config.failure_rate, config.seed));
    let store: SharedStore = match &chaos {
        Some(chaos) => Arc::new(chaos.clone()),
        None => memory.shared(),
    };

    let alice = profile("alice", "Alice", "bob");
    let bob = profile("bob", "Bob", "alice");
    let room_id = direct_room_id(&alice.auth_id, &bob.auth_id);

    let mut contexts = Vec::new();
    for user in [&alice, &bob] {
        let mut context = ChatContext::new(Arc::clone(&store), config.client.clone())
            .with_backend(FakeBackend::new());
        context
            .set_auth(Some(AuthUser { profile: user.clone(), token: format!("token-{}", user.id) }))
            .await;
        contexts.push(context);
    }

    let mut report = ScenarioReport::default();
    let invariants = InvariantRegistry::standard();
    let check = |contexts: &[ChatContext], report: &mut ScenarioReport| {
        for context in contexts {
            if let Err(violations) = invariants.check_all(&ChatSnapshot::from_context(context)) {
                report.violations.extend(violations);
            }
        }
    };

    let mut sessions = Vec::new();
    for (context, partner) in contexts.iter().zip([&bob, &alice]) {
        let target = RoomTarget::Direct { partner: partner.auth_id.clone() };
        match context.open_room(&target).await {
            Ok(session) => sessions.push(session),
            Err(e) => {
                tracing::warn!("opening room failed: {}", e);
                return report;
            },
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    for n in 1..=config.messages {
        let sender = usize::from(rng.gen_bool(0.5));
        match sessions[sender].send_message(&format!("step {n}")).await {
            Ok(_) => report.sent += 1,
            Err(e) => {
                tracing::debug!("send {} failed: {}", n, e);
                report.failed_sends += 1;
            },
        }
        check(&contexts, &mut report);
    }

    report.stored_messages = memory.messages(&room_id).len();
    report.alice_displayed = sessions[0].messages().len();
    report.bob_displayed = sessions[1].messages().len();
    let counters = memory.participants(&room_id).unwrap_or_default();
    report.alice_unread = counters.get(&alice.auth_id).copied().unwrap_or(0);
    report.bob_unread = counters.get(&bob.auth_id).copied().unwrap_or(0);
    report.alice_badge = contexts[0].view().total_unread();
    report.bob_badge = contexts[1].view().total_unread();

    drop(sessions);
    for context in &mut contexts {
        context.logout().await;
    }
    check(&contexts, &mut report);

    report.injected_failures = chaos.as_ref().map_or(0, ChaoticStore::failure_count);
    report.listeners_after_logout = memory.listener_count();
    report
}
