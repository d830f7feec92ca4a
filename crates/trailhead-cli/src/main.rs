//! Trailhead chat simulation.
//!
//! Runs two users chatting in a direct room against the in-memory store
//! and logs what each side ended up seeing.
//!
//! # Usage
//!
//! ```bash
//! # 50 messages, default settings
//! trailhead-sim --messages 50
//!
//! # Same run with a flaky store and store-side increments
//! trailhead-sim --messages 50 --failure-rate 0.1 --fanout atomic-increment --seed 7
//! ```

use clap::{Parser, ValueEnum};
use trailhead_client::{ClientConfig, DEFAULT_PAGE_SIZE, UnreadFanout};
use trailhead_harness::{ScenarioConfig, run_two_user_chat};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Unread counter update strategy.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Fanout {
    /// Read counters, write each plus one
    ReadModifyWrite,
    /// Store-side increments
    AtomicIncrement,
}

impl From<Fanout> for UnreadFanout {
    fn from(fanout: Fanout) -> Self {
        match fanout {
            Fanout::ReadModifyWrite => Self::ReadModifyWrite,
            Fanout::AtomicIncrement => Self::AtomicIncrement,
        }
    }
}

/// Trailhead chat simulation
#[derive(Parser, Debug)]
#[command(name = "trailhead-sim")]
#[command(about = "Simulate two users chatting over the Trailhead chat layer")]
#[command(version)]
struct Args {
    /// Messages to send in total
    #[arg(short, long, default_value = "20")]
    messages: usize,

    /// Seed for sender choice and fault injection
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Share of store calls that fail (0.0 to 1.0)
    #[arg(long, default_value = "0.0")]
    failure_rate: f64,

    /// Messages per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Unread counter update strategy
    #[arg(long, value_enum, default_value = "read-modify-write")]
    fanout: Fanout,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = ScenarioConfig {
        messages: args.messages,
        seed: args.seed,
        failure_rate: args.failure_rate,
        client: ClientConfig {
            page_size: args.page_size,
            unread_fanout: args.fanout.into(),
            ..ClientConfig::default()
        },
    };
    tracing::info!(
        "simulating {} messages (seed {}, failure rate {}, {:?})",
        config.messages,
        config.seed,
        config.failure_rate,
        args.fanout
    );

    let report = run_two_user_chat(&config).await;

    tracing::info!("sent {} messages, {} failed", report.sent, report.failed_sends);
    tracing::info!("store holds {} messages", report.stored_messages);
    tracing::info!(
        "alice sees {} messages, {} unread",
        report.alice_displayed,
        report.alice_unread
    );
    tracing::info!("bob sees {} messages, {} unread", report.bob_displayed, report.bob_unread);
    if report.injected_failures > 0 {
        tracing::info!("injected {} store failures", report.injected_failures);
    }
    if report.listeners_after_logout > 0 {
        tracing::warn!("{} subscriptions survived logout", report.listeners_after_logout);
    }

    if !report.violations.is_empty() {
        for violation in &report.violations {
            tracing::error!("{}", violation);
        }
        return Err(format!("{} invariant violations", report.violations.len()).into());
    }
    Ok(())
}
