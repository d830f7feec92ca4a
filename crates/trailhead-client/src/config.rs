//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Number of messages a room session loads per page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// How a sender bumps the other participants' unread counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnreadFanout {
    /// Read the participant map, then write every other counter plus one.
    ///
    /// Two senders racing on the same room can both read the same base value,
    /// so one increment is lost. Kept as default for parity with the mobile
    /// client's behavior.
    #[default]
    ReadModifyWrite,
    /// Read the participant list, then ask the store to increment each
    /// counter. Concurrent sends never lose an increment.
    AtomicIncrement,
}

/// REST backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL without trailing slash (e.g., `https://api.example.org`).
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:3000".to_string(), timeout: Duration::from_secs(10) }
    }
}

/// Chat client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Messages per page for the initial load and for older pages.
    pub page_size: usize,
    /// Unread counter update strategy on send.
    pub unread_fanout: UnreadFanout,
    /// REST backend settings.
    pub backend: BackendConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            unread_fanout: UnreadFanout::default(),
            backend: BackendConfig::default(),
        }
    }
}
