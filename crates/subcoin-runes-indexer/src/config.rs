use bitcoin::Network;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Rune indexer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Network the node is expected to run on.
    pub network: Network,
    /// Delay between two update passes.
    pub poll_interval_ms: u64,
    /// Whether to seed storage with `UNCOMMON•GOODS` on start.
    pub seed_genesis_rune: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            seed_genesis_rune: true,
        }
    }
}

impl IndexerConfig {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            ..Default::default()
        }
    }

    /// Poll interval, never shorter than one millisecond.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
