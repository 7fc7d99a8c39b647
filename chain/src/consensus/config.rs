use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, WalletAccount};

/// Consensus configuration parameters.
///
/// This includes protocol-level knobs (target block time, vote quorum),
/// implementation-level limits (max transactions per block), and the
/// initial ledger seeding table. It is `Deserialize` so a node can load it
/// directly from its on-disk TOML configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Target block time in seconds for the simulator.
    pub block_time_secs: u64,
    /// Soft limit on the number of transactions per block.
    pub max_block_txs: usize,
    /// Soft limit on the total serialized size of a block, in bytes.
    pub max_block_size_bytes: usize,
    /// Whether to allow empty blocks when the transaction pool is empty.
    pub allow_empty_blocks: bool,
    /// How long to wait for `SYNC_RESPONSE`s before giving up on a sync round.
    pub sync_timeout_secs: u64,
    /// Whether forged blocks must clear a vote quorum before becoming head.
    pub vote_enabled: bool,
    /// How long a candidate block waits for votes before being discarded.
    pub vote_timeout_secs: u64,
    /// Fraction (0.0-1.0) of known validators required to reach quorum.
    pub vote_threshold: f64,
    /// Interval between automatic forging attempts (`STEP` ticks).
    pub step_interval_secs: u64,
    /// Initial account balances/stakes, applied to a fresh ledger at genesis.
    pub initial_state: HashMap<AccountId, WalletAccount>,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            block_time_secs: 5,
            max_block_txs: 10_000,
            max_block_size_bytes: 1_000_000,
            allow_empty_blocks: true,
            sync_timeout_secs: 10,
            vote_enabled: false,
            vote_timeout_secs: 5,
            vote_threshold: 0.5,
            step_interval_secs: 5,
            initial_state: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_voting_disabled() {
        let cfg = ConsensusConfig::default();
        assert!(!cfg.vote_enabled);
        assert!(cfg.initial_state.is_empty());
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let cfg = ConsensusConfig::default();
        let text = toml::to_string(&cfg).expect("serialize config");
        let back: ConsensusConfig = toml::from_str(&text).expect("deserialize config");
        assert_eq!(back.block_time_secs, cfg.block_time_secs);
        assert_eq!(back.vote_threshold, cfg.vote_threshold);
    }
}
