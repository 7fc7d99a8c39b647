//! Block proposal logic.
//!
//! The proposer is responsible for assembling a candidate block on top of
//! the current head, given a drained batch of transactions from the
//! mempool and the elected validator for this round.

use crate::types::{AccountId, Block, BlockHeader, Transaction, WalletState};

use super::config::ConsensusConfig;

/// Abstract transaction pool interface.
///
/// The engine does not care how transactions are stored or gossiped; it
/// only needs a way to ask for a batch that fits into a block and is
/// applicable against the wallet state it would be built on top of.
pub trait TxPool {
    /// Selects a batch of transactions for inclusion in a block, respecting
    /// `max_txs`/`max_bytes` as soft limits and skipping (never aborting
    /// on) any transaction not applicable against `wallet`.
    fn select_for_block(&mut self, max_txs: usize, max_bytes: usize, wallet: &WalletState) -> Vec<Transaction>;
}

/// Configurable block proposer.
///
/// Stateless with respect to the chain; it is handed the parent's index,
/// hash, and ledger state at call time.
#[derive(Clone, Debug)]
pub struct Proposer {
    pub max_block_txs: usize,
    pub max_block_size_bytes: usize,
    pub allow_empty_blocks: bool,
}

impl Proposer {
    pub fn from_config(cfg: &ConsensusConfig) -> Self {
        Self {
            max_block_txs: cfg.max_block_txs,
            max_block_size_bytes: cfg.max_block_size_bytes,
            allow_empty_blocks: cfg.allow_empty_blocks,
        }
    }

    /// Builds a new block on top of `(parent_index, parent_hash)`, drawing
    /// transactions from `tx_pool` against `wallet`. Returns `None` if the
    /// pool drained empty and empty blocks are disallowed.
    ///
    /// This does not validate or persist the block; callers pass the
    /// result into [`crate::consensus::store::ChainStore::add`].
    pub fn build_block<P: TxPool>(
        &self,
        parent_index: u64,
        parent_hash: &str,
        validator: AccountId,
        tx_pool: &mut P,
        wallet: &WalletState,
        timestamp: f64,
    ) -> Option<Block> {
        let txs = tx_pool.select_for_block(self.max_block_txs, self.max_block_size_bytes, wallet);

        if txs.is_empty() && !self.allow_empty_blocks {
            return None;
        }

        let header = BlockHeader {
            index: parent_index + 1,
            prev_hash: parent_hash.to_string(),
            validator,
            timestamp,
        };

        let mut block = Block { header, transactions: txs, hash: String::new() };
        block.hash = block.compute_hash();
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposer_from_config_copies_limits() {
        let cfg = ConsensusConfig {
            max_block_txs: 1234,
            max_block_size_bytes: 512_000,
            allow_empty_blocks: false,
            ..ConsensusConfig::default()
        };

        let p = Proposer::from_config(&cfg);

        assert_eq!(p.max_block_txs, cfg.max_block_txs);
        assert_eq!(p.max_block_size_bytes, cfg.max_block_size_bytes);
        assert_eq!(p.allow_empty_blocks, cfg.allow_empty_blocks);
    }

    struct EmptyPool;
    impl TxPool for EmptyPool {
        fn select_for_block(&mut self, _max_txs: usize, _max_bytes: usize, _wallet: &WalletState) -> Vec<Transaction> {
            Vec::new()
        }
    }

    #[test]
    fn build_block_returns_none_when_empty_blocks_disallowed() {
        let cfg = ConsensusConfig { allow_empty_blocks: false, ..ConsensusConfig::default() };
        let p = Proposer::from_config(&cfg);
        let wallet = WalletState::new();
        let mut pool = EmptyPool;

        let block = p.build_block(0, "genesis", AccountId::new("node1"), &mut pool, &wallet, 1.0);
        assert!(block.is_none());
    }

    #[test]
    fn build_block_sets_index_and_parent() {
        let cfg = ConsensusConfig::default();
        let p = Proposer::from_config(&cfg);
        let wallet = WalletState::new();
        let mut pool = EmptyPool;

        let block = p
            .build_block(3, "parenthash", AccountId::new("node1"), &mut pool, &wallet, 1.0)
            .expect("empty blocks allowed by default");
        assert_eq!(block.header.index, 4);
        assert_eq!(block.header.prev_hash, "parenthash");
        assert!(block.has_valid_hash());
    }
}
