//! Bootstrap chain sync.
//!
//! Collects candidate chains offered by peers within a deadline and picks
//! the longest one that replays cleanly from genesis, the same replay
//! machinery [`crate::consensus::store::ChainStore::replay`] uses for fork
//! reorgs, so "validate a chain" has exactly one code path whether it is
//! reached via a live reorg or a cold-start sync.
//!
//! Expiry here never mutates anything itself: it only reports which peers
//! timed out, leaving the caller to enqueue that as a timeout event on the
//! single-threaded consensus loop.

use std::collections::HashMap;
use std::time::Instant;

use crate::consensus::store::{BlockStore, ChainStore};
use crate::types::{Block, WalletState};

/// Collects in-flight sync responses and picks a winner once the round is
/// complete or the deadline passes.
#[derive(Default)]
pub struct SyncEngine {
    responses: HashMap<String, Vec<Block>>,
    deadline: Option<Instant>,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) a sync round with the given deadline.
    pub fn begin(&mut self, deadline: Instant) {
        self.responses.clear();
        self.deadline = Some(deadline);
    }

    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    /// Records a peer's offered chain for this round.
    pub fn record_response(&mut self, peer_id: String, chain: Vec<Block>) {
        self.responses.insert(peer_id, chain);
    }

    /// Returns `true` if the round's deadline has passed.
    pub fn has_expired(&self, now: Instant) -> bool {
        self.deadline.map(|d| now >= d).unwrap_or(false)
    }

    /// Returns `true` iff a round is active and its deadline has passed.
    /// Distinct from [`SyncEngine::has_expired`] in that it also checks
    /// `is_active`, so a timer task can safely poll this without first
    /// checking whether a round is even running.
    pub fn round_expired(&self, now: Instant) -> bool {
        self.is_active() && self.has_expired(now)
    }

    /// Ends the round, returning the collected responses and clearing
    /// internal state.
    pub fn finish(&mut self) -> Vec<Vec<Block>> {
        self.deadline = None;
        self.responses.drain().map(|(_, chain)| chain).collect()
    }

    /// Replays every candidate chain from a fresh genesis ledger and keeps
    /// the longest one that replays cleanly, preferring the local chain on
    /// a tie (idempotency: a sync round that finds nothing better than what
    /// is already active must not perturb the running node).
    pub fn choose_longest_valid<S: BlockStore>(
        &self,
        local: &ChainStore<S>,
        responses: &[Vec<Block>],
    ) -> Option<Vec<Block>> {
        let local_len = local_chain_len(local);
        let mut best: Option<Vec<Block>> = None;

        for candidate in responses {
            if candidate.len() <= local_len {
                continue;
            }
            if let Some(current_best) = &best {
                if candidate.len() <= current_best.len() {
                    continue;
                }
            }
            if replays_cleanly(candidate, local.genesis_state()) {
                best = Some(candidate.clone());
            }
        }

        best
    }
}

fn local_chain_len<S: BlockStore>(local: &ChainStore<S>) -> usize {
    let mut count = 0usize;
    let mut current = local.head();
    while let Some(hash) = current {
        let Some(block) = local.store().get_block(&hash) else {
            break;
        };
        count += 1;
        if block.header.prev_hash.is_empty() {
            break;
        }
        current = Some(block.header.prev_hash);
    }
    count
}

/// Replays a standalone candidate chain (ordered genesis-to-tip) against the
/// genesis-seeded ledger, returning `true` iff every block applies cleanly.
fn replays_cleanly(chain: &[Block], genesis_state: &WalletState) -> bool {
    let mut state = genesis_state.clone();
    for block in chain {
        if !block.has_valid_hash() {
            return false;
        }
        for tx in &block.transactions {
            if !state.is_applicable(tx) {
                return false;
            }
            if state.apply(tx).is_err() {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, BlockHeader, Transaction, TxKind};

    fn block(index: u64, prev_hash: &str, txs: Vec<Transaction>) -> Block {
        let header = BlockHeader {
            index,
            prev_hash: prev_hash.to_string(),
            validator: AccountId::new("node1"),
            timestamp: 1_700_000_000.0 + index as f64,
        };
        let mut b = Block { header, transactions: txs, hash: String::new() };
        b.hash = b.compute_hash();
        b
    }

    #[test]
    fn replays_cleanly_detects_bad_transaction() {
        let genesis = Block::genesis();
        let bad_tx = Transaction {
            sender: AccountId::new("a"),
            receiver: AccountId::new("b"),
            amount: 100.0,
            timestamp: 1.0,
            kind: TxKind::Transfer,
        };
        let b1 = block(1, &genesis.hash, vec![bad_tx]);

        assert!(!replays_cleanly(&[genesis, b1], &WalletState::new()));
    }

    #[test]
    fn replays_cleanly_accepts_valid_chain() {
        let genesis = Block::genesis();
        let b1 = block(1, &genesis.hash, vec![]);
        assert!(replays_cleanly(&[genesis, b1], &WalletState::new()));
    }

    #[test]
    fn sync_round_tracks_expiry() {
        let mut sync = SyncEngine::new();
        let past = Instant::now() - std::time::Duration::from_secs(1);
        sync.begin(past);
        assert!(sync.has_expired(Instant::now()));
    }
}
