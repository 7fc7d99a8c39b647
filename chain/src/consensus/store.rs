//! Chain store: persistence, fork-choice, and reorganization.
//!
//! [`BlockStore`] is the pluggable persistence backend. [`ChainStore`] wraps
//! one and owns the live [`WalletState`], adding the chain-connectivity
//! bookkeeping (common-ancestor search, replay, fork-choice) that a bare
//! key-value store has no business knowing about.

use std::collections::HashMap;

use crate::consensus::error::ConsensusError;
use crate::mempool::Mempool;
use crate::types::{Block, WalletState};

/// Abstract storage interface used by the consensus engine.
///
/// Implementations can be backed by in-memory maps, a database, etc. The
/// interface is intentionally small: consensus only needs get/put, a notion
/// of the current head, and a presence check for parent-pointer validation.
pub trait BlockStore {
    /// Fetches a block by its hex hash, if present.
    fn get_block(&self, hash: &str) -> Option<Block>;

    /// Persists a block, keyed by its own `hash` field.
    fn put_block(&mut self, block: Block);

    /// Returns `true` if a block with this hash is already stored.
    fn contains(&self, hash: &str) -> bool;

    /// Returns the hash of the current head of the active chain, if any.
    fn head(&self) -> Option<String>;

    /// Updates the current head pointer.
    fn set_head(&mut self, hash: String);
}

/// The outcome of [`ChainStore::try_set_head`] for a newly-stored block.
///
/// A typed result in place of silently rewriting an internal list: callers
/// (the consensus engine, the node's persistence layer) match on this to
/// decide whether to rebroadcast, re-persist, or just log.
#[derive(Debug, Clone, PartialEq)]
pub enum ReorgOutcome {
    /// The candidate directly extends the current head; head advanced and
    /// its transactions were removed from the mempool.
    Extended,
    /// The candidate won a fork-choice comparison against the current head;
    /// the chain was rewound to the common ancestor and replayed forward.
    /// `discarded_blocks` lists the hashes of blocks that fell off the old
    /// branch, in old-head-to-ancestor order. Their transactions were
    /// reinjected into the mempool (minus any also present on the new
    /// branch); the new branch's transactions were removed from it.
    Reorged { discarded_blocks: Vec<String> },
    /// The candidate replays cleanly but loses the fork-choice comparison
    /// (or ties); it is stored but the head pointer is untouched.
    StoredSideBranch,
    /// The candidate's branch does not replay cleanly against the ledger
    /// state at its common ancestor with the current head; it is stored
    /// (so later blocks built on it can still be evaluated) but never
    /// becomes head.
    RejectedReplayFailed,
}

/// Owns a [`BlockStore`] plus the live [`WalletState`] for the current head,
/// and implements chain connectivity, replay, and reorg.
pub struct ChainStore<S> {
    store: S,
    wallet: WalletState,
    /// The ledger as of genesis (the `initial_state` seeding table). A
    /// replay back to the empty ancestor must start here, not from an
    /// empty ledger, or ledger-replay agreement (C2) breaks for any
    /// account funded only by `initial_state` rather than a transaction.
    genesis_state: WalletState,
    /// Wallet-state snapshots at recently-active block hashes, so repeated
    /// `replay` calls during a burst of competing blocks don't re-walk from
    /// genesis every time. Bounded like a small LRU; eviction is driven by
    /// insertion order rather than access recency to keep this simple.
    snapshots: HashMap<String, WalletState>,
    snapshot_order: Vec<String>,
    max_snapshots: usize,
}

const DEFAULT_MAX_SNAPSHOTS: usize = 64;

impl<S: BlockStore> ChainStore<S> {
    /// Wraps `store`, seeding the wallet state with `genesis` already
    /// present at `head`.
    pub fn new(store: S, wallet: WalletState) -> Self {
        Self {
            store,
            genesis_state: wallet.clone(),
            wallet,
            snapshots: HashMap::new(),
            snapshot_order: Vec::new(),
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn head(&self) -> Option<String> {
        self.store.head()
    }

    pub fn head_block(&self) -> Option<Block> {
        self.head().and_then(|h| self.store.get_block(&h))
    }

    /// The ledger snapshot as of the current head.
    pub fn wallet(&self) -> &WalletState {
        &self.wallet
    }

    /// The ledger as seeded at genesis, before any block's transactions.
    /// The baseline a full replay (or an externally offered chain's
    /// validity check) must start from.
    pub fn genesis_state(&self) -> &WalletState {
        &self.genesis_state
    }

    fn cache_snapshot(&mut self, hash: String, state: WalletState) {
        if self.snapshots.contains_key(&hash) {
            return;
        }
        if self.snapshot_order.len() >= self.max_snapshots {
            if let Some(oldest) = self.snapshot_order.first().cloned() {
                self.snapshots.remove(&oldest);
                self.snapshot_order.remove(0);
            }
        }
        self.snapshot_order.push(hash.clone());
        self.snapshots.insert(hash, state);
    }

    /// Stores a block after checking B1 (recomputed hash matches the stored
    /// hash) and B2/parent-presence (genesis is exempt from both). Never
    /// touches the head pointer.
    pub fn add(&mut self, block: Block) -> Result<String, ConsensusError> {
        if !block.has_valid_hash() {
            return Err(ConsensusError::Validation(
                super::error::ValidationError::Custom("block hash does not match content".into()),
            ));
        }

        let is_genesis = block.header.index == 0 && block.header.prev_hash.is_empty();
        if !is_genesis {
            let Some(parent) = self.store.get_block(&block.header.prev_hash) else {
                return Err(ConsensusError::UnknownParent(block.header.prev_hash.clone()));
            };
            // B2: index/parent arithmetic. Only the store can check this,
            // since it is the only party that can resolve `prev_hash` to
            // the parent's own index.
            if block.header.index != parent.header.index + 1 {
                return Err(ConsensusError::Validation(super::error::ValidationError::Custom(
                    format!(
                        "block index {} does not follow parent index {}",
                        block.header.index, parent.header.index
                    ),
                )));
            }
        }

        let hash = block.hash.clone();
        self.store.put_block(block);
        Ok(hash)
    }

    /// Walks two branches back to a common ancestor: first to equal height,
    /// then lockstep until the hashes match. Returns the genesis hash in the
    /// worst case (genesis is always a common ancestor of any two blocks
    /// built on it).
    pub fn find_common_ancestor(&self, a: &str, b: &str) -> String {
        let mut a_block = self.store.get_block(a);
        let mut b_block = self.store.get_block(b);
        let mut a_hash = a.to_string();
        let mut b_hash = b.to_string();

        loop {
            let a_height = a_block.as_ref().map(|blk| blk.header.index).unwrap_or(0);
            let b_height = b_block.as_ref().map(|blk| blk.header.index).unwrap_or(0);

            if a_height > b_height {
                let parent = a_block.as_ref().unwrap().header.prev_hash.clone();
                a_hash = parent;
                a_block = self.store.get_block(&a_hash);
                continue;
            }
            if b_height > a_height {
                let parent = b_block.as_ref().unwrap().header.prev_hash.clone();
                b_hash = parent;
                b_block = self.store.get_block(&b_hash);
                continue;
            }

            if a_hash == b_hash {
                return a_hash;
            }

            match (&a_block, &b_block) {
                (Some(ab), Some(bb)) => {
                    a_hash = ab.header.prev_hash.clone();
                    b_hash = bb.header.prev_hash.clone();
                    a_block = self.store.get_block(&a_hash);
                    b_block = self.store.get_block(&b_hash);
                }
                _ => return a_hash,
            }
        }
    }

    /// Collects the chain of blocks from `from_ancestor` (exclusive) down to
    /// `to` (inclusive), in ancestor-to-tip order.
    fn path_from(&self, from_ancestor: &str, to: &str) -> Vec<Block> {
        let mut path = Vec::new();
        let mut current = to.to_string();
        while current != from_ancestor {
            let Some(block) = self.store.get_block(&current) else {
                break;
            };
            let parent = block.header.prev_hash.clone();
            path.push(block);
            current = parent;
            if current.is_empty() && from_ancestor.is_empty() {
                break;
            }
        }
        path.reverse();
        path
    }

    /// Deep-copies the ancestor's cached ledger snapshot (or replays from
    /// genesis if nothing is cached yet) and sequentially applies every
    /// intervening block's transactions, aborting on the first inapplicable
    /// transaction.
    pub fn replay(&mut self, from_ancestor: &str, to: &str) -> Result<WalletState, ConsensusError> {
        let mut state = if from_ancestor.is_empty() {
            self.genesis_state.clone()
        } else if let Some(cached) = self.snapshots.get(from_ancestor) {
            cached.clone()
        } else {
            // No cached snapshot for the ancestor: rebuild it by replaying
            // from genesis up to the ancestor, recursively.
            self.replay("", from_ancestor)?
        };

        let path = self.path_from(from_ancestor, to);
        for block in &path {
            for tx in &block.transactions {
                if !state.is_applicable(tx) {
                    return Err(ConsensusError::ReplayFailed(format!(
                        "transaction not applicable when replaying block {}",
                        block.hash
                    )));
                }
                state
                    .apply(tx)
                    .map_err(|e| ConsensusError::ReplayFailed(e.to_string()))?;
            }
            self.cache_snapshot(block.hash.clone(), state.clone());
        }

        Ok(state)
    }

    /// The full state machine of fork-choice and reorganization: given a
    /// newly-stored candidate block hash, decides whether it should become
    /// the new head.
    ///
    /// - If it directly extends the current head, the head advances.
    /// - If it is a competing branch, the two branches are compared by
    ///   `(height, hash)` — taller wins; a height tie is broken by the
    ///   lexicographically smaller hash, keeping the rule total and
    ///   deterministic across peers. If the candidate wins, the chain is
    ///   rewound to the common ancestor, replayed forward along the new
    ///   branch, and transactions discarded from the old branch are
    ///   reinjected into `mempool` (law R1).
    /// - If the candidate loses or the branch fails to replay, it stays
    ///   stored without affecting the head.
    pub fn try_set_head(&mut self, candidate_hash: &str, mempool: &mut Mempool) -> ReorgOutcome {
        let Some(candidate) = self.store.get_block(candidate_hash) else {
            return ReorgOutcome::RejectedReplayFailed;
        };

        let Some(current_head) = self.head() else {
            // No head yet: anything replayable becomes head.
            match self.replay("", candidate_hash) {
                Ok(state) => {
                    self.wallet = state;
                    self.store.set_head(candidate_hash.to_string());
                    mempool.remove_all(&candidate.transactions);
                    return ReorgOutcome::Extended;
                }
                Err(_) => return ReorgOutcome::RejectedReplayFailed,
            }
        };

        if candidate.header.prev_hash == current_head {
            let ancestor_state = self.wallet.clone();
            self.cache_snapshot(current_head.clone(), ancestor_state);
            return match self.replay(&current_head, candidate_hash) {
                Ok(state) => {
                    self.wallet = state;
                    self.store.set_head(candidate_hash.to_string());
                    mempool.remove_all(&candidate.transactions);
                    ReorgOutcome::Extended
                }
                Err(_) => ReorgOutcome::RejectedReplayFailed,
            };
        }

        let current_block = self.store.get_block(&current_head);
        let (current_height, _) = current_block
            .as_ref()
            .map(|b| (b.header.index, ()))
            .unwrap_or((0, ()));

        let candidate_wins = match candidate.header.index.cmp(&current_height) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => candidate_hash < current_head.as_str(),
        };

        if !candidate_wins {
            return ReorgOutcome::StoredSideBranch;
        }

        let ancestor = self.find_common_ancestor(&current_head, candidate_hash);
        match self.replay(&ancestor, candidate_hash) {
            Ok(new_state) => {
                let discarded_blocks = self
                    .path_from(&ancestor, &current_head)
                    .into_iter()
                    .rev()
                    .map(|b| b.hash)
                    .collect::<Vec<_>>();

                let mut discarded_txs = Vec::new();
                for hash in discarded_blocks.iter().rev() {
                    if let Some(block) = self.store.get_block(hash) {
                        discarded_txs.extend(block.transactions);
                    }
                }

                self.wallet = new_state;
                self.store.set_head(candidate_hash.to_string());

                let new_branch_txs: Vec<_> = self
                    .path_from(&ancestor, candidate_hash)
                    .into_iter()
                    .flat_map(|b| b.transactions)
                    .collect();
                let active_chain: std::collections::HashSet<_> = new_branch_txs.iter().cloned().collect();
                mempool.reinject(discarded_txs, &active_chain);
                mempool.remove_all(&new_branch_txs);

                ReorgOutcome::Reorged { discarded_blocks }
            }
            Err(_) => ReorgOutcome::RejectedReplayFailed,
        }
    }
}
