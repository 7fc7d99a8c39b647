//! High-level consensus engine orchestration.
//!
//! The consensus engine wires together a [`ChainStore`], a [`Mempool`], an
//! optional [`VoteTracker`], a [`SyncEngine`], and a [`ConsensusConfig`].
//! Its single entry point, [`ConsensusEngine::handle`], is a tagged-union
//! match over every inbound message kind: one arm per [`InboundMessage`]
//! variant, each returning the [`OutboundMessage`]s the caller (the node's
//! transport layer) should broadcast. Forging is a separate method,
//! [`ConsensusEngine::try_forge`], called either on a `Step` message or an
//! explicit forced-forge command.

use std::time::Instant;

use crate::consensus::config::ConsensusConfig;
use crate::consensus::election::elect;
use crate::consensus::error::ConsensusError;
use crate::consensus::proposer::{Proposer, TxPool};
use crate::consensus::store::{BlockStore, ChainStore, ReorgOutcome};
use crate::consensus::sync::SyncEngine;
use crate::consensus::validity::{BlockValidator, StructuralValidity};
use crate::consensus::vote::{VoteOutcome, VoteTracker};
use crate::mempool::Mempool;
use crate::types::{AccountId, Block, Transaction};

/// A message the engine consumes. One variant per spec.md wire message plus
/// the two side-channel timeout events that the single-threaded loop
/// enqueues itself rather than ever mutating state from a timer callback.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// A candidate block received from a peer (or proposed locally).
    Block(Block),
    /// A transaction received from a peer or the local REPL.
    Transaction(Transaction),
    /// Server-driven forging tick: forge iff the election at the current
    /// head selects this node's own id.
    Step,
    /// A vote for a pending block, from `voter`.
    Vote { voter: AccountId, block_hash: String },
    /// A peer is requesting our full chain.
    SyncRequest { from: AccountId },
    /// A peer's offered chain, collected during an active sync round.
    SyncResponse { from: AccountId, chain: Vec<Block> },
    /// The active sync round's deadline has passed.
    SyncTimeout,
    /// A pending vote's deadline has passed.
    VoteTimeout,
    /// Local `forge --force`: bypasses the election check but still
    /// produces a structurally valid block through the normal path.
    ForceForge,
}

/// A message the engine wants the transport layer to broadcast or route.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Gossip a transaction this node accepted into its mempool for the
    /// first time (local submission or first relay from a peer).
    Transaction(Transaction),
    /// Broadcast a newly forged or newly accepted block.
    Block(Block),
    /// Broadcast this node's vote for a pending block.
    Vote { voter: AccountId, block_hash: String },
    /// Broadcast a sync request (fan-out to every peer).
    SyncRequest,
    /// Send our full chain back to a specific requester.
    SyncResponse { to: AccountId, chain: Vec<Block> },
}

/// Composes the chain store, mempool, optional vote tracker, and sync
/// engine behind the single entry point the consensus loop drives.
pub struct ConsensusEngine<S: BlockStore> {
    pub config: ConsensusConfig,
    self_id: AccountId,
    chain: ChainStore<S>,
    mempool: Mempool,
    votes: Option<VoteTracker>,
    sync: SyncEngine,
    validator: StructuralValidity,
    proposer: Proposer,
}

impl<S: BlockStore> ConsensusEngine<S> {
    /// Creates a new engine. `store` must already contain the genesis block
    /// as produced by [`Block::genesis`]; callers typically call
    /// [`Block::genesis`] and [`ChainStore::add`]/`try_set_head` themselves
    /// before constructing the engine, or use [`ConsensusEngine::bootstrap`].
    pub fn new(self_id: AccountId, config: ConsensusConfig, chain: ChainStore<S>) -> Self {
        let proposer = Proposer::from_config(&config);
        let votes = if config.vote_enabled { Some(VoteTracker::new()) } else { None };
        Self {
            config,
            self_id,
            chain,
            mempool: Mempool::new(),
            votes,
            sync: SyncEngine::new(),
            validator: StructuralValidity::new(),
            proposer,
        }
    }

    /// Builds a fresh engine seeded with a genesis block and the
    /// configuration's `initial_state` ledger.
    pub fn bootstrap(self_id: AccountId, config: ConsensusConfig, mut store: S) -> Result<Self, ConsensusError> {
        let genesis = Block::genesis();
        let genesis_hash = genesis.hash.clone();
        store.put_block(genesis);
        store.set_head(genesis_hash);

        let wallet = crate::types::WalletState::seeded(config.initial_state.clone());
        let chain = ChainStore::new(store, wallet);
        Ok(Self::new(self_id, config, chain))
    }

    /// Rebuilds an engine from a persisted chain (ordered genesis-to-tip),
    /// replaying every block through [`ChainStore::add`]/`try_set_head` to
    /// reconstruct the ledger and head pointer. Falls back to a fresh
    /// genesis-only chain if `persisted` is empty.
    pub fn from_persisted_chain(self_id: AccountId, config: ConsensusConfig, store: S, persisted: Vec<Block>) -> Self {
        let wallet = crate::types::WalletState::seeded(config.initial_state.clone());
        let mut chain = ChainStore::new(store, wallet);
        let mut scratch = Mempool::new();

        let blocks = if persisted.is_empty() { vec![Block::genesis()] } else { persisted };
        for block in blocks {
            if chain.add(block.clone()).is_ok() {
                chain.try_set_head(&block.hash, &mut scratch);
            }
        }

        Self::new(self_id, config, chain)
    }

    pub fn chain(&self) -> &ChainStore<S> {
        &self.chain
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn head(&self) -> Option<String> {
        self.chain.head()
    }

    /// `true` iff an active sync round's deadline has passed. A timer task
    /// can poll this without touching engine state, and only enqueue a
    /// [`InboundMessage::SyncTimeout`] once it returns `true`.
    pub fn sync_round_expired(&self, now: Instant) -> bool {
        self.sync.round_expired(now)
    }

    /// `true` iff at least one pending vote candidate's deadline has
    /// passed. Mirrors [`ConsensusEngine::sync_round_expired`] for the vote
    /// timer.
    pub fn vote_round_expired(&self, now: Instant) -> bool {
        self.votes.as_ref().is_some_and(|tracker| tracker.has_any_expired(now))
    }

    /// The engine's single entry point: one match arm per message kind.
    pub fn handle(&mut self, msg: InboundMessage, now: Instant) -> Vec<OutboundMessage> {
        match msg {
            InboundMessage::Block(block) => self.on_block(block),
            InboundMessage::Transaction(tx) => {
                // Only gossip onward the first time we see this transaction;
                // a duplicate insert means it has already been forwarded.
                if self.mempool.insert(tx.clone()) {
                    vec![OutboundMessage::Transaction(tx)]
                } else {
                    Vec::new()
                }
            }
            InboundMessage::Step => self.on_step(now),
            InboundMessage::Vote { voter, block_hash } => self.on_vote(voter, &block_hash),
            InboundMessage::SyncRequest { from } => {
                vec![OutboundMessage::SyncResponse { to: from, chain: self.active_chain() }]
            }
            InboundMessage::SyncResponse { from, chain } => {
                self.sync.record_response(from.0, chain);
                Vec::new()
            }
            InboundMessage::SyncTimeout => self.on_sync_timeout(),
            InboundMessage::VoteTimeout => {
                if let Some(tracker) = &mut self.votes {
                    tracker.expire(now);
                }
                Vec::new()
            }
            InboundMessage::ForceForge => self.on_step_or_force(now, true),
        }
    }

    /// §4.4: a freshly-received or freshly-forged block is added to the
    /// store, then run through fork-choice. If voting is enabled, instead
    /// of installing directly the block becomes a pending candidate and
    /// this node casts its own vote for it (iff it would pass validity).
    fn on_block(&mut self, block: Block) -> Vec<OutboundMessage> {
        if let Err(_e) = self.validator.validate(&block) {
            return Vec::new();
        }

        // A block gossips back to its own sender and bounces between every
        // other peer that already has it; re-registering it as a fresh
        // candidate each time would wipe the votes already collected for its
        // hash, and re-broadcasting it each time would never stop.
        let already_known = self.chain.store().contains(&block.hash);

        if self.chain.add(block.clone()).is_err() {
            return Vec::new();
        }

        if let Some(tracker) = &mut self.votes {
            let hash = block.hash.clone();
            let mut out = Vec::new();
            if !already_known {
                let deadline = Instant::now() + std::time::Duration::from_secs(self.config.vote_timeout_secs);
                tracker.register_candidate(block.clone(), deadline);
                out.push(OutboundMessage::Block(block));
            }

            if self.chain.wallet().has_stake(&self.self_id) {
                let known = self.chain.wallet().known_validators().len();
                let outcome = tracker.cast_vote(self.self_id.clone(), &hash, known, self.config.vote_threshold);
                if outcome != VoteOutcome::DuplicateIgnored {
                    out.push(OutboundMessage::Vote { voter: self.self_id.clone(), block_hash: hash.clone() });
                }
                if outcome == VoteOutcome::QuorumReached {
                    out.extend(self.install_candidate(&hash));
                }
            }
            out
        } else {
            let outcome = self.chain.try_set_head(&block.hash, &mut self.mempool);
            match outcome {
                ReorgOutcome::Extended | ReorgOutcome::Reorged { .. } => vec![OutboundMessage::Block(block)],
                _ => Vec::new(),
            }
        }
    }

    fn on_vote(&mut self, voter: AccountId, block_hash: &str) -> Vec<OutboundMessage> {
        let known = self.chain.wallet().known_validators().len();
        let threshold = self.config.vote_threshold;
        let Some(tracker) = &mut self.votes else {
            return Vec::new();
        };
        let outcome = tracker.cast_vote(voter, block_hash, known, threshold);
        if outcome == VoteOutcome::QuorumReached {
            self.install_candidate(block_hash)
        } else {
            Vec::new()
        }
    }

    fn install_candidate(&mut self, block_hash: &str) -> Vec<OutboundMessage> {
        let Some(tracker) = &mut self.votes else { return Vec::new() };
        if tracker.take_candidate(block_hash).is_none() {
            return Vec::new();
        }
        // The block was already broadcast to peers on first receipt above
        // (`on_block`'s `!already_known` branch), and every peer reaches
        // this same quorum independently from the votes gossiped in the
        // meantime, so there is nothing left to announce here.
        self.chain.try_set_head(block_hash, &mut self.mempool);
        Vec::new()
    }

    fn on_step(&mut self, now_instant: Instant) -> Vec<OutboundMessage> {
        self.on_step_or_force(now_instant, false)
    }

    fn on_step_or_force(&mut self, _now_instant: Instant, forced: bool) -> Vec<OutboundMessage> {
        let now_ts = now_ts();
        match self.try_forge(now_ts, forced) {
            Some((block, mut msgs)) => {
                msgs.extend(self.on_block(block));
                msgs
            }
            None => Vec::new(),
        }
    }

    /// §4.6: forges a block iff `forced` or the election at the current
    /// head selects this node's own id. Returns the block plus any
    /// out-of-band messages the forge itself produces (none today — the
    /// `Block` broadcast happens once the block is run through
    /// [`ConsensusEngine::on_block`]).
    pub fn try_forge(&mut self, now_ts: f64, forced: bool) -> Option<(Block, Vec<OutboundMessage>)> {
        let head_hash = self.chain.head()?;
        let head_block = self.chain.store().get_block(&head_hash)?;

        if !forced {
            let known_validators = self.chain.wallet().known_validators();
            let balance_holders = self.chain.wallet().known_balance_holders();
            let weights: std::collections::HashMap<AccountId, f64> = if known_validators.is_empty() {
                balance_holders
                    .iter()
                    .map(|id| (id.clone(), self.chain.wallet().get(id).balance))
                    .collect()
            } else {
                known_validators
                    .iter()
                    .map(|id| (id.clone(), self.chain.wallet().get(id).stake))
                    .collect()
            };
            let winner = elect(&known_validators, &balance_holders, &weights, &head_hash);
            if winner.as_ref() != Some(&self.self_id) {
                return None;
            }
        }

        let block = self.proposer.build_block(
            head_block.header.index,
            &head_hash,
            self.self_id.clone(),
            &mut self.mempool,
            self.chain.wallet(),
            now_ts,
        )?;

        Some((block, Vec::new()))
    }

    /// The full active chain, genesis-to-tip, for sync responses and
    /// persistence.
    pub fn active_chain(&self) -> Vec<Block> {
        let mut chain = Vec::new();
        let mut current = self.chain.head();
        while let Some(hash) = current {
            let Some(block) = self.chain.store().get_block(&hash) else { break };
            let prev = block.header.prev_hash.clone();
            chain.push(block);
            if prev.is_empty() {
                break;
            }
            current = Some(prev);
        }
        chain.reverse();
        chain
    }

    /// §4.9 step 1: broadcasts a sync request and opens a collection window.
    pub fn begin_sync(&mut self, now: Instant) -> Vec<OutboundMessage> {
        let deadline = now + std::time::Duration::from_secs(self.config.sync_timeout_secs);
        self.sync.begin(deadline);
        vec![OutboundMessage::SyncRequest]
    }

    /// §4.9 steps 3-4: picks the longest valid offered chain and, if it
    /// beats the local one, reorganizes onto it.
    fn on_sync_timeout(&mut self) -> Vec<OutboundMessage> {
        let responses = self.sync.finish();
        let Some(winner) = self.sync.choose_longest_valid(&self.chain, &responses) else {
            return Vec::new();
        };

        for block in &winner {
            let _ = self.chain.add(block.clone());
        }
        if let Some(tip) = winner.last() {
            self.chain.try_set_head(&tip.hash, &mut self.mempool);
        }
        Vec::new()
    }
}

/// Wall-clock seconds since the Unix epoch. Isolated here so the rest of
/// the engine never calls `SystemTime::now()` directly, keeping forging
/// timestamps easy to stub out in tests if that is ever needed.
fn now_ts() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryBlockStore;
    use crate::types::{TxKind, WalletAccount};
    use std::collections::HashMap;

    fn config_with_stake(id: &str, stake: f64) -> ConsensusConfig {
        let mut initial_state = HashMap::new();
        initial_state.insert(AccountId::new(id), WalletAccount { balance: 100.0, stake });
        ConsensusConfig { initial_state, ..ConsensusConfig::default() }
    }

    #[test]
    fn force_forge_bypasses_election() {
        // No stake anywhere, so normal election would find no winner.
        let cfg = ConsensusConfig::default();
        let mut engine = ConsensusEngine::bootstrap(AccountId::new("node1"), cfg, InMemoryBlockStore::new()).unwrap();

        let now = Instant::now();
        let outbound = engine.handle(InboundMessage::ForceForge, now);

        assert!(!outbound.is_empty());
        assert_eq!(engine.chain().head_block().unwrap().header.index, 1);
    }

    #[test]
    fn step_does_not_forge_when_not_elected() {
        let mut initial_state = HashMap::new();
        initial_state.insert(AccountId::new("other"), WalletAccount { balance: 0.0, stake: 10.0 });
        let cfg = ConsensusConfig { initial_state, ..ConsensusConfig::default() };

        let mut engine = ConsensusEngine::bootstrap(AccountId::new("node1"), cfg, InMemoryBlockStore::new()).unwrap();
        let genesis_index = engine.chain().head_block().unwrap().header.index;

        engine.handle(InboundMessage::Step, Instant::now());

        // node1 is never the sole staked validator ("other" is), so it
        // should never win the election and the head must stay at genesis.
        assert_eq!(engine.chain().head_block().unwrap().header.index, genesis_index);
    }

    #[test]
    fn transaction_then_forge_includes_it_in_the_block() {
        let cfg = config_with_stake("node1", 10.0);
        let mut engine = ConsensusEngine::bootstrap(AccountId::new("node1"), cfg, InMemoryBlockStore::new()).unwrap();

        let tx = Transaction {
            sender: AccountId::new("node1"),
            receiver: AccountId::new("node2"),
            amount: 5.0,
            timestamp: 1.0,
            kind: TxKind::Transfer,
        };
        engine.handle(InboundMessage::Transaction(tx), Instant::now());
        engine.handle(InboundMessage::ForceForge, Instant::now());

        let head = engine.chain().head_block().unwrap();
        assert_eq!(head.transactions.len(), 1);
        assert_eq!(engine.chain().wallet().get(&AccountId::new("node2")).balance, 5.0);
    }
}
