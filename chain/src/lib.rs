//! Chain library crate.
//!
//! This crate provides the core building blocks for a proof-of-stake
//! consensus simulation:
//!
//! - strongly-typed domain types (`types`): accounts, wallet state, blocks,
//!   and transactions,
//! - a modular consensus engine (`consensus`): the chain store, fork-choice
//!   and reorg, validator election, vote quorum, bootstrap sync, block
//!   proposal, and the engine that wires them together,
//! - the pending-transaction pool (`mempool`),
//! - storage backends (`storage`),
//! - Prometheus-based metrics (`metrics`),
//! - and the wire protocol shared by the node and relay binaries (`wire`).
//!
//! Higher-level binaries (a node and a relay) compose these pieces into a
//! running simulation.

pub mod consensus;
pub mod mempool;
pub mod metrics;
pub mod storage;
pub mod types;
pub mod wire;

// Re-export "core" consensus types and traits.
pub use consensus::{
    BlockStore, BlockValidator, CombinedValidator, ConsensusConfig, ConsensusEngine,
    ConsensusError, InboundMessage, OutboundMessage, Proposer, ReorgOutcome, StructuralValidity,
    SyncEngine, TxPool, ValidationError, VoteOutcome, VoteTracker,
};

// Re-export the mempool.
pub use mempool::Mempool;

// Re-export storage backends.
pub use storage::InMemoryBlockStore;

// Re-export metrics registry and consensus metrics.
pub use metrics::{ConsensusMetrics, MetricsRegistry, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;

// Re-export the wire protocol shared by the node and relay binaries.
pub use wire::{WireBody, WireEnvelope};

/// Type alias for the default block store backend used outside of tests.
pub type DefaultBlockStore = InMemoryBlockStore;

/// Type alias for the default consensus engine stack.
pub type DefaultConsensusEngine = ConsensusEngine<DefaultBlockStore>;
