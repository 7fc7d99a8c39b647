//! Consensus engine and related abstractions.
//!
//! This module provides a modular, testable consensus layer consisting of:
//!
//! - configuration parameters ([`config::ConsensusConfig`]),
//! - block validity predicates ([`validity`]),
//! - the chain store, fork-choice, and reorg logic ([`store`]),
//! - deterministic stake-weighted validator election ([`election`]),
//! - the optional vote-quorum confirmation gate ([`vote`]),
//! - bootstrap chain sync ([`sync`]),
//! - block proposal ([`proposer`]),
//! - and the engine itself ([`engine`]), which composes all of the above
//!   behind a single message-handling entry point.

pub mod config;
pub mod election;
pub mod engine;
pub mod error;
pub mod proposer;
pub mod store;
pub mod sync;
pub mod validity;
pub mod vote;

pub use config::ConsensusConfig;
pub use election::elect;
pub use engine::{ConsensusEngine, InboundMessage, OutboundMessage};
pub use error::{ConsensusError, ValidationError};
pub use proposer::{Proposer, TxPool};
pub use store::{BlockStore, ChainStore, ReorgOutcome};
pub use sync::SyncEngine;
pub use validity::{BlockValidator, CombinedValidator, StructuralValidity};
pub use vote::{PendingBlock, VoteOutcome, VoteTracker};
