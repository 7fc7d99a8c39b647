//! Optional vote-quorum confirmation gate.
//!
//! Gated by [`crate::consensus::config::ConsensusConfig::vote_enabled`]. When
//! enabled, a forged block does not become head until a quorum of known
//! validators has voted for its hash. A plain struct with `&mut self`
//! mutators and no interior mutability, matching the rest of the core: all
//! of this lives behind the single-threaded consensus loop, so there is
//! nothing here that needs to be `Send`/`Sync` on its own.

use std::collections::HashSet;
use std::time::Instant;

use crate::types::{AccountId, Block};

/// A block awaiting enough votes to be installed as head.
pub struct PendingBlock {
    pub block: Block,
    pub voters: HashSet<AccountId>,
    pub deadline: Instant,
}

/// Result of casting a single vote.
#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    /// The vote was counted and quorum has not yet been reached.
    Accepted,
    /// This voter had already voted for this block; the vote was ignored.
    DuplicateIgnored,
    /// The block hash is not (yet) a known candidate; the vote is buffered
    /// in case the block arrives shortly after.
    UnknownBlockBuffered,
    /// This vote pushed the candidate over quorum.
    QuorumReached,
}

/// Tracks votes for candidate blocks pending quorum confirmation.
pub struct VoteTracker {
    candidates: std::collections::HashMap<String, PendingBlock>,
    /// Votes received for a hash we haven't seen a candidate for yet.
    buffered_votes: std::collections::HashMap<String, HashSet<AccountId>>,
}

impl Default for VoteTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl VoteTracker {
    pub fn new() -> Self {
        Self {
            candidates: std::collections::HashMap::new(),
            buffered_votes: std::collections::HashMap::new(),
        }
    }

    /// Registers a freshly-forged block as awaiting votes, applying any
    /// votes that were buffered before the block itself arrived.
    pub fn register_candidate(&mut self, block: Block, deadline: Instant) {
        let hash = block.hash.clone();
        let voters = self.buffered_votes.remove(&hash).unwrap_or_default();
        self.candidates.insert(
            hash,
            PendingBlock {
                block,
                voters,
                deadline,
            },
        );
    }

    /// Records a vote for `block_hash` from `voter`.
    pub fn cast_vote(
        &mut self,
        voter: AccountId,
        block_hash: &str,
        known_validators: usize,
        threshold: f64,
    ) -> VoteOutcome {
        let Some(pending) = self.candidates.get_mut(block_hash) else {
            self.buffered_votes
                .entry(block_hash.to_string())
                .or_default()
                .insert(voter);
            return VoteOutcome::UnknownBlockBuffered;
        };

        if !pending.voters.insert(voter) {
            return VoteOutcome::DuplicateIgnored;
        }

        let required = Self::quorum(known_validators, threshold);
        if pending.voters.len() >= required {
            VoteOutcome::QuorumReached
        } else {
            VoteOutcome::Accepted
        }
    }

    /// The number of votes required for quorum: `ceil(known_validators *
    /// threshold)`, per the glossary's rounding rule.
    pub fn quorum(known_validators: usize, threshold: f64) -> usize {
        (known_validators as f64 * threshold).ceil() as usize
    }

    /// Removes and returns the candidate block for `hash`, if one is
    /// pending (called once quorum is reached).
    pub fn take_candidate(&mut self, hash: &str) -> Option<Block> {
        self.candidates.remove(hash).map(|p| p.block)
    }

    /// Returns `true` iff at least one pending candidate's deadline has
    /// passed, so a timer task can poll without mutating anything.
    pub fn has_any_expired(&self, now: Instant) -> bool {
        self.candidates.values().any(|p| p.deadline <= now)
    }

    /// Discards candidates whose deadline has passed, returning their
    /// hashes so the caller can log/account for the timeout.
    pub fn expire(&mut self, now: Instant) -> Vec<String> {
        let expired: Vec<String> = self
            .candidates
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(hash, _)| hash.clone())
            .collect();

        for hash in &expired {
            self.candidates.remove(hash);
            self.buffered_votes.remove(hash);
        }

        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn dummy_block(hash: &str) -> Block {
        let mut b = Block::genesis();
        b.hash = hash.to_string();
        b
    }

    #[test]
    fn quorum_rounds_up() {
        assert_eq!(VoteTracker::quorum(3, 0.5), 2);
        assert_eq!(VoteTracker::quorum(4, 0.5), 2);
        assert_eq!(VoteTracker::quorum(5, 0.6), 3);
    }

    #[test]
    fn duplicate_votes_from_same_voter_are_ignored() {
        let mut tracker = VoteTracker::new();
        tracker.register_candidate(dummy_block("h1"), Instant::now() + Duration::from_secs(5));

        let v1 = tracker.cast_vote(AccountId::new("a"), "h1", 3, 0.5);
        let v2 = tracker.cast_vote(AccountId::new("a"), "h1", 3, 0.5);

        assert_eq!(v1, VoteOutcome::Accepted);
        assert_eq!(v2, VoteOutcome::DuplicateIgnored);
    }

    #[test]
    fn quorum_reached_when_enough_distinct_voters() {
        let mut tracker = VoteTracker::new();
        tracker.register_candidate(dummy_block("h1"), Instant::now() + Duration::from_secs(5));

        tracker.cast_vote(AccountId::new("a"), "h1", 3, 0.5);
        let outcome = tracker.cast_vote(AccountId::new("b"), "h1", 3, 0.5);

        assert_eq!(outcome, VoteOutcome::QuorumReached);
    }

    #[test]
    fn votes_for_unknown_block_are_buffered_then_applied() {
        let mut tracker = VoteTracker::new();
        let outcome = tracker.cast_vote(AccountId::new("a"), "h1", 3, 0.5);
        assert_eq!(outcome, VoteOutcome::UnknownBlockBuffered);

        tracker.register_candidate(dummy_block("h1"), Instant::now() + Duration::from_secs(5));
        let pending_voters = tracker.candidates.get("h1").unwrap().voters.len();
        assert_eq!(pending_voters, 1);
    }

    #[test]
    fn expired_candidates_are_discarded() {
        let mut tracker = VoteTracker::new();
        tracker.register_candidate(dummy_block("h1"), Instant::now() - Duration::from_secs(1));

        let expired = tracker.expire(Instant::now());
        assert_eq!(expired, vec!["h1".to_string()]);
        assert!(tracker.take_candidate("h1").is_none());
    }
}
