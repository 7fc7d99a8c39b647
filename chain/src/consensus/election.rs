//! Deterministic stake-weighted validator election.
//!
//! Every peer must derive the same winner from the same head hash without
//! exchanging any randomness, so the seed is a pure function of the head
//! hash and the draw is a pure function of the seed. No `rand`-style
//! nondeterministic PRNG belongs anywhere near this path.

use std::collections::HashMap;

use crate::types::AccountId;

/// SplitMix64's mixing step, used here purely as a deterministic bit
/// scrambler (not for statistical PRNG quality guarantees).
fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derives a deterministic `u64` seed from the first 16 hex characters of a
/// block hash (64 bits' worth of the digest).
fn seed_from_head(head_hash: &str) -> u64 {
    let prefix: String = head_hash.chars().take(16).collect();
    u64::from_str_radix(&prefix, 16).unwrap_or(0)
}

/// Picks the validator for the block built on top of `head_hash`.
///
/// `known_validators` must already be sorted (callers get this for free from
/// [`crate::types::WalletState::known_validators`]); the list is walked in
/// that order while accumulating weights, so the same inputs always produce
/// the same winner on every peer. Falls back to `balance_holders` as the
/// weight source when no validator has positive stake (spec.md election
/// step 1: balance substitutes for stake before any account has staked).
pub fn elect(
    known_validators: &[AccountId],
    balance_holders: &[AccountId],
    weights: &HashMap<AccountId, f64>,
    head_hash: &str,
) -> Option<AccountId> {
    let candidates: &[AccountId] = if known_validators.is_empty() {
        balance_holders
    } else {
        known_validators
    };

    if candidates.is_empty() {
        return None;
    }

    let mut sorted = candidates.to_vec();
    sorted.sort();

    let total_weight: f64 = sorted.iter().map(|id| weights.get(id).copied().unwrap_or(0.0)).sum();
    if total_weight <= 0.0 {
        return None;
    }

    let seed = seed_from_head(head_hash);
    let mixed = splitmix64(seed);
    // Map the mixed 64-bit value into [0, total_weight) with enough
    // precision for realistic weight magnitudes.
    let draw = (mixed as f64 / u64::MAX as f64) * total_weight;

    let mut accumulated = 0.0;
    for id in &sorted {
        let weight = weights.get(id).copied().unwrap_or(0.0);
        accumulated += weight;
        if draw < accumulated {
            return Some(id.clone());
        }
    }

    sorted.last().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(&str, f64)]) -> HashMap<AccountId, f64> {
        pairs.iter().map(|(id, w)| (AccountId::new(*id), *w)).collect()
    }

    #[test]
    fn election_is_deterministic_for_same_head() {
        let validators = vec![AccountId::new("a"), AccountId::new("b"), AccountId::new("c")];
        let w = weights(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);

        let first = elect(&validators, &[], &w, "abc123abc123abc1");
        let second = elect(&validators, &[], &w, "abc123abc123abc1");
        assert_eq!(first, second);
    }

    #[test]
    fn election_changes_with_head_hash() {
        let validators = vec![AccountId::new("a"), AccountId::new("b"), AccountId::new("c")];
        let w = weights(&[("a", 1.0), ("b", 1.0), ("c", 1.0)]);

        let results: Vec<_> = (0u64..8)
            .map(|i| elect(&validators, &[], &w, &format!("{i:016x}")))
            .collect();

        assert!(results.iter().any(|r| *r != results[0]));
    }

    #[test]
    fn election_falls_back_to_balance_holders_without_validators() {
        let balance_holders = vec![AccountId::new("x")];
        let w = weights(&[("x", 10.0)]);

        let winner = elect(&[], &balance_holders, &w, "deadbeefdeadbeef");
        assert_eq!(winner, Some(AccountId::new("x")));
    }

    #[test]
    fn election_returns_none_with_no_candidates() {
        let w = HashMap::new();
        assert_eq!(elect(&[], &[], &w, "deadbeefdeadbeef"), None);
    }

    #[test]
    fn zero_weight_validator_never_wins_against_positive_weight() {
        let validators = vec![AccountId::new("a"), AccountId::new("b")];
        let w = weights(&[("a", 0.0), ("b", 5.0)]);

        for i in 0u64..16 {
            let winner = elect(&validators, &[], &w, &format!("{i:016x}"));
            assert_eq!(winner, Some(AccountId::new("b")));
        }
    }
}
