//! Core domain types shared across the consensus core.
//!
//! This module defines the account identifier, the wallet ledger
//! (`WalletAccount`/`WalletState`), and re-exports the block and
//! transaction types defined in their own submodules. The goal, as in any
//! consensus-critical code, is to avoid "naked" primitives in public APIs
//! and instead use small, purpose-built newtypes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub mod block;
pub mod tx;

pub use block::{Block, BlockHeader};
pub use tx::{Transaction, TxKind};

/// Opaque account identifier (a short, human-chosen string such as `"node1"`).
///
/// Wrapped in a newtype so identifiers never flow through the API as naked
/// `String`s, matching the pattern used throughout this codebase for other
/// identifier types.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        AccountId(s.to_string())
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        AccountId(s)
    }
}

/// A single account's balance and stake.
///
/// Both fields are non-negative for the lifetime of the wallet: every
/// mutator on [`WalletState`] rejects an operation that would drive either
/// component below zero instead of clamping or panicking.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub balance: f64,
    pub stake: f64,
}

impl Default for WalletAccount {
    fn default() -> Self {
        Self {
            balance: 0.0,
            stake: 0.0,
        }
    }
}

/// Errors returned while applying a transaction to a [`WalletState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    /// `TRANSFER`/`STAKE` sender does not have enough balance.
    InsufficientBalance,
    /// `UNSTAKE` sender does not have enough staked funds.
    InsufficientStake,
    /// `TRANSFER` where `sender == receiver`.
    SelfTransfer,
    /// Amount is negative (amounts must be non-negative per the data model).
    NegativeAmount,
}

impl std::fmt::Display for TxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxError::InsufficientBalance => write!(f, "insufficient balance"),
            TxError::InsufficientStake => write!(f, "insufficient stake"),
            TxError::SelfTransfer => write!(f, "self transfer"),
            TxError::NegativeAmount => write!(f, "negative amount"),
        }
    }
}

impl std::error::Error for TxError {}

/// In-memory account ledger: `{ id -> (balance, stake) }`.
///
/// Unknown accounts default to `(0, 0)` on first access. The ledger's
/// operations are all O(1) in the number of accounts touched by a single
/// transaction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WalletState(pub HashMap<AccountId, WalletAccount>);

impl WalletState {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Seeds the ledger from an initial-state configuration table.
    pub fn seeded(initial: HashMap<AccountId, WalletAccount>) -> Self {
        Self(initial)
    }

    pub fn get(&self, id: &AccountId) -> WalletAccount {
        self.0.get(id).copied().unwrap_or_default()
    }

    /// Returns `true` iff `id` is known to have a positive stake.
    pub fn has_stake(&self, id: &AccountId) -> bool {
        self.0.get(id).is_some_and(|a| a.stake > 0.0)
    }

    /// Overwrites this ledger wholesale from a snapshot (reorg / sync).
    pub fn set_state(&mut self, snapshot: WalletState) {
        self.0 = snapshot.0;
    }

    /// Returns `true` iff `tx` would succeed if applied right now, without
    /// mutating the ledger.
    pub fn is_applicable(&self, tx: &Transaction) -> bool {
        self.check(tx).is_ok()
    }

    fn check(&self, tx: &Transaction) -> Result<(), TxError> {
        if tx.amount < 0.0 {
            return Err(TxError::NegativeAmount);
        }
        match tx.kind {
            TxKind::Transfer => {
                if tx.sender == tx.receiver {
                    return Err(TxError::SelfTransfer);
                }
                if self.get(&tx.sender).balance < tx.amount {
                    return Err(TxError::InsufficientBalance);
                }
            }
            TxKind::Stake => {
                if self.get(&tx.sender).balance < tx.amount {
                    return Err(TxError::InsufficientBalance);
                }
            }
            TxKind::Unstake => {
                if self.get(&tx.sender).stake < tx.amount {
                    return Err(TxError::InsufficientStake);
                }
            }
        }
        Ok(())
    }

    /// Applies a single transaction's state transition (spec.md §4.2).
    pub fn apply(&mut self, tx: &Transaction) -> Result<(), TxError> {
        self.check(tx)?;

        match tx.kind {
            TxKind::Transfer => {
                let mut sender = self.get(&tx.sender);
                sender.balance -= tx.amount;
                self.0.insert(tx.sender.clone(), sender);

                let mut receiver = self.get(&tx.receiver);
                receiver.balance += tx.amount;
                self.0.insert(tx.receiver.clone(), receiver);
            }
            TxKind::Stake => {
                let mut sender = self.get(&tx.sender);
                sender.balance -= tx.amount;
                sender.stake += tx.amount;
                self.0.insert(tx.sender.clone(), sender);
            }
            TxKind::Unstake => {
                let mut sender = self.get(&tx.sender);
                sender.stake -= tx.amount;
                sender.balance += tx.amount;
                self.0.insert(tx.sender.clone(), sender);
            }
        }

        Ok(())
    }

    /// The set of accounts currently observed to have `stake > 0`.
    pub fn known_validators(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self
            .0
            .iter()
            .filter(|(_, acct)| acct.stake > 0.0)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// The set of accounts with `balance > 0`, used as the election fallback
    /// when no account has a positive stake (spec.md §4.5 step 1).
    pub fn known_balance_holders(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self
            .0
            .iter()
            .filter(|(_, acct)| acct.balance > 0.0)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(id: &str) -> AccountId {
        AccountId::new(id)
    }

    fn tx(sender: &str, receiver: &str, amount: f64, kind: TxKind, ts: f64) -> Transaction {
        Transaction {
            sender: acct(sender),
            receiver: acct(receiver),
            amount,
            timestamp: ts,
            kind,
        }
    }

    #[test]
    fn transfer_moves_balance_between_accounts() {
        let mut state = WalletState::new();
        state.0.insert(acct("a"), WalletAccount { balance: 100.0, stake: 0.0 });

        let t = tx("a", "b", 40.0, TxKind::Transfer, 1.0);
        state.apply(&t).expect("transfer should succeed");

        assert_eq!(state.get(&acct("a")).balance, 60.0);
        assert_eq!(state.get(&acct("b")).balance, 40.0);
    }

    #[test]
    fn transfer_rejects_insufficient_balance() {
        let mut state = WalletState::new();
        state.0.insert(acct("a"), WalletAccount { balance: 10.0, stake: 0.0 });

        let t = tx("a", "b", 40.0, TxKind::Transfer, 1.0);
        assert_eq!(state.apply(&t), Err(TxError::InsufficientBalance));
    }

    #[test]
    fn transfer_rejects_self_transfer() {
        let mut state = WalletState::new();
        state.0.insert(acct("a"), WalletAccount { balance: 100.0, stake: 0.0 });

        let t = tx("a", "a", 10.0, TxKind::Transfer, 1.0);
        assert_eq!(state.apply(&t), Err(TxError::SelfTransfer));
    }

    #[test]
    fn stake_moves_balance_into_stake() {
        let mut state = WalletState::new();
        state.0.insert(acct("a"), WalletAccount { balance: 100.0, stake: 0.0 });

        let t = tx("a", "", 10.0, TxKind::Stake, 1.0);
        state.apply(&t).expect("stake should succeed");

        let a = state.get(&acct("a"));
        assert_eq!(a.balance, 90.0);
        assert_eq!(a.stake, 10.0);
    }

    #[test]
    fn unstake_moves_stake_back_into_balance() {
        let mut state = WalletState::new();
        state.0.insert(acct("a"), WalletAccount { balance: 0.0, stake: 10.0 });

        let t = tx("a", "", 10.0, TxKind::Unstake, 1.0);
        state.apply(&t).expect("unstake should succeed");

        let a = state.get(&acct("a"));
        assert_eq!(a.balance, 10.0);
        assert_eq!(a.stake, 0.0);
    }

    #[test]
    fn unstake_rejects_insufficient_stake() {
        let mut state = WalletState::new();
        state.0.insert(acct("a"), WalletAccount { balance: 0.0, stake: 5.0 });

        let t = tx("a", "", 10.0, TxKind::Unstake, 1.0);
        assert_eq!(state.apply(&t), Err(TxError::InsufficientStake));
    }

    #[test]
    fn unknown_accounts_default_to_zero() {
        let state = WalletState::new();
        let a = state.get(&acct("nobody"));
        assert_eq!(a.balance, 0.0);
        assert_eq!(a.stake, 0.0);
    }

    #[test]
    fn known_validators_only_lists_positive_stake_sorted() {
        let mut state = WalletState::new();
        state.0.insert(acct("b"), WalletAccount { balance: 0.0, stake: 5.0 });
        state.0.insert(acct("a"), WalletAccount { balance: 0.0, stake: 1.0 });
        state.0.insert(acct("c"), WalletAccount { balance: 10.0, stake: 0.0 });

        let validators = state.known_validators();
        assert_eq!(validators, vec![acct("a"), acct("b")]);
    }
}
