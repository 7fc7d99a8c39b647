// chain/src/types/tx.rs

//! Transaction types for the consensus layer.
//!
//! Transactions cover value transfers and stake/unstake operations between
//! accounts. There is no signature field: signature verification is out of
//! scope, accounts are bare strings and any party may submit a transaction
//! on any account's behalf.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::AccountId;

/// The kind of ledger operation a [`Transaction`] performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    /// Moves `amount` from `sender`'s balance to `receiver`'s balance.
    Transfer,
    /// Moves `amount` from `sender`'s balance into `sender`'s stake.
    Stake,
    /// Moves `amount` from `sender`'s stake back into `sender`'s balance.
    Unstake,
}

/// A single ledger operation.
///
/// For `Stake`/`Unstake`, `receiver` is conventionally the empty account id
/// (the funds never leave `sender`); it is still present on the struct so
/// the wire format and mempool dedup key stay uniform across kinds.
///
/// Identity is the 5-tuple `(sender, receiver, amount, timestamp, kind)`.
/// `amount`/`timestamp` are `f64` and therefore do not derive `Eq`/`Hash`;
/// both are implemented by hand below, comparing/hashing the floats via
/// `to_bits()` so that two transactions built from the same literal values
/// are always equal and hash identically.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub amount: f64,
    pub timestamp: f64,
    pub kind: TxKind,
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.sender == other.sender
            && self.receiver == other.receiver
            && self.amount.to_bits() == other.amount.to_bits()
            && self.timestamp.to_bits() == other.timestamp.to_bits()
            && self.kind == other.kind
    }
}

impl Eq for Transaction {}

impl Hash for Transaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sender.hash(state);
        self.receiver.hash(state);
        self.amount.to_bits().hash(state);
        self.timestamp.to_bits().hash(state);
        self.kind.hash(state);
    }
}
