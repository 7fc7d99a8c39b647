//! Block validity predicates used by consensus.

use crate::types::Block;

use super::error::ValidationError;

/// Pluggable validity predicate for blocks.
///
/// Implementations should be deterministic and side-effect free, and must
/// only inspect the block itself: anything that depends on which branch's
/// post-state the block is evaluated against (transaction applicability)
/// belongs in [`crate::consensus::store::ChainStore::replay`] instead, not
/// here.
pub trait BlockValidator {
    fn validate(&self, block: &Block) -> Result<(), ValidationError>;
}

/// Structural validity (B1) plus per-transaction sanity, checked before a
/// block is ever handed to the chain store.
///
/// - B1: the block's stored `hash` matches its recomputed content hash.
/// - Each transaction has a non-negative amount and, for transfers, a
///   distinct sender/receiver.
///
/// B2 (`index == parent.index + 1`, skipped for genesis) is checked by
/// [`crate::consensus::store::ChainStore::add`] instead of here, because it
/// requires resolving `prev_hash` to the parent block's own index, which
/// only the store that holds that block can do; a block-local validator has
/// no access to it. Ledger applicability (balances/stakes) is likewise not
/// checked here: it depends on which branch's post-state the block lands
/// on, which this validator also has no access to.
#[derive(Clone, Debug, Default)]
pub struct StructuralValidity;

impl StructuralValidity {
    pub fn new() -> Self {
        Self
    }

    fn check_hash(&self, block: &Block) -> Result<(), ValidationError> {
        if block.has_valid_hash() {
            Ok(())
        } else {
            Err(ValidationError::Invalid("stored hash does not match recomputed content hash"))
        }
    }

    fn check_transactions(&self, block: &Block) -> Result<(), ValidationError> {
        for tx in &block.transactions {
            if tx.amount < 0.0 {
                return Err(ValidationError::Custom(format!(
                    "transaction from {} has negative amount {}",
                    tx.sender, tx.amount
                )));
            }
            if matches!(tx.kind, crate::types::TxKind::Transfer) && tx.sender == tx.receiver {
                return Err(ValidationError::Custom(format!(
                    "transfer from {} to itself is not allowed",
                    tx.sender
                )));
            }
        }
        Ok(())
    }
}

impl BlockValidator for StructuralValidity {
    fn validate(&self, block: &Block) -> Result<(), ValidationError> {
        self.check_hash(block)?;
        self.check_transactions(block)?;
        Ok(())
    }
}

/// Composes two validators, running `a` then `b` and failing fast on the
/// first error. Kept even though the current stack only has one real link
/// in the chain, so a future predicate (e.g. a vote-gate check) slots in
/// without reshaping the engine.
pub struct CombinedValidator<A, B> {
    pub a: A,
    pub b: B,
}

impl<A, B> CombinedValidator<A, B> {
    pub fn new(a: A, b: B) -> Self {
        Self { a, b }
    }
}

impl<A, B> BlockValidator for CombinedValidator<A, B>
where
    A: BlockValidator,
    B: BlockValidator,
{
    fn validate(&self, block: &Block) -> Result<(), ValidationError> {
        self.a.validate(block)?;
        self.b.validate(block)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, BlockHeader, Transaction, TxKind};

    fn base_block() -> Block {
        let header = BlockHeader {
            index: 1,
            prev_hash: Block::genesis().hash,
            validator: AccountId::new("node1"),
            timestamp: 1_700_000_000.0,
        };
        let mut block = Block { header, transactions: vec![], hash: String::new() };
        block.hash = block.compute_hash();
        block
    }

    #[test]
    fn accepts_well_formed_block() {
        let v = StructuralValidity::new();
        assert!(v.validate(&base_block()).is_ok());
    }

    #[test]
    fn rejects_tampered_hash() {
        let v = StructuralValidity::new();
        let mut block = base_block();
        block.header.timestamp += 1.0;
        assert!(v.validate(&block).is_err());
    }

    #[test]
    fn rejects_negative_amount() {
        let v = StructuralValidity::new();
        let mut block = base_block();
        block.transactions.push(Transaction {
            sender: AccountId::new("a"),
            receiver: AccountId::new("b"),
            amount: -1.0,
            timestamp: 1.0,
            kind: TxKind::Transfer,
        });
        block.hash = block.compute_hash();
        assert!(v.validate(&block).is_err());
    }

    #[test]
    fn rejects_self_transfer() {
        let v = StructuralValidity::new();
        let mut block = base_block();
        block.transactions.push(Transaction {
            sender: AccountId::new("a"),
            receiver: AccountId::new("a"),
            amount: 1.0,
            timestamp: 1.0,
            kind: TxKind::Transfer,
        });
        block.hash = block.compute_hash();
        assert!(v.validate(&block).is_err());
    }
}
