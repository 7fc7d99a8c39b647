// chain/src/types/block.rs

//! Block types and hashing.
//!
//! This module defines the header/body split used by the chain store,
//! together with a canonical hashing routine. Serialization is done with
//! **bincode 2** using the `serde` integration (`bincode::serde::encode_to_vec`)
//! and an explicit `standard()` config, so the bytes fed to the hasher never
//! drift across nodes.

use serde::{Deserialize, Serialize};

use super::{AccountId, Transaction};

/// Block header: the fields that determine a block's position in the chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Height of this block. Genesis is `0`.
    pub index: u64,
    /// Hex digest of the parent block. Empty for genesis.
    pub prev_hash: String,
    /// Account elected to forge this block. Empty for genesis.
    pub validator: AccountId,
    /// Wall-clock timestamp, seconds since Unix epoch.
    pub timestamp: f64,
}

/// A block: header, transactions, and the block's own stored hash.
///
/// Unlike a hash newtype recomputed on demand, `hash` is a stored field so
/// that a received block's integrity can be checked by recomputing and
/// comparing, rather than trusting whatever hash the peer attached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub hash: String,
}

/// The fields hashed to produce a block's content digest. Kept as a private
/// tuple-like struct so `canonical_bytes` never has to worry about `hash`
/// (which would make the digest depend on itself) leaking into the encoding.
#[derive(Serialize)]
struct Signable<'a> {
    index: u64,
    prev_hash: &'a str,
    validator: &'a AccountId,
    transactions: &'a [Transaction],
    timestamp: f64,
}

impl Block {
    /// Canonical byte representation hashed to produce [`Block::compute_hash`].
    ///
    /// Uses bincode 2 with the `standard()` configuration; all hashing and
    /// wire encoding that depends on a "canonical" form goes through this
    /// method to avoid format drift between nodes.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails, which would indicate a programming error
    /// since every field here is always serializable.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let signable = Signable {
            index: self.header.index,
            prev_hash: &self.header.prev_hash,
            validator: &self.header.validator,
            transactions: &self.transactions,
            timestamp: self.header.timestamp,
        };
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(&signable, cfg)
            .expect("Block fields should always be serializable with bincode 2 + serde")
    }

    /// Computes the hex-encoded BLAKE3-256 digest of [`Block::canonical_bytes`].
    pub fn compute_hash(&self) -> String {
        let bytes = self.canonical_bytes();
        hex::encode(blake3::hash(&bytes).as_bytes())
    }

    /// Recomputes the hash and compares it against the stored `hash` field
    /// (the B1 structural invariant).
    pub fn has_valid_hash(&self) -> bool {
        self.compute_hash() == self.hash
    }

    /// Builds the genesis block: height 0, no parent, no validator, no
    /// transactions, with its hash computed normally.
    pub fn genesis() -> Self {
        let header = BlockHeader {
            index: 0,
            prev_hash: String::new(),
            validator: AccountId::new(""),
            timestamp: 0.0,
        };
        let mut block = Block {
            header,
            transactions: Vec::new(),
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }
}
