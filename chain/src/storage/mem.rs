//! In-memory block store.
//!
//! This implementation is useful for unit tests, benchmarks, and small
//! devnets. It keeps all blocks in a `HashMap` keyed by their hex hash and
//! tracks the current head pointer separately.

use std::collections::HashMap;

use crate::consensus::store::BlockStore;
use crate::types::Block;

/// In-memory implementation of [`BlockStore`].
#[derive(Default)]
pub struct InMemoryBlockStore {
    blocks: HashMap<String, Block>,
    head: Option<String>,
}

impl InMemoryBlockStore {
    /// Creates a new, empty in-memory block store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of blocks currently stored.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if no blocks are stored.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn get_block(&self, hash: &str) -> Option<Block> {
        self.blocks.get(hash).cloned()
    }

    fn put_block(&mut self, block: Block) {
        self.blocks.insert(block.hash.clone(), block);
    }

    fn contains(&self, hash: &str) -> bool {
        self.blocks.contains_key(hash)
    }

    fn head(&self) -> Option<String> {
        self.head.clone()
    }

    fn set_head(&mut self, hash: String) {
        self.head = Some(hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, Block, BlockHeader};

    fn dummy_block(index: u64, prev_hash: &str) -> Block {
        let header = BlockHeader {
            index,
            prev_hash: prev_hash.to_string(),
            validator: AccountId::new("node1"),
            timestamp: 1_700_000_000.0 + index as f64,
        };
        let mut block = Block { header, transactions: Vec::new(), hash: String::new() };
        block.hash = block.compute_hash();
        block
    }

    #[test]
    fn put_and_get_block_roundtrip() {
        let mut store = InMemoryBlockStore::new();
        let block = dummy_block(0, "");
        let hash = block.hash.clone();

        store.put_block(block);
        let fetched = store.get_block(&hash).expect("block should be present");

        assert_eq!(fetched.header.index, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn head_is_tracked_separately_from_blocks() {
        let mut store = InMemoryBlockStore::new();
        let block = dummy_block(5, "");
        let hash = block.hash.clone();

        store.put_block(block);
        assert!(store.head().is_none());

        store.set_head(hash.clone());
        assert_eq!(store.head(), Some(hash));
    }

    #[test]
    fn contains_reflects_presence() {
        let mut store = InMemoryBlockStore::new();
        let block = dummy_block(0, "");
        assert!(!store.contains(&block.hash));
        store.put_block(block.clone());
        assert!(store.contains(&block.hash));
    }
}
