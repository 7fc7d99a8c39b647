//! Persisted chain state: one JSON file per node holding the serialized
//! active chain (spec §6 "Persisted state"). Loaded before sync on
//! startup; rewritten from the consensus loop after every head change.

use std::path::Path;

use chain::Block;

/// Loads the persisted chain from `path`, if it exists and parses. A
/// missing or unreadable file is not an error: the node simply starts
/// from genesis and relies on sync to catch up.
pub fn load(path: &Path) -> Option<Vec<Block>> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(chain) => Some(chain),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse persisted chain, ignoring");
            None
        }
    }
}

/// Rewrites `path` with the full active chain. Failures are logged and
/// swallowed (spec §5: "failures log and continue").
pub fn save(path: &Path, chain: &[Block]) {
    let text = match serde_json::to_string_pretty(chain) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize chain for persistence");
            return;
        }
    };
    if let Err(e) = std::fs::write(path, text) {
        tracing::warn!(path = %path.display(), error = %e, "failed to persist chain");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain::{AccountId, BlockHeader};

    fn dummy_chain() -> Vec<Block> {
        let genesis = Block::genesis();
        let header = BlockHeader {
            index: 1,
            prev_hash: genesis.hash.clone(),
            validator: AccountId::new("node1"),
            timestamp: 1.0,
        };
        let mut b1 = Block { header, transactions: vec![], hash: String::new() };
        b1.hash = b1.compute_hash();
        vec![genesis, b1]
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chain.json");

        let chain = dummy_chain();
        save(&path, &chain);

        let loaded = load(&path).expect("chain should load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].header.index, 1);
    }

    #[test]
    fn load_missing_file_returns_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.json");
        assert!(load(&path).is_none());
    }
}
