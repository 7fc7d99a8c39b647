//! Node configuration.
//!
//! Loaded from a TOML file on disk; every field has a default so a minimal
//! or even empty file is a valid configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use chain::ConsensusConfig;

/// Top-level node configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's account id, used as proposer/voter identity.
    pub node_id: String,
    /// Relay host to connect to.
    pub server_host: String,
    /// Relay port to connect to.
    pub server_port: u16,
    /// Path to this node's persisted-chain JSON file.
    pub persist_path: PathBuf,
    /// Address to bind the Prometheus `/metrics` exporter to.
    pub metrics_addr: SocketAddr,
    /// Consensus-level parameters, shared with the `chain` crate.
    pub consensus: ConsensusConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "node1".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 7878,
            persist_path: PathBuf::from("node1.chain.json"),
            metrics_addr: "0.0.0.0:9898".parse().expect("hard-coded metrics address should parse"),
            consensus: ConsensusConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Loads a configuration from a TOML file, falling back to field-level
    /// defaults for anything the file omits.
    pub fn load(path: &std::path::Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        toml::from_str(&text).map_err(|e| format!("failed to parse {}: {e}", path.display()))
    }

    pub fn relay_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses_as_toml_round_trip() {
        let cfg = NodeConfig::default();
        let text = toml::to_string(&cfg).expect("serialize");
        let back: NodeConfig = toml::from_str(&text).expect("deserialize");
        assert_eq!(back.node_id, cfg.node_id);
        assert_eq!(back.server_port, cfg.server_port);
    }

    #[test]
    fn load_reads_partial_file_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("node.toml");
        std::fs::write(&path, "node_id = \"custom\"\n").expect("write config");

        let cfg = NodeConfig::load(&path).expect("load config");
        assert_eq!(cfg.node_id, "custom");
        assert_eq!(cfg.server_port, NodeConfig::default().server_port);
    }
}
