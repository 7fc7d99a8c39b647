//! Relay configuration (spec.md §6 "server.host/port", "step.interval").

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub listen_host: String,
    pub listen_port: u16,
    /// Cadence of the automatic `STEP` broadcast, while auto-stepping is on.
    pub step_interval_secs: u64,
    /// Whether the relay ticks `STEP` on its own, or only on the admin `step` command.
    pub auto_step: bool,
    /// Informational vote-quorum fraction tracked by the admin `threshold` command; the
    /// relay does not itself interpret votes (spec.md §5: it "does not inspect message
    /// semantics"), so this value is reporting-only.
    pub vote_threshold: f64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            listen_port: 7878,
            step_interval_secs: 5,
            auto_step: true,
            vote_threshold: 0.5,
        }
    }
}

impl RelayConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        toml::from_str(&text).map_err(|e| e.to_string())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses_as_toml_round_trip() {
        let cfg = RelayConfig::default();
        let text = toml::to_string(&cfg).expect("serialize");
        let back: RelayConfig = toml::from_str(&text).expect("deserialize");
        assert_eq!(back.listen_port, cfg.listen_port);
        assert!(back.auto_step);
    }

    #[test]
    fn load_reads_partial_file_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "listen_port = 9000\n").unwrap();
        let cfg = RelayConfig::load(&path).expect("load");
        assert_eq!(cfg.listen_port, 9000);
        assert_eq!(cfg.listen_host, RelayConfig::default().listen_host);
    }
}
