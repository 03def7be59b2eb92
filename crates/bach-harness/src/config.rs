//! Configuration types for harness runs

use crate::chain::{ChainIdSource, FixedChainId, RemoteNode};
use crate::error::{HarnessError, HarnessResult};
use bach_evm::EngineConfig;
use bach_forks::Fork;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Harness configuration, loaded from JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Forks to run every scenario on
    #[serde(default = "default_forks")]
    pub forks: Vec<Fork>,
    /// Abort a scenario after this many executed instructions
    #[serde(default = "default_max_steps")]
    pub max_steps: Option<u64>,
    /// Abort a scenario whose transaction gas limit exceeds this
    #[serde(default = "default_gas_ceiling")]
    pub gas_ceiling: Option<u64>,
    /// Worker threads; 0 uses the rayon default
    #[serde(default)]
    pub threads: usize,
    /// Chain id used when no remote node is configured
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Node configuration; the first entry supplies the chain id
    #[serde(default)]
    pub remote_nodes: Vec<RemoteNode>,
    /// Whether to run the built-in scenario suite
    #[serde(default = "default_builtin")]
    pub builtin: bool,
    /// JSON fixture files to load
    #[serde(default)]
    pub fixtures: Vec<PathBuf>,
    /// Only run scenarios whose name contains this
    #[serde(default)]
    pub filter: Option<String>,
}

fn default_forks() -> Vec<Fork> {
    Fork::ALL.to_vec()
}

fn default_max_steps() -> Option<u64> {
    Some(10_000_000)
}

fn default_gas_ceiling() -> Option<u64> {
    Some(30_000_000)
}

fn default_chain_id() -> u64 {
    1
}

fn default_builtin() -> bool {
    true
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            forks: default_forks(),
            max_steps: default_max_steps(),
            gas_ceiling: default_gas_ceiling(),
            threads: 0,
            chain_id: default_chain_id(),
            remote_nodes: Vec::new(),
            builtin: default_builtin(),
            fixtures: Vec::new(),
            filter: None,
        }
    }
}

impl HarnessConfig {
    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: HarnessConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot run
    pub fn validate(&self) -> HarnessResult<()> {
        if self.forks.is_empty() {
            return Err(HarnessError::Config("no forks selected".into()));
        }
        if self.max_steps == Some(0) {
            return Err(HarnessError::Config("max_steps must be positive".into()));
        }
        if let Some(node) = self.remote_nodes.iter().find(|node| node.chain_id == 0) {
            return Err(HarnessError::Config(format!(
                "remote node {} has chain id 0",
                node.name
            )));
        }
        Ok(())
    }

    /// Engine limits
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_steps: self.max_steps,
            gas_ceiling: self.gas_ceiling,
        }
    }

    /// Chain id source: the first remote node, else the configured id
    pub fn chain_source(&self) -> Arc<dyn ChainIdSource> {
        match self.remote_nodes.first() {
            Some(node) => Arc::new(node.clone()),
            None => Arc::new(FixedChainId(self.chain_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.forks.len(), 11);
        assert_eq!(config.chain_source().chain_id(), 1);
        assert!(config.builtin);
        assert_eq!(config.engine_config().max_steps, Some(10_000_000));
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: HarnessConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "forks": ["Berlin", "Merge"],
                "max_steps": null,
                "threads": 2,
                "remote_nodes": [{{"name": "devnet", "chain_id": 1337}}]
            }}"#
        )
        .unwrap();

        let config = HarnessConfig::load(file.path()).unwrap();
        assert_eq!(config.forks, vec![Fork::Berlin, Fork::Paris]);
        assert_eq!(config.max_steps, None);
        assert_eq!(config.threads, 2);
        assert_eq!(config.chain_source().chain_id(), 1337);
        assert_eq!(config.gas_ceiling, Some(30_000_000));
    }

    #[test]
    fn test_invalid_configs() {
        let config = HarnessConfig {
            forks: vec![],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HarnessError::Config(_))));

        let config = HarnessConfig {
            remote_nodes: vec![RemoteNode {
                name: "bad".into(),
                chain_id: 0,
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let err = serde_json::from_str::<HarnessConfig>(r#"{"forks": ["Olympic"]}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = HarnessConfig::load("/nonexistent/harness.json").unwrap_err();
        assert!(matches!(err, HarnessError::Io(_)));
    }
}
