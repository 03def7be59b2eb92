//! Chain id resolution
//!
//! Transactions that do not name a chain id take it from a node
//! configuration. Only the integer crosses this boundary.

use serde::{Deserialize, Serialize};

/// Supplies the chain id scenarios run on
pub trait ChainIdSource: Send + Sync {
    /// Chain id
    fn chain_id(&self) -> u64;
}

/// Constant chain id
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedChainId(pub u64);

impl ChainIdSource for FixedChainId {
    fn chain_id(&self) -> u64 {
        self.0
    }
}

/// A configured node; scenarios use the first one listed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    /// Node name
    pub name: String,
    /// Chain id the node reports
    pub chain_id: u64,
}

impl ChainIdSource for RemoteNode {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources() {
        let sources: Vec<Box<dyn ChainIdSource>> = vec![
            Box::new(FixedChainId(1)),
            Box::new(RemoteNode {
                name: "local".into(),
                chain_id: 1337,
            }),
        ];
        let ids: Vec<u64> = sources.iter().map(|s| s.chain_id()).collect();
        assert_eq!(ids, vec![1, 1337]);
    }

    #[test]
    fn test_remote_node_json() {
        let node: RemoteNode = serde_json::from_str(r#"{"name":"a","chain_id":5}"#).unwrap();
        assert_eq!(node.chain_id(), 5);
    }
}
