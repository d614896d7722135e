//! Fixed, ordered set of cluster nodes.

use std::sync::Arc;

use sealwatch_types::{ClusterConfig, NodeClientConfig};
use tracing::warn;

use crate::{
    error::Result,
    node::NodeClient,
    vault::{VaultClient, build_http_client},
};

/// Ordered mapping from node address to its client.
///
/// Built once at startup and never modified afterwards. Iteration order is
/// insertion order, so the first node is always the bootstrap leader.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: Vec<Arc<dyn NodeClient>>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry of [`VaultClient`]s for every configured node.
    ///
    /// All clients share one HTTP connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Config`](crate::NodeError::Config) if the HTTP
    /// client cannot be built.
    pub fn connect(cluster: &ClusterConfig, client: &NodeClientConfig) -> Result<Self> {
        let http = build_http_client(client)?;
        Ok(cluster
            .nodes
            .iter()
            .map(|addr| {
                Arc::new(VaultClient::with_http(addr.clone(), http.clone())) as Arc<dyn NodeClient>
            })
            .collect())
    }

    /// Adds a node. Returns `false`, leaving the registry unchanged, if a node
    /// with the same address is already registered.
    pub fn insert(&mut self, node: Arc<dyn NodeClient>) -> bool {
        if self.get(node.addr()).is_some() {
            warn!(node = %node.addr(), "Ignoring duplicate node address");
            return false;
        }
        self.nodes.push(node);
        true
    }

    /// Looks up a node by address.
    pub fn get(&self, addr: &str) -> Option<&Arc<dyn NodeClient>> {
        self.nodes.iter().find(|n| n.addr() == addr)
    }

    /// The bootstrap leader: the first registered node.
    pub fn leader(&self) -> Option<&Arc<dyn NodeClient>> {
        self.nodes.first()
    }

    /// Every node except the leader, in registry order.
    pub fn followers(&self) -> impl Iterator<Item = &Arc<dyn NodeClient>> {
        self.nodes.iter().skip(1)
    }

    /// All nodes in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn NodeClient>> {
        self.nodes.iter()
    }

    /// Node addresses in registry order.
    pub fn addrs(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.addr()).collect()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no nodes are registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl FromIterator<Arc<dyn NodeClient>> for NodeRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn NodeClient>>>(iter: I) -> Self {
        let mut registry = Self::new();
        for node in iter {
            registry.insert(node);
        }
        registry
    }
}
