//! The node capability consumed by the reconciler.

use std::fmt;

use async_trait::async_trait;
use sealwatch_types::{KeyMaterial, NodeStatus};

use crate::error::Result;

/// Administrative operations on a single cluster node.
///
/// The reconciler only talks to nodes through this trait, which makes it
/// the seam for substituting fakes in tests.
#[async_trait]
pub trait NodeClient: Send + Sync + fmt::Debug {
    /// Base address identifying this node.
    fn addr(&self) -> &str;

    /// Fetches the node's current seal and initialization state.
    async fn seal_status(&self) -> Result<NodeStatus>;

    /// Initializes the node, splitting a fresh master key into
    /// `secret_shares` shares of which `secret_threshold` unseal it.
    async fn initialize(&self, secret_shares: u8, secret_threshold: u8) -> Result<KeyMaterial>;

    /// Submits key shares to a sealed node.
    async fn submit_unseal_shares(&self, shares: &[String]) -> Result<()>;

    /// Joins this node to the raft cluster led by `leader_addr`.
    async fn join_raft_cluster(&self, leader_addr: &str) -> Result<()>;
}
