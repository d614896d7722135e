//! In-memory node fake for reconciler testing.
//!
//! This module provides a controllable implementation of [`NodeClient`]
//! for exercising the reconciler without a real cluster.
//!
//! # Features
//!
//! - **Node state**: initialized/sealed flags that respond to init, unseal and join calls
//! - **Failure injection**: unreachable nodes, failing joins, failing init or unseal
//! - **Request recording**: call counters and the exact shares submitted
//! - **Latency injection**: per-call delay for cancellation tests
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sealwatch_client::{NodeRegistry, mock::MockNode};
//!
//! let leader = Arc::new(MockNode::new("http://vault-0:8200"));
//! let follower = Arc::new(MockNode::new("http://vault-1:8200"));
//! follower.fail_joins(2);
//!
//! let mut registry = NodeRegistry::new();
//! registry.insert(leader.clone());
//! registry.insert(follower.clone());
//! ```

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use sealwatch_types::{KeyMaterial, NodeStatus};

use crate::{
    error::{NodeError, Result},
    node::NodeClient,
};

/// Mutable node state guarded by the mock.
#[derive(Debug, Default)]
struct MockState {
    initialized: bool,
    sealed: bool,

    /// Shares generated by `initialize`; empty when unknown.
    keys: Vec<String>,
    threshold: Option<u8>,

    /// Whether every call fails with a connection error.
    unreachable: bool,
    /// Number of upcoming `seal_status` calls that fail with a connection error.
    status_failures: usize,
    /// Number of upcoming `join_raft_cluster` calls that fail.
    join_failures: usize,
    /// Error message returned by `initialize`, if set.
    init_error: Option<String>,
    /// Whether `submit_unseal_shares` fails.
    unseal_error: bool,

    leader: Option<String>,
    submitted: Vec<Vec<String>>,
    delay: Duration,
}

/// Controllable fake of a single cluster node.
#[derive(Debug)]
pub struct MockNode {
    addr: String,
    state: RwLock<MockState>,
    status_calls: AtomicUsize,
    init_calls: AtomicUsize,
    unseal_calls: AtomicUsize,
    join_calls: AtomicUsize,
}

impl MockNode {
    /// Creates a fresh node: not initialized, sealed, reachable.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            state: RwLock::new(MockState { sealed: true, ..Default::default() }),
            status_calls: AtomicUsize::new(0),
            init_calls: AtomicUsize::new(0),
            unseal_calls: AtomicUsize::new(0),
            join_calls: AtomicUsize::new(0),
        }
    }

    /// Creates a node that reports the given status.
    pub fn with_status(addr: impl Into<String>, status: &NodeStatus) -> Self {
        let node = Self::new(addr);
        {
            let mut state = node.state.write();
            state.initialized = status.initialized;
            state.sealed = status.sealed;
        }
        node
    }

    /// Makes every call fail with a connection error (or succeed again).
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.write().unreachable = unreachable;
    }

    /// Fails the next `count` seal-status queries with a connection error.
    pub fn fail_status_checks(&self, count: usize) {
        self.state.write().status_failures = count;
    }

    /// Fails the next `count` raft join calls with a server error.
    pub fn fail_joins(&self, count: usize) {
        self.state.write().join_failures = count;
    }

    /// Fails every `initialize` call with the given message.
    pub fn fail_initialize(&self, message: impl Into<String>) {
        self.state.write().init_error = Some(message.into());
    }

    /// Fails every unseal submission with a server error (or succeeds again).
    pub fn fail_unseal(&self, fail: bool) {
        self.state.write().unseal_error = fail;
    }

    /// Delays every call by `delay` before it takes effect.
    pub fn set_delay(&self, delay: Duration) {
        self.state.write().delay = delay;
    }

    /// Seals the node, as a restart would.
    pub fn seal(&self) {
        self.state.write().sealed = true;
    }

    /// Returns whether the node is currently sealed.
    pub fn is_sealed(&self) -> bool {
        self.state.read().sealed
    }

    /// Returns whether the node is currently initialized.
    pub fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    /// The leader address this node joined, if any.
    pub fn joined_leader(&self) -> Option<String> {
        self.state.read().leader.clone()
    }

    /// Every share batch submitted for unsealing, in call order.
    pub fn submitted_shares(&self) -> Vec<Vec<String>> {
        self.state.read().submitted.clone()
    }

    /// Number of `seal_status` calls received.
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Number of `initialize` calls received.
    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Number of `submit_unseal_shares` calls received.
    pub fn unseal_calls(&self) -> usize {
        self.unseal_calls.load(Ordering::SeqCst)
    }

    /// Number of `join_raft_cluster` calls received.
    pub fn join_calls(&self) -> usize {
        self.join_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let delay = self.state.read().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn connection_error(&self) -> NodeError {
        NodeError::Connection { addr: self.addr.clone(), message: "connection refused".to_owned() }
    }

    fn api_error(&self, status: u16, message: &str) -> NodeError {
        NodeError::Api { addr: self.addr.clone(), status, errors: vec![message.to_owned()] }
    }
}

#[async_trait]
impl NodeClient for MockNode {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn seal_status(&self) -> Result<NodeStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut state = self.state.write();
        if state.unreachable {
            return Err(self.connection_error());
        }
        if state.status_failures > 0 {
            state.status_failures -= 1;
            return Err(self.connection_error());
        }

        let mut status = NodeStatus::new(state.initialized, state.sealed);
        status.threshold = state.threshold.map(u32::from);
        status.shares = (!state.keys.is_empty()).then(|| state.keys.len() as u32);
        status.storage_type = Some("raft".to_owned());
        Ok(status)
    }

    async fn initialize(&self, secret_shares: u8, secret_threshold: u8) -> Result<KeyMaterial> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut state = self.state.write();
        if state.unreachable {
            return Err(self.connection_error());
        }
        if let Some(message) = &state.init_error {
            return Err(self.api_error(500, message));
        }
        if state.initialized {
            return Err(self.api_error(400, "Vault is already initialized"));
        }

        let keys: Vec<String> = (0..secret_shares).map(|i| format!("key-{i}")).collect();
        state.initialized = true;
        state.sealed = true;
        state.keys = keys.clone();
        state.threshold = Some(secret_threshold);

        Ok(KeyMaterial::new(keys, Some("root-token".to_owned())))
    }

    async fn submit_unseal_shares(&self, shares: &[String]) -> Result<()> {
        self.unseal_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut state = self.state.write();
        state.submitted.push(shares.to_vec());
        if state.unreachable {
            return Err(self.connection_error());
        }
        if state.unseal_error {
            return Err(self.api_error(500, "failed to decrypt keyring"));
        }
        if !state.initialized {
            return Err(self.api_error(400, "Vault is not initialized"));
        }
        if !state.keys.is_empty() && shares.iter().any(|s| !state.keys.contains(s)) {
            return Err(self.api_error(400, "invalid key"));
        }

        let required = state.threshold.map_or(1, usize::from);
        if shares.len() >= required {
            state.sealed = false;
        }
        Ok(())
    }

    async fn join_raft_cluster(&self, leader_addr: &str) -> Result<()> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut state = self.state.write();
        if state.unreachable {
            return Err(self.connection_error());
        }
        if state.join_failures > 0 {
            state.join_failures -= 1;
            return Err(self.api_error(500, "failed to join raft cluster"));
        }

        // A joined node shares the cluster's keyring but stays sealed.
        state.initialized = true;
        state.leader = Some(leader_addr.to_owned());
        Ok(())
    }
}
