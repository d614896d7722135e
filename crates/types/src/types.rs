//! Node status snapshots and cluster key material.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Snapshot of a node's seal state, as reported by its seal-status endpoint.
///
/// Produced fresh on every poll and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Whether the node has been initialized (directly or by joining a cluster).
    pub initialized: bool,
    /// Whether the node is sealed and needs key shares before serving requests.
    pub sealed: bool,
    /// Shares required to unseal, when reported.
    #[serde(default, rename = "t", skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    /// Total shares, when reported.
    #[serde(default, rename = "n", skip_serializing_if = "Option::is_none")]
    pub shares: Option<u32>,
    /// Shares accepted so far in the current unseal attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,
    /// Server version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Cluster name, reported once the node is unsealed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    /// Storage backend type (e.g. `raft`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
}

impl NodeStatus {
    /// Creates a status with only the two fields the reconciler acts on.
    pub fn new(initialized: bool, sealed: bool) -> Self {
        Self {
            initialized,
            sealed,
            threshold: None,
            shares: None,
            progress: None,
            version: None,
            cluster_name: None,
            storage_type: None,
        }
    }

    /// A fresh node: not initialized, sealed.
    pub fn uninitialized() -> Self {
        Self::new(false, true)
    }

    /// An initialized node that needs unsealing.
    pub fn sealed() -> Self {
        Self::new(true, true)
    }

    /// An initialized, serving node.
    pub fn unsealed() -> Self {
        Self::new(true, false)
    }
}

/// Key shares and root credential returned by cluster initialization.
///
/// Held only in process memory. The `Debug` implementation never prints the
/// shares or the token.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct KeyMaterial {
    /// Key shares in the order the server returned them.
    keys: Vec<String>,
    /// Base64 encoding of the same shares, when returned.
    #[serde(default)]
    keys_base64: Vec<String>,
    /// Initial root token, when returned. Opaque.
    #[serde(default)]
    root_token: Option<String>,
}

impl KeyMaterial {
    /// Creates key material from shares and an optional root token.
    pub fn new(keys: Vec<String>, root_token: Option<String>) -> Self {
        Self { keys, keys_base64: Vec::new(), root_token }
    }

    /// All key shares, in server order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Base64-encoded key shares, empty if the server did not return them.
    pub fn keys_base64(&self) -> &[String] {
        &self.keys_base64
    }

    /// Root token returned alongside the shares.
    pub fn root_token(&self) -> Option<&str> {
        self.root_token.as_deref()
    }

    /// Number of key shares held.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no shares are held.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The first `threshold` shares, or all of them if fewer are held.
    pub fn unseal_shares(&self, threshold: u8) -> &[String] {
        let take = usize::from(threshold).min(self.keys.len());
        &self.keys[..take]
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("keys", &format_args!("[{} redacted]", self.keys.len()))
            .field("root_token", &self.root_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
