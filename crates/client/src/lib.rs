//! Node clients for sealwatch.
//!
//! Wraps the administrative API of each cluster node behind the
//! [`NodeClient`] trait, so that the reconciler can drive real nodes and
//! in-memory fakes through the same interface.
//!
//! # Features
//!
//! - **HTTP client**: [`VaultClient`] speaks the seal-status, init, unseal and raft-join endpoints
//! - **Registry**: [`NodeRegistry`] holds the fixed, ordered node set; the first node leads
//! - **Retry**: [`with_retry`] runs an operation with a fixed-delay budget and cancellation
//! - **Fakes**: [`mock::MockNode`] records calls and injects failures for tests
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sealwatch_client::{NodeClient, NodeRegistry};
//! use sealwatch_types::{ClusterConfig, NodeClientConfig};
//!
//! let cluster = ClusterConfig::builder()
//!     .nodes(vec!["http://vault-0:8200".into(), "http://vault-1:8200".into()])
//!     .build()?;
//! let registry = NodeRegistry::connect(&cluster, &NodeClientConfig::default())?;
//!
//! for node in registry.iter() {
//!     let status = node.seal_status().await?;
//!     println!("{}: sealed={}", node.addr(), status.sealed);
//! }
//! ```

mod error;
pub mod mock;
mod node;
mod registry;
mod retry;
mod vault;

pub use error::{NodeError, Result};
pub use node::NodeClient;
pub use registry::NodeRegistry;
pub use retry::{RetryPolicy, with_retry};
pub use vault::{VaultClient, build_http_client};
