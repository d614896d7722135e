//! Core types and configuration for sealwatch.
//!
//! This crate provides the foundational types shared by the node client, the
//! reconciler and the server binary:
//! - Cluster and reconciliation configuration with validated builders
//! - Node seal status snapshots
//! - Key material produced by cluster initialization

pub mod config;
pub mod types;

pub use config::{ClusterConfig, ConfigError, NodeClientConfig, ReconcileConfig};
pub use types::*;
