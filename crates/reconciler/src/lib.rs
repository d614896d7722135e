//! Cluster bootstrap and unseal-watch reconciliation.
//!
//! The [`Reconciler`] observes every node's seal status, decides whether the
//! cluster needs first-time initialization or steady-state unsealing, and
//! drives each node toward an initialized, unsealed state.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sealwatch_client::NodeRegistry;
//! use sealwatch_reconciler::Reconciler;
//! use tokio_util::sync::CancellationToken;
//!
//! let registry = NodeRegistry::connect(&cluster, &client_config)?;
//! let mut reconciler = Reconciler::new(registry, cluster, reconcile_config);
//!
//! let token = CancellationToken::new();
//! reconciler.run(&token).await?;
//! ```

mod bootstrap;
mod classify;
mod error;
mod health;
pub mod metrics;
mod reconciler;
mod unseal;

pub use bootstrap::{BootstrapOutcome, BootstrapReport, bootstrap_cluster};
pub use classify::{ClusterState, classify};
pub use error::ReconcileError;
pub use health::{HealthState, ReconcilerPhase};
pub use reconciler::{Reconciler, SweepReport};
pub use unseal::{UnsealOutcome, unseal_node};
