//! One-time cluster formation.
//!
//! The first registry node is initialized and unsealed, then every other node
//! is joined to it through raft:
//!
//! 1. `initialize(secret_shares, secret_threshold)` on the leader. A failure here is fatal and
//!    never retried: a half-initialized leader needs an operator.
//! 2. Unseal the leader with the first `secret_threshold` shares. A failure is logged and the
//!    watch loop retries it, since the keys are still held.
//! 3. `join_raft_cluster(leader)` on each follower in registry order, with a bounded fixed-delay
//!    retry. A follower that exhausts its attempts is logged and skipped. If the leader is still
//!    sealed no join is attempted and every follower is reported as failed.

use sealwatch_client::{NodeError, NodeRegistry, RetryPolicy, with_retry};
use sealwatch_types::{ClusterConfig, KeyMaterial};
use snafu::{OptionExt, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    error::{CancelledSnafu, EmptyRegistrySnafu, InitializeSnafu, ReconcileError},
    metrics,
    unseal::{UnsealOutcome, unseal_node},
};

/// Per-node results of a bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Address of the initialized node.
    pub leader: String,
    /// Whether the leader accepted its unseal shares.
    pub leader_unsealed: bool,
    /// Followers that joined the leader.
    pub joined: Vec<String>,
    /// Followers that exhausted their join attempts, or were never tried
    /// because the leader stayed sealed.
    pub failed: Vec<String>,
}

/// Key material and per-node results produced by [`bootstrap_cluster`].
#[derive(Debug)]
pub struct BootstrapOutcome {
    /// Shares and root token returned by the leader.
    pub keys: KeyMaterial,
    /// What happened on each node.
    pub report: BootstrapReport,
}

/// Initializes the leader, unseals it and joins every follower to it.
///
/// # Errors
///
/// - [`ReconcileError::EmptyRegistry`] if there is no leader.
/// - [`ReconcileError::Initialize`] if the leader fails to initialize.
/// - [`ReconcileError::Cancelled`] if the token fires at any point.
pub async fn bootstrap_cluster(
    registry: &NodeRegistry,
    cluster: &ClusterConfig,
    join_policy: &RetryPolicy,
    token: &CancellationToken,
) -> Result<BootstrapOutcome, ReconcileError> {
    let leader = registry.leader().context(EmptyRegistrySnafu)?;
    let leader_addr = leader.addr();

    info!(
        leader = %leader_addr,
        followers = registry.len() - 1,
        secret_shares = cluster.secret_shares,
        secret_threshold = cluster.secret_threshold,
        "Bootstrapping cluster"
    );

    let keys = token
        .run_until_cancelled(leader.initialize(cluster.secret_shares, cluster.secret_threshold))
        .await
        .context(CancelledSnafu)?
        .context(InitializeSnafu { leader: leader_addr })
        .inspect_err(|_| metrics::record_bootstrap(false))?;

    info!(leader = %leader_addr, shares = keys.len(), "Leader initialized");

    let mut report = BootstrapReport { leader: leader_addr.to_owned(), ..Default::default() };

    match token
        .run_until_cancelled(unseal_node(&**leader, Some(&keys), cluster.secret_threshold))
        .await
    {
        None => return Err(ReconcileError::Cancelled),
        Some(Ok(UnsealOutcome::Submitted(_))) => {
            report.leader_unsealed = true;
        },
        Some(Ok(UnsealOutcome::NoKeys)) => {},
        Some(Err(e)) => {
            error!(leader = %leader_addr, error = %e, "Failed to unseal leader");
        },
    }

    if !report.leader_unsealed {
        report.failed = registry.followers().map(|f| f.addr().to_owned()).collect();
        error!(
            leader = %leader_addr,
            skipped = ?report.failed,
            "Leader is sealed; skipping raft joins"
        );
        metrics::record_bootstrap(true);
        return Ok(BootstrapOutcome { keys, report });
    }

    for follower in registry.followers() {
        let addr = follower.addr();
        info!(node = %addr, leader = %leader_addr, "Joining raft cluster");

        let result = with_retry(join_policy, token, move || {
            metrics::record_join_attempt(addr);
            follower.join_raft_cluster(leader_addr)
        })
        .await;

        match result {
            Ok(()) => {
                info!(node = %addr, leader = %leader_addr, "Node joined raft cluster");
                report.joined.push(addr.to_owned());
            },
            Err(NodeError::Cancelled) => return Err(ReconcileError::Cancelled),
            Err(e) => {
                metrics::record_join_failure(addr);
                error!(
                    node = %addr,
                    leader = %leader_addr,
                    attempts = join_policy.max_attempts,
                    error = %e,
                    "Failed to join raft cluster; giving up on node"
                );
                report.failed.push(addr.to_owned());
            },
        }
    }

    if report.failed.is_empty() {
        info!(leader = %leader_addr, joined = report.joined.len(), "Bootstrap complete");
    } else {
        warn!(
            leader = %leader_addr,
            joined = report.joined.len(),
            failed = ?report.failed,
            "Bootstrap complete with failed joins"
        );
    }
    metrics::record_bootstrap(true);

    Ok(BootstrapOutcome { keys, report })
}
