//! The reconciliation loop.
//!
//! A [`Reconciler`] runs in two phases:
//!
//! - **Phase A** (once): sweep every node's seal status until one sweep completes without
//!   errors, then classify the cluster. An uninitialized cluster is bootstrapped; a fully
//!   initialized one is left alone; anything else is fatal.
//! - **Phase B** (until cancelled): on every tick, sweep the registry and submit key shares to
//!   each node observed sealed.
//!
//! Sweeps are sequential. Every sleep and node call is raced against the
//! cancellation token passed to [`Reconciler::run`].

use std::time::Instant;

use sealwatch_client::{NodeClient, NodeRegistry, RetryPolicy};
use sealwatch_types::{ClusterConfig, KeyMaterial, NodeStatus, ReconcileConfig};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    bootstrap::{BootstrapReport, bootstrap_cluster},
    classify::{ClusterState, classify},
    error::ReconcileError,
    health::{HealthState, ReconcilerPhase},
    metrics,
    unseal::{UnsealOutcome, unseal_node},
};

/// Result of one Phase B sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Nodes whose status was fetched.
    pub checked: usize,
    /// Nodes found sealed.
    pub sealed: usize,
    /// Nodes that received unseal shares.
    pub unsealed: Vec<String>,
    /// Sealed nodes left alone because no key material is held.
    pub no_keys: Vec<String>,
    /// Nodes whose status could not be fetched.
    pub status_errors: Vec<String>,
    /// Sealed nodes that rejected their shares.
    pub unseal_errors: Vec<String>,
}

/// Drives a fixed set of nodes toward an initialized, unsealed cluster.
///
/// Owns the node registry and, if this process bootstrapped the cluster, the
/// key material. Key material is written at most once.
#[derive(Debug)]
pub struct Reconciler {
    registry: NodeRegistry,
    cluster: ClusterConfig,
    config: ReconcileConfig,
    keys: Option<KeyMaterial>,
    bootstrap: Option<BootstrapReport>,
    health: HealthState,
}

impl Reconciler {
    /// Creates a reconciler over `registry`.
    pub fn new(registry: NodeRegistry, cluster: ClusterConfig, config: ReconcileConfig) -> Self {
        metrics::set_registry_nodes(registry.len());
        Self { registry, cluster, config, keys: None, bootstrap: None, health: HealthState::new() }
    }

    /// Shares an externally created health handle.
    #[must_use]
    pub fn with_health(mut self, health: HealthState) -> Self {
        self.health = health;
        self
    }

    /// Seeds key material held by the caller, so that Phase B can unseal an
    /// already-initialized cluster.
    #[must_use]
    pub fn with_key_material(mut self, keys: KeyMaterial) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Health handle tracking the current phase.
    pub fn health(&self) -> &HealthState {
        &self.health
    }

    /// Key material, if this process bootstrapped the cluster or was seeded.
    pub fn key_material(&self) -> Option<&KeyMaterial> {
        self.keys.as_ref()
    }

    /// Report of the bootstrap this process ran, if any.
    pub fn bootstrap_report(&self) -> Option<&BootstrapReport> {
        self.bootstrap.as_ref()
    }

    /// Runs Phase A, bootstraps if needed, then watches until `token` fires.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::EmptyRegistry`] if no nodes are configured.
    /// - [`ReconcileError::InconsistentCluster`] if only some nodes are initialized.
    /// - [`ReconcileError::InitCheckTimeout`] if Phase A exceeds its configured bound.
    /// - [`ReconcileError::Initialize`] if bootstrap fails to initialize the leader.
    /// - [`ReconcileError::Cancelled`] if the token fires before Phase B starts.
    ///
    /// Cancellation during Phase B returns `Ok(())`.
    pub async fn run(&mut self, token: &CancellationToken) -> Result<(), ReconcileError> {
        let result = self.run_phases(token).await;
        self.health.mark_stopped();
        match &result {
            Ok(()) => info!("Reconciler stopped"),
            Err(ReconcileError::Cancelled) => info!("Reconciler cancelled before watch loop"),
            Err(e) => error!(error = %e, "Reconciler failed"),
        }
        result
    }

    async fn run_phases(&mut self, token: &CancellationToken) -> Result<(), ReconcileError> {
        if self.registry.is_empty() {
            return Err(ReconcileError::EmptyRegistry);
        }

        info!(nodes = ?self.registry.addrs(), "Starting reconciler");
        self.health.advance(ReconcilerPhase::CheckingCluster);

        match self.check_initialization(token).await? {
            ClusterState::Uninitialized => self.bootstrap_once(token).await?,
            ClusterState::Initialized => {
                info!(
                    nodes = self.registry.len(),
                    has_keys = self.has_keys(),
                    "Cluster already initialized; skipping bootstrap"
                );
            },
            ClusterState::Inconsistent { initialized, total } => {
                return Err(ReconcileError::InconsistentCluster { initialized, total });
            },
        }

        self.watch(token).await;
        Ok(())
    }

    /// Phase A: sweeps the registry until every node answers, then classifies it.
    ///
    /// Any status error restarts the sweep after `init_poll_interval`.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::InitCheckTimeout`] if `init_check_timeout` elapses first.
    /// - [`ReconcileError::Cancelled`] if the token fires first.
    pub async fn check_initialization(
        &self,
        token: &CancellationToken,
    ) -> Result<ClusterState, ReconcileError> {
        let poll = self.poll_until_complete(token);
        let statuses = match self.config.init_check_timeout {
            Some(timeout) => tokio::time::timeout(timeout, poll)
                .await
                .map_err(|_| ReconcileError::InitCheckTimeout { timeout })??,
            None => poll.await?,
        };

        let state = classify(&statuses);
        info!(state = state.as_str(), nodes = statuses.len(), "Cluster initialization checked");
        Ok(state)
    }

    async fn poll_until_complete(
        &self,
        token: &CancellationToken,
    ) -> Result<Vec<NodeStatus>, ReconcileError> {
        let mut sweep: u32 = 0;
        loop {
            sweep += 1;
            if let Some(statuses) = self.sweep_statuses(token).await? {
                return Ok(statuses);
            }

            debug!(
                sweep,
                retry_in_ms = self.config.init_poll_interval.as_millis() as u64,
                "Initialization check incomplete; retrying"
            );
            token
                .run_until_cancelled(tokio::time::sleep(self.config.init_poll_interval))
                .await
                .ok_or(ReconcileError::Cancelled)?;
        }
    }

    /// Fetches every node's status. Returns `None` if any node failed.
    async fn sweep_statuses(
        &self,
        token: &CancellationToken,
    ) -> Result<Option<Vec<NodeStatus>>, ReconcileError> {
        let mut statuses = Vec::with_capacity(self.registry.len());
        let mut failed = 0usize;

        for node in self.registry.iter() {
            match token.run_until_cancelled(node.seal_status()).await {
                None => return Err(ReconcileError::Cancelled),
                Some(Ok(status)) => statuses.push(status),
                Some(Err(e)) => {
                    failed += 1;
                    metrics::record_status_error(node.addr(), e.is_transport());
                    warn!(node = %node.addr(), error = %e, "Failed to query seal status");
                },
            }
        }

        Ok((failed == 0).then_some(statuses))
    }

    async fn bootstrap_once(&mut self, token: &CancellationToken) -> Result<(), ReconcileError> {
        if self.bootstrap.is_some() {
            warn!("Cluster already bootstrapped by this process; skipping");
            return Ok(());
        }

        self.health.advance(ReconcilerPhase::Bootstrapping);
        let policy = RetryPolicy::new(self.config.join_max_attempts, self.config.join_retry_delay);
        let outcome = bootstrap_cluster(&self.registry, &self.cluster, &policy, token).await?;

        self.keys = Some(outcome.keys);
        self.bootstrap = Some(outcome.report);
        Ok(())
    }

    /// Phase B: sweeps every `watch_interval` until `token` fires.
    pub async fn watch(&self, token: &CancellationToken) {
        self.health.advance(ReconcilerPhase::Watching);
        info!(
            interval_ms = self.config.watch_interval.as_millis() as u64,
            has_keys = self.has_keys(),
            "Watching for sealed nodes"
        );

        let mut ticker = tokio::time::interval(self.config.watch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = ticker.tick() => {},
            }
            self.watch_once(token).await;
        }

        info!("Watch loop stopped");
    }

    /// Runs a single Phase B sweep.
    ///
    /// Status errors and unseal errors are logged and recorded in the report;
    /// neither stops the sweep. If `token` fires mid-sweep the remaining nodes
    /// are skipped.
    pub async fn watch_once(&self, token: &CancellationToken) -> SweepReport {
        let start = Instant::now();
        let mut report = SweepReport::default();

        for node in self.registry.iter() {
            let addr = node.addr();
            let status = match token.run_until_cancelled(node.seal_status()).await {
                None => break,
                Some(Ok(status)) => status,
                Some(Err(e)) => {
                    metrics::record_status_error(addr, e.is_transport());
                    if e.is_transport() {
                        warn!(node = %addr, error = %e, "Node unreachable; skipping");
                    } else {
                        error!(node = %addr, error = %e, "Failed to query seal status; skipping");
                    }
                    report.status_errors.push(addr.to_owned());
                    continue;
                },
            };
            report.checked += 1;

            if !status.sealed {
                continue;
            }
            report.sealed += 1;

            match token.run_until_cancelled(self.unseal(&**node)).await {
                None => break,
                Some(Ok(UnsealOutcome::Submitted(_))) => report.unsealed.push(addr.to_owned()),
                Some(Ok(UnsealOutcome::NoKeys)) => report.no_keys.push(addr.to_owned()),
                Some(Err(e)) => {
                    error!(node = %addr, error = %e, "Failed to unseal node");
                    report.unseal_errors.push(addr.to_owned());
                },
            }
        }

        metrics::set_sealed_nodes(report.sealed);
        metrics::record_sweep_duration(start.elapsed().as_secs_f64());
        debug!(
            checked = report.checked,
            sealed = report.sealed,
            unsealed = report.unsealed.len(),
            status_errors = report.status_errors.len(),
            "Sweep complete"
        );
        report
    }

    fn has_keys(&self) -> bool {
        self.keys.as_ref().is_some_and(|keys| !keys.is_empty())
    }

    async fn unseal(&self, node: &dyn NodeClient) -> sealwatch_client::Result<UnsealOutcome> {
        unseal_node(node, self.keys.as_ref(), self.cluster.secret_threshold).await
    }
}
