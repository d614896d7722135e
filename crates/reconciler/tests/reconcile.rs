//! End-to-end reconciliation scenarios against in-memory nodes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods, clippy::panic)]

use std::{sync::Arc, time::Duration};

use sealwatch_client::{NodeRegistry, mock::MockNode};
use sealwatch_reconciler::{
    ClusterState, HealthState, ReconcileError, Reconciler, ReconcilerPhase,
};
use sealwatch_types::{ClusterConfig, KeyMaterial, NodeStatus, ReconcileConfig};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn node(i: usize) -> Arc<MockNode> {
    Arc::new(MockNode::new(format!("http://vault-{i}:8200")))
}

fn node_with(i: usize, status: &NodeStatus) -> Arc<MockNode> {
    Arc::new(MockNode::with_status(format!("http://vault-{i}:8200"), status))
}

fn registry(nodes: &[Arc<MockNode>]) -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    for node in nodes {
        registry.insert(node.clone());
    }
    registry
}

fn reconciler(nodes: &[Arc<MockNode>]) -> Reconciler {
    Reconciler::new(registry(nodes), ClusterConfig::default(), ReconcileConfig::default())
}

/// Cancels `token` after `after` of (virtual) time.
fn cancel_after(token: &CancellationToken, after: Duration) {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        token.cancel();
    });
}

// =============================================================================
// Bootstrap decision
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_uninitialized_cluster_bootstraps_exactly_once() {
    let nodes = vec![node(0), node(1), node(2)];
    let mut reconciler = reconciler(&nodes);
    let token = CancellationToken::new();
    cancel_after(&token, Duration::from_secs(23));

    reconciler.run(&token).await.unwrap();

    assert_eq!(nodes[0].init_calls(), 1);
    assert_eq!(nodes[1].init_calls(), 0);
    assert_eq!(nodes[2].init_calls(), 0);
    assert_eq!(nodes[1].joined_leader().as_deref(), Some("http://vault-0:8200"));
    assert_eq!(nodes[2].joined_leader().as_deref(), Some("http://vault-0:8200"));

    // Leader unsealed during bootstrap, followers by the first watch sweep.
    assert_eq!(nodes[0].submitted_shares(), vec![vec!["key-0", "key-1", "key-2"]]);
    assert!(nodes.iter().all(|n| !n.is_sealed()));

    let report = reconciler.bootstrap_report().unwrap();
    assert_eq!(report.leader, "http://vault-0:8200");
    assert_eq!(report.joined.len(), 2);
    assert_eq!(reconciler.key_material().unwrap().len(), 5);
    assert_eq!(reconciler.health().phase(), ReconcilerPhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_initialized_cluster_never_calls_initialize() {
    let nodes = vec![
        node_with(0, &NodeStatus::unsealed()),
        node_with(1, &NodeStatus::unsealed()),
        node_with(2, &NodeStatus::sealed()),
    ];
    let mut reconciler = reconciler(&nodes);
    let token = CancellationToken::new();
    cancel_after(&token, Duration::from_secs(11));

    reconciler.run(&token).await.unwrap();

    for node in &nodes {
        assert_eq!(node.init_calls(), 0);
        assert_eq!(node.join_calls(), 0);
        // No key material was ever produced in this process.
        assert_eq!(node.unseal_calls(), 0);
    }
    assert!(reconciler.key_material().is_none());
    assert!(reconciler.bootstrap_report().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_mixed_cluster_fails_fast() {
    let nodes = vec![
        node_with(0, &NodeStatus::unsealed()),
        node_with(1, &NodeStatus::uninitialized()),
        node_with(2, &NodeStatus::uninitialized()),
    ];
    let mut reconciler = reconciler(&nodes);

    let err = reconciler.run(&CancellationToken::new()).await.unwrap_err();

    match &err {
        ReconcileError::InconsistentCluster { initialized, total } => {
            assert_eq!(*initialized, 1);
            assert_eq!(*total, 3);
        },
        other => panic!("expected InconsistentCluster, got {other:?}"),
    }
    assert!(err.is_configuration());
    for node in &nodes {
        assert_eq!(node.init_calls(), 0);
        assert_eq!(node.unseal_calls(), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_node_cluster() {
    let nodes = vec![node(0)];
    let mut reconciler = Reconciler::new(
        registry(&nodes),
        ClusterConfig::builder().secret_shares(1).secret_threshold(1).build().unwrap(),
        ReconcileConfig::default(),
    );
    let token = CancellationToken::new();
    cancel_after(&token, Duration::from_secs(1));

    reconciler.run(&token).await.unwrap();

    assert_eq!(nodes[0].init_calls(), 1);
    assert_eq!(nodes[0].submitted_shares(), vec![vec!["key-0"]]);
    assert!(!nodes[0].is_sealed());
}

// =============================================================================
// Phase A
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_initialization_check_retries_until_every_node_answers() {
    let nodes = vec![node(0), node(1)];
    nodes[1].fail_status_checks(2);
    let reconciler = reconciler(&nodes);
    let start = Instant::now();

    let state = reconciler.check_initialization(&CancellationToken::new()).await.unwrap();

    assert_eq!(state, ClusterState::Uninitialized);
    assert_eq!(nodes[0].status_calls(), 3);
    assert_eq!(nodes[1].status_calls(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_initialization_check_timeout() {
    let nodes = vec![node(0), node(1)];
    nodes[1].set_unreachable(true);
    let config =
        ReconcileConfig::builder().init_check_timeout(Duration::from_secs(5)).build().unwrap();
    let mut reconciler = Reconciler::new(registry(&nodes), ClusterConfig::default(), config);

    let err = reconciler.run(&CancellationToken::new()).await.unwrap_err();

    match err {
        ReconcileError::InitCheckTimeout { timeout } => {
            assert_eq!(timeout, Duration::from_secs(5));
        },
        other => panic!("expected InitCheckTimeout, got {other:?}"),
    }
    assert_eq!(nodes[0].init_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_during_initialization_check() {
    let nodes = vec![node(0)];
    nodes[0].set_unreachable(true);
    let mut reconciler = reconciler(&nodes);
    let token = CancellationToken::new();
    cancel_after(&token, Duration::from_millis(2500));

    let err = reconciler.run(&token).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Cancelled));
    assert_eq!(nodes[0].status_calls(), 3);
    assert_eq!(reconciler.health().phase(), ReconcilerPhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_initialize_failure_stops_reconciler() {
    let nodes = vec![node(0), node(1)];
    nodes[0].fail_initialize("storage backend unavailable");
    let mut reconciler = reconciler(&nodes);

    let err = reconciler.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Initialize { .. }));
    assert!(!err.is_configuration());
    assert_eq!(nodes[0].init_calls(), 1);
    assert_eq!(nodes[1].join_calls(), 0);
}

// =============================================================================
// Bootstrap joins
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_exhausted_join_still_completes_bootstrap() {
    let nodes = vec![node(0), node(1), node(2)];
    nodes[1].fail_joins(3);
    let mut reconciler = reconciler(&nodes);
    let token = CancellationToken::new();
    cancel_after(&token, Duration::from_secs(6));

    reconciler.run(&token).await.unwrap();

    assert_eq!(nodes[1].join_calls(), 3);
    assert_eq!(nodes[2].join_calls(), 1);
    let report = reconciler.bootstrap_report().unwrap();
    assert_eq!(report.failed, vec!["http://vault-1:8200"]);
    assert_eq!(report.joined, vec!["http://vault-2:8200"]);
    assert!(!nodes[2].is_sealed());
}

// =============================================================================
// Phase B
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_steady_state_unseals_only_sealed_nodes() {
    let a = node_with(0, &NodeStatus::unsealed());
    let b = node_with(1, &NodeStatus::sealed());
    let c = node_with(2, &NodeStatus::sealed());
    c.set_unreachable(true);
    let keys = KeyMaterial::new((0..5).map(|i| format!("share-{i}")).collect(), None);
    let reconciler = reconciler(&[a.clone(), b.clone(), c.clone()]).with_key_material(keys);

    let report = reconciler.watch_once(&CancellationToken::new()).await;

    assert_eq!(report.checked, 2);
    assert_eq!(report.sealed, 1);
    assert_eq!(report.unsealed, vec!["http://vault-1:8200"]);
    assert_eq!(report.status_errors, vec!["http://vault-2:8200"]);
    assert!(report.unseal_errors.is_empty());

    assert_eq!(a.unseal_calls(), 0);
    assert_eq!(b.submitted_shares(), vec![vec!["share-0", "share-1", "share-2"]]);
    assert!(!b.is_sealed());
    assert_eq!(c.unseal_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_resealed_node_is_unsealed_again() {
    let nodes = vec![node(0), node(1)];
    let mut reconciler = reconciler(&nodes);
    let token = CancellationToken::new();

    let leader = nodes[0].clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        leader.seal();
    });
    cancel_after(&token, Duration::from_secs(12));

    reconciler.run(&token).await.unwrap();

    // Once during bootstrap, once after the restart.
    assert_eq!(nodes[0].submitted_shares().len(), 2);
    assert!(!nodes[0].is_sealed());
    assert_eq!(nodes[0].init_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_node_recovers_between_sweeps() {
    let nodes = vec![node_with(0, &NodeStatus::unsealed()), node_with(1, &NodeStatus::sealed())];
    let keys = KeyMaterial::new(vec!["k0".into(), "k1".into(), "k2".into()], None);
    let reconciler = reconciler(&nodes).with_key_material(keys);
    let token = CancellationToken::new();

    nodes[1].set_unreachable(true);
    let first = reconciler.watch_once(&token).await;
    assert_eq!(first.status_errors, vec!["http://vault-1:8200"]);

    nodes[1].set_unreachable(false);
    let second = reconciler.watch_once(&token).await;
    assert_eq!(second.unsealed, vec!["http://vault-1:8200"]);
    assert!(!nodes[1].is_sealed());
}

#[tokio::test(start_paused = true)]
async fn test_watch_sweeps_on_interval() {
    let nodes = vec![node_with(0, &NodeStatus::unsealed())];
    let mut reconciler = reconciler(&nodes);
    let token = CancellationToken::new();
    cancel_after(&token, Duration::from_secs(12));

    reconciler.run(&token).await.unwrap();

    // Phase A once, then sweeps at 0s, 5s and 10s.
    assert_eq!(nodes[0].status_calls(), 4);
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_shared_health_reports_ready_while_watching() {
    let nodes = vec![node(0), node(1)];
    let health = HealthState::new();
    let mut reconciler = reconciler(&nodes).with_health(health.clone());
    let token = CancellationToken::new();

    let observer = health.clone();
    let sampled = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        (observer.phase(), observer.readiness_check())
    });
    cancel_after(&token, Duration::from_secs(6));

    assert_eq!(health.phase(), ReconcilerPhase::Starting);
    reconciler.run(&token).await.unwrap();

    let (phase, ready) = sampled.await.unwrap();
    assert_eq!(phase, ReconcilerPhase::Watching);
    assert!(ready);
    assert_eq!(health.phase(), ReconcilerPhase::Stopped);
    assert!(health.startup_check());
    assert!(!health.readiness_check());
}

#[tokio::test(start_paused = true)]
async fn test_shared_health_never_ready_on_failure() {
    let nodes = vec![node_with(0, &NodeStatus::unsealed()), node(1)];
    let health = HealthState::new();
    let mut reconciler = reconciler(&nodes).with_health(health.clone());

    reconciler.run(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(health.phase(), ReconcilerPhase::Stopped);
    assert!(!health.readiness_check());
}
