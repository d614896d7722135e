//! Reconciler metrics exposed via the `metrics` facade.
//!
//! ## Metric Naming Conventions
//!
//! All metrics follow the pattern: `sealwatch_{name}_{unit}`
//!
//! - Counters: `_total` suffix
//! - Histograms: `_seconds` suffix
//! - Gauges: no suffix
//!
//! Recording is a no-op until the binary installs a recorder.

use metrics::{counter, gauge, histogram};

use crate::health::ReconcilerPhase;

// =============================================================================
// Metric Names
// =============================================================================

const UNSEAL_SUBMISSIONS_TOTAL: &str = "sealwatch_unseal_submissions_total";
const UNSEAL_FAILURES_TOTAL: &str = "sealwatch_unseal_failures_total";
const STATUS_ERRORS_TOTAL: &str = "sealwatch_status_errors_total";
const JOIN_ATTEMPTS_TOTAL: &str = "sealwatch_join_attempts_total";
const JOIN_FAILURES_TOTAL: &str = "sealwatch_join_failures_total";
const BOOTSTRAPS_TOTAL: &str = "sealwatch_bootstraps_total";
const SEALED_NODES: &str = "sealwatch_sealed_nodes";
const REGISTRY_NODES: &str = "sealwatch_registry_nodes";
const SWEEP_DURATION: &str = "sealwatch_sweep_duration_seconds";
const PHASE: &str = "sealwatch_phase";
const READY: &str = "sealwatch_ready";

// =============================================================================
// Unseal
// =============================================================================

/// Records shares submitted to a sealed node.
#[inline]
pub fn record_unseal_submission(node: &str) {
    counter!(UNSEAL_SUBMISSIONS_TOTAL, "node" => node.to_string()).increment(1);
}

/// Records a failed unseal submission.
#[inline]
pub fn record_unseal_failure(node: &str) {
    counter!(UNSEAL_FAILURES_TOTAL, "node" => node.to_string()).increment(1);
}

/// Records a failed seal-status query.
///
/// `kind` is `transport` when the node could not be reached, `api` otherwise.
#[inline]
pub fn record_status_error(node: &str, transport: bool) {
    let kind = if transport { "transport" } else { "api" };
    counter!(STATUS_ERRORS_TOTAL, "node" => node.to_string(), "kind" => kind).increment(1);
}

// =============================================================================
// Bootstrap
// =============================================================================

/// Records a single raft join attempt.
#[inline]
pub fn record_join_attempt(node: &str) {
    counter!(JOIN_ATTEMPTS_TOTAL, "node" => node.to_string()).increment(1);
}

/// Records a follower that exhausted its join attempts.
#[inline]
pub fn record_join_failure(node: &str) {
    counter!(JOIN_FAILURES_TOTAL, "node" => node.to_string()).increment(1);
}

/// Records a completed bootstrap.
#[inline]
pub fn record_bootstrap(success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(BOOTSTRAPS_TOTAL, "status" => status).increment(1);
}

// =============================================================================
// Sweeps
// =============================================================================

/// Sets the number of nodes observed sealed in the last sweep.
#[inline]
pub fn set_sealed_nodes(count: usize) {
    gauge!(SEALED_NODES).set(count as f64);
}

/// Sets the number of registered nodes.
#[inline]
pub fn set_registry_nodes(count: usize) {
    gauge!(REGISTRY_NODES).set(count as f64);
}

/// Records how long a watch sweep took.
#[inline]
pub fn record_sweep_duration(latency_secs: f64) {
    histogram!(SWEEP_DURATION).record(latency_secs);
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Publishes the reconciler phase.
///
/// `sealwatch_phase` carries the phase ordinal (0 = starting .. 4 = stopped);
/// `sealwatch_ready` is 1 while steady-state sweeps are running.
#[inline]
pub fn set_phase(phase: ReconcilerPhase) {
    gauge!(PHASE).set(f64::from(phase as u8));
    let ready = if phase == ReconcilerPhase::Watching { 1.0 } else { 0.0 };
    gauge!(READY).set(ready);
}
