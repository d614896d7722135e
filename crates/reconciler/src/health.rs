//! Reconciler lifecycle phase, shared with the binary.
//!
//! The phase only ever moves forward:
//! `Starting` → `CheckingCluster` → `Bootstrapping` → `Watching` → `Stopped`.
//! `Bootstrapping` is skipped when the cluster is already initialized.
//!
//! Every transition is also published as the `sealwatch_phase` and
//! `sealwatch_ready` gauges.

use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use crate::metrics;

/// Reconciler lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ReconcilerPhase {
    /// Constructed, not yet running.
    Starting = 0,
    /// Waiting for every node to answer the initialization check.
    CheckingCluster = 1,
    /// Initializing the leader and joining followers.
    Bootstrapping = 2,
    /// Steady-state unseal sweeps.
    Watching = 3,
    /// The run has returned.
    Stopped = 4,
}

impl ReconcilerPhase {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => Self::CheckingCluster,
            2 => Self::Bootstrapping,
            3 => Self::Watching,
            4 => Self::Stopped,
            _ => Self::Starting,
        }
    }

    /// Lowercase name, for logs and metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::CheckingCluster => "checking_cluster",
            Self::Bootstrapping => "bootstrapping",
            Self::Watching => "watching",
            Self::Stopped => "stopped",
        }
    }
}

/// Lock-free handle to the current phase. Clones share state.
#[derive(Debug, Clone)]
pub struct HealthState {
    phase: Arc<AtomicU8>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Creates a new `HealthState` in the `Starting` phase.
    pub fn new() -> Self {
        metrics::set_phase(ReconcilerPhase::Starting);
        Self { phase: Arc::new(AtomicU8::new(ReconcilerPhase::Starting as u8)) }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> ReconcilerPhase {
        ReconcilerPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Moves to `next` if it is later than the current phase.
    ///
    /// Returns `false` (leaving the phase unchanged) otherwise.
    pub fn advance(&self, next: ReconcilerPhase) -> bool {
        let advanced = self
            .phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (next as u8 > current).then_some(next as u8)
            })
            .is_ok();
        if advanced {
            metrics::set_phase(next);
        }
        advanced
    }

    /// Moves to `Stopped`. Idempotent.
    pub fn mark_stopped(&self) {
        self.phase.store(ReconcilerPhase::Stopped as u8, Ordering::Release);
        metrics::set_phase(ReconcilerPhase::Stopped);
    }

    /// Passes once the reconciler has reached the watch loop.
    pub fn startup_check(&self) -> bool {
        self.phase() >= ReconcilerPhase::Watching
    }

    /// Passes while steady-state sweeps are running.
    pub fn readiness_check(&self) -> bool {
        self.phase() == ReconcilerPhase::Watching
    }
}
