//! Reconciliation error types.

use std::time::Duration;

use sealwatch_client::NodeError;
use snafu::Snafu;

/// Errors that stop the reconciler.
///
/// Per-node transport and unseal failures never surface here; they are
/// logged and skipped by the sweep that observed them.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReconcileError {
    /// No nodes were configured.
    #[snafu(display("No nodes configured: the node registry is empty"))]
    EmptyRegistry,

    /// Some nodes are initialized and others are not.
    #[snafu(display(
        "Inconsistent cluster: {initialized} of {total} nodes report initialized"
    ))]
    InconsistentCluster {
        /// Nodes reporting `initialized == true`.
        initialized: usize,
        /// Nodes in the registry.
        total: usize,
    },

    /// The leader rejected or failed the initialize call.
    #[snafu(display("Failed to initialize leader {leader}: {source}"))]
    Initialize {
        /// Leader address.
        leader: String,
        /// Underlying node error.
        source: NodeError,
    },

    /// Not every node answered the initialization check in time.
    #[snafu(display("Initialization check did not complete within {timeout:?}"))]
    InitCheckTimeout {
        /// Configured upper bound.
        timeout: Duration,
    },

    /// The cancellation token fired before the phase completed.
    #[snafu(display("Reconciliation cancelled"))]
    Cancelled,
}

impl ReconcileError {
    /// Returns true for errors caused by the configured node set rather than
    /// by a runtime failure.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::EmptyRegistry | Self::InconsistentCluster { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(ReconcileError::EmptyRegistry.is_configuration());
        assert!(ReconcileError::InconsistentCluster { initialized: 1, total: 3 }.is_configuration());
        assert!(!ReconcileError::Cancelled.is_configuration());
        assert!(
            !ReconcileError::InitCheckTimeout { timeout: Duration::from_secs(30) }
                .is_configuration()
        );
    }

    #[test]
    fn test_display() {
        let err = ReconcileError::InconsistentCluster { initialized: 1, total: 3 };
        assert_eq!(err.to_string(), "Inconsistent cluster: 1 of 3 nodes report initialized");

        let err = ReconcileError::Initialize {
            leader: "http://vault-0:8200".to_owned(),
            source: NodeError::Timeout { addr: "http://vault-0:8200".to_owned() },
        };
        assert_eq!(
            err.to_string(),
            "Failed to initialize leader http://vault-0:8200: Request to http://vault-0:8200 timed out"
        );
    }
}
