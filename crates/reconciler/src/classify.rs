//! Cluster-wide initialization classification.

use sealwatch_types::NodeStatus;

/// Initialization state of the whole cluster, derived from one complete sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    /// No node is initialized: the cluster needs bootstrapping.
    Uninitialized,
    /// Every node is initialized.
    Initialized,
    /// Some nodes are initialized and others are not.
    Inconsistent {
        /// Nodes reporting initialized.
        initialized: usize,
        /// Nodes swept.
        total: usize,
    },
}

impl ClusterState {
    /// Lowercase name, for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Inconsistent { .. } => "inconsistent",
        }
    }
}

/// Classifies a complete sweep. An empty sweep counts as uninitialized.
pub fn classify(statuses: &[NodeStatus]) -> ClusterState {
    let total = statuses.len();
    let initialized = statuses.iter().filter(|s| s.initialized).count();
    if initialized == 0 {
        ClusterState::Uninitialized
    } else if initialized == total {
        ClusterState::Initialized
    } else {
        ClusterState::Inconsistent { initialized, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_fresh() {
        let statuses = vec![NodeStatus::uninitialized(); 3];
        assert_eq!(classify(&statuses), ClusterState::Uninitialized);
    }

    #[test]
    fn test_all_initialized_regardless_of_seal() {
        let statuses = vec![NodeStatus::unsealed(), NodeStatus::sealed(), NodeStatus::sealed()];
        assert_eq!(classify(&statuses), ClusterState::Initialized);
    }

    #[test]
    fn test_mixed() {
        let statuses =
            vec![NodeStatus::unsealed(), NodeStatus::uninitialized(), NodeStatus::uninitialized()];
        assert_eq!(classify(&statuses), ClusterState::Inconsistent { initialized: 1, total: 3 });
        assert_eq!(classify(&statuses).as_str(), "inconsistent");
    }

    #[test]
    fn test_single_node() {
        assert_eq!(classify(&[NodeStatus::uninitialized()]), ClusterState::Uninitialized);
        assert_eq!(classify(&[NodeStatus::sealed()]), ClusterState::Initialized);
    }
}
