//! Submitting key shares to a sealed node.

use sealwatch_client::{NodeClient, Result};
use sealwatch_types::KeyMaterial;
use tracing::{info, warn};

use crate::metrics;

/// What [`unseal_node`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsealOutcome {
    /// No key material is held, or it holds no shares; nothing was submitted.
    NoKeys,
    /// This many shares were submitted.
    Submitted(usize),
}

/// Unseals `node` with the first `threshold` shares of `keys`.
///
/// Without key material, or with key material that carries no shares, this
/// is a no-op. Submission is attempted once; the
/// caller decides what a failure means.
///
/// # Errors
///
/// Returns the node error from the submission unchanged.
pub async fn unseal_node(
    node: &dyn NodeClient,
    keys: Option<&KeyMaterial>,
    threshold: u8,
) -> Result<UnsealOutcome> {
    let Some(keys) = keys.filter(|k| !k.is_empty()) else {
        info!(node = %node.addr(), "Node is sealed but no keys available; skipping unseal");
        return Ok(UnsealOutcome::NoKeys);
    };

    let shares = keys.unseal_shares(threshold);
    warn!(node = %node.addr(), shares = shares.len(), "Unsealing node");

    match node.submit_unseal_shares(shares).await {
        Ok(()) => {
            metrics::record_unseal_submission(node.addr());
            Ok(UnsealOutcome::Submitted(shares.len()))
        },
        Err(e) => {
            metrics::record_unseal_failure(node.addr());
            Err(e)
        },
    }
}
