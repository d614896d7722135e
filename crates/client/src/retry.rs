//! Bounded retry with a fixed delay.
//!
//! Provides a retry wrapper using the `backon` crate, raced against a
//! cancellation token so that both the in-flight attempt and the delay
//! between attempts can be interrupted.

use std::{
    future::Future,
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use backon::{ConstantBuilder, Retryable};
use tokio_util::sync::CancellationToken;

use crate::error::{NodeError, Result};

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: u32,

    /// Delay between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, delay: Duration::from_secs(2) }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and delay.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Default::default() }
    }
}

/// Executes an async operation, retrying every failure up to the policy's
/// attempt budget with a fixed delay in between.
///
/// # Cancellation Semantics
///
/// - If the token is already cancelled at call time, returns `Cancelled` immediately.
/// - If the token is cancelled during an attempt or a delay, the pending work is dropped and
///   `Cancelled` is returned.
///
/// # Errors
///
/// - [`NodeError::RetryExhausted`] once `max_attempts` attempts have failed, carrying the
///   last error message. With a single-attempt policy the original error is returned instead.
/// - [`NodeError::Cancelled`] if the token fires first.
///
/// # Example
///
/// ```ignore
/// use sealwatch_client::{with_retry, RetryPolicy};
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// with_retry(&RetryPolicy::default(), &token, || node.join_raft_cluster(leader)).await?;
/// ```
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if token.is_cancelled() {
        return Err(NodeError::Cancelled);
    }

    // backon's max_times counts retries, not total attempts.
    let max_attempts = policy.max_attempts.max(1);
    let backoff = ConstantBuilder::default()
        .with_delay(policy.delay)
        .with_max_times((max_attempts - 1) as usize);

    let retries = AtomicU32::new(0);

    let retrying = operation
        .retry(backoff)
        .sleep(tokio::time::sleep)
        .notify(|err: &NodeError, delay: Duration| {
            let attempt = retries.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying after delay"
            );
        });

    let result = tokio::select! {
        biased;
        () = token.cancelled() => return Err(NodeError::Cancelled),
        result = retrying => result,
    };

    result.map_err(|e| {
        if max_attempts > 1 {
            NodeError::RetryExhausted { attempts: max_attempts, last_error: e.to_string() }
        } else {
            e
        }
    })
}
