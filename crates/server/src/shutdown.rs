//! Graceful shutdown handling.
//!
//! Turns Ctrl-C and SIGTERM into cancellation of the reconciler's token.

use std::future::Future;

use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Waits for a shutdown signal (Ctrl-C or SIGTERM).
///
/// On Unix systems, it also handles SIGTERM for container environments. If a
/// handler cannot be installed, that signal source is logged and ignored.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}

/// Cancels `token` when `signal` completes.
///
/// Returns early, without cancelling, if the token is cancelled elsewhere
/// first.
pub async fn cancel_on<F>(signal: F, token: CancellationToken)
where
    F: Future<Output = ()>,
{
    tokio::select! {
        () = signal => token.cancel(),
        () = token.cancelled() => {},
    }
}
