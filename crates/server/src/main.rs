//! sealwatch daemon.
//!
//! Bootstraps a raft-backed Vault cluster on first start, then keeps every
//! node unsealed until stopped.
//!
//! # Usage
//!
//! ```bash
//! # Three-node cluster; vault-0 is the bootstrap leader
//! sealwatch \
//!   --vault-addr http://vault-0:8200 \
//!   --vault-addr http://vault-1:8200 \
//!   --vault-addr http://vault-2:8200
//!
//! # Same, from the environment
//! VAULT_ADDRS="http://vault-0:8200 http://vault-1:8200 http://vault-2:8200" \
//! SEALWATCH_SECRET_SHARES=5 SEALWATCH_SECRET_THRESHOLD=3 \
//! sealwatch
//!
//! # Settings file plus layered overrides
//! SEALWATCH__RECONCILE__WATCH_INTERVAL=10s sealwatch --config /etc/sealwatch.toml
//! ```

use std::{io::IsTerminal, net::SocketAddr};

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use sealwatch_client::{NodeError, NodeRegistry};
use sealwatch_reconciler::{HealthState, ReconcileError, Reconciler};
use sealwatch_server::{
    config::{self, Cli, CliCommand, ConfigAction, LogFormat, SettingsError},
    shutdown,
};
use snafu::{ResultExt, Snafu};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Top-level error type for the binary.
#[derive(Debug, Snafu)]
enum ServerError {
    #[snafu(display("settings error: {source}"))]
    Settings { source: SettingsError },

    #[snafu(display("node client error: {source}"))]
    Client { source: NodeError },

    #[snafu(display("metrics error: {message}"))]
    Metrics { message: String },

    #[snafu(display("reconciler error: {source}"))]
    Reconcile { source: ReconcileError },
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let cli = Cli::parse();

    if let Some(command) = &cli.command {
        match command {
            CliCommand::Config { action } => {
                let rendered = match action {
                    ConfigAction::Schema => config::generate_config_schema(),
                    ConfigAction::Example => config::generate_config_example(),
                }
                .context(SettingsSnafu)?;
                print!("{rendered}");
                return Ok(());
            },
        }
    }

    let settings = cli.settings().context(SettingsSnafu)?;

    init_logging(settings.log_format);

    if let Some(metrics_addr) = settings.metrics_addr {
        init_metrics_exporter(metrics_addr)?;
    }

    let registry = NodeRegistry::connect(&settings.cluster, &settings.client).context(ClientSnafu)?;

    tracing::info!(
        nodes = ?registry.addrs(),
        secret_shares = settings.cluster.secret_shares,
        secret_threshold = settings.cluster.secret_threshold,
        watch_interval = ?settings.reconcile.watch_interval,
        "Starting sealwatch"
    );

    let token = CancellationToken::new();
    tokio::spawn(shutdown::cancel_on(shutdown::shutdown_signal(), token.clone()));

    // Phase changes are published as the `sealwatch_phase` and `sealwatch_ready` gauges.
    let health = HealthState::new();
    let mut reconciler =
        Reconciler::new(registry, settings.cluster, settings.reconcile).with_health(health.clone());
    let result = reconciler.run(&token).await;

    match result {
        Ok(()) | Err(ReconcileError::Cancelled) => {
            tracing::info!(phase = health.phase().as_str(), "Shutdown complete");
            Ok(())
        },
        Err(e) => Err(e).context(ReconcileSnafu),
    }
}

/// Initializes the logging system.
///
/// Supports three formats:
/// - `Text`: Human-readable format (development)
/// - `Json`: JSON structured logging (production)
/// - `Auto`: JSON for non-TTY stdout, text otherwise
fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = match format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !std::io::stdout().is_terminal(),
    };

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().flatten_event(true).with_current_span(false))
            .init();
    } else {
        tracing_subscriber::registry().with(env_filter).with(fmt::layer()).init();
    }
}

/// Starts an HTTP listener exposing metrics at `/metrics`.
fn init_metrics_exporter(addr: SocketAddr) -> Result<(), ServerError> {
    PrometheusBuilder::new().with_http_listener(addr).install().map_err(|e| {
        MetricsSnafu { message: format!("failed to install Prometheus exporter: {e}") }.build()
    })?;

    tracing::info!(metrics_addr = %addr, "Prometheus metrics exporter started");
    Ok(())
}
