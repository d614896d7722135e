//! Daemon settings and command-line interface.
//!
//! Settings are layered, later sources winning:
//!
//! 1. Built-in defaults
//! 2. The TOML file given by `--config`
//! 3. `SEALWATCH__`-prefixed environment variables, with `__` separating nesting levels
//!    (e.g. `SEALWATCH__RECONCILE__WATCH_INTERVAL=10s`)
//! 4. Command-line flags and their environment variables (e.g. `VAULT_ADDRS`)
//!
//! The merged result is validated once, before anything talks to a node.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{Parser, Subcommand, ValueEnum};
use schemars::JsonSchema;
use sealwatch_types::{ClusterConfig, NodeClientConfig, ReconcileConfig};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

/// Prefix for layered environment overrides.
const ENV_PREFIX: &str = "SEALWATCH";

/// Errors from loading, validating or rendering settings.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SettingsError {
    /// The file or environment layer could not be read or deserialized.
    #[snafu(display("failed to load settings: {source}"))]
    Load {
        /// Underlying loader error.
        source: config::ConfigError,
    },

    /// A merged value failed validation.
    #[snafu(display("{source}"))]
    Invalid {
        /// Validation error.
        source: sealwatch_types::ConfigError,
    },

    /// The schema or example could not be rendered.
    #[snafu(display("failed to render {what}: {message}"))]
    Render {
        /// What was being rendered.
        what: &'static str,
        /// Error description.
        message: String,
    },
}

/// Log output format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON when stdout is not a terminal, text otherwise.
    #[default]
    Auto,
    /// Human-readable text.
    Text,
    /// One JSON object per line.
    Json,
}

/// Complete daemon settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Settings {
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Address for the Prometheus `/metrics` listener. Disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub metrics_addr: Option<SocketAddr>,
    /// Nodes and key-splitting parameters.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Reconciliation timing and retries.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Node API transport.
    #[serde(default)]
    pub client: NodeClientConfig,
}

impl Settings {
    /// Loads the file and environment layers from the process environment.
    ///
    /// The result is not validated; call [`Settings::validate`] once all
    /// overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Load`] if the file cannot be read or a value
    /// has the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with_env(path, None)
    }

    /// Like [`Settings::load`], reading environment overrides from `env`
    /// instead of the process environment when given.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Load`] if the file cannot be read or a value
    /// has the wrong type.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder =
                builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
        }

        // SEALWATCH__CLUSTER__NODES takes a space-separated list.
        let builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(" ")
                .with_list_parse_key("cluster.nodes")
                .try_parsing(true)
                .source(env),
        );

        builder.build().context(LoadSnafu)?.try_deserialize().context(LoadSnafu)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] for the first invalid value.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.cluster.validate().context(InvalidSnafu)?;
        self.reconcile.validate().context(InvalidSnafu)?;
        self.client.validate().context(InvalidSnafu)?;
        Ok(())
    }
}

/// Renders the JSON schema of the settings file.
///
/// # Errors
///
/// Returns [`SettingsError::Render`] if serialization fails.
pub fn generate_config_schema() -> Result<String, SettingsError> {
    let schema = schemars::schema_for!(Settings);
    serde_json::to_string_pretty(&schema)
        .map(|json| json + "\n")
        .map_err(|e| RenderSnafu { what: "schema", message: e.to_string() }.build())
}

/// Renders an example settings file for a three-node cluster.
///
/// # Errors
///
/// Returns [`SettingsError::Render`] if serialization fails.
pub fn generate_config_example() -> Result<String, SettingsError> {
    let example = Settings {
        cluster: ClusterConfig {
            nodes: (0..3).map(|i| format!("http://vault-{i}.vault-internal:8200")).collect(),
            ..Default::default()
        },
        ..Default::default()
    };
    let body = toml::to_string_pretty(&example)
        .map_err(|e| RenderSnafu { what: "example", message: e.to_string() }.build())?;
    Ok(format!("# sealwatch settings\n# The first node is the bootstrap leader.\n\n{body}"))
}

/// sealwatch: bootstraps a raft-backed Vault cluster and keeps every node unsealed.
#[derive(Debug, Parser)]
#[command(name = "sealwatch", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand; runs the daemon when omitted.
    #[command(subcommand)]
    pub command: Option<CliCommand>,

    /// TOML settings file.
    #[arg(long, env = "SEALWATCH_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Node base address. Repeat for each node; the first is the bootstrap leader.
    #[arg(long = "vault-addr", value_name = "URL")]
    pub vault_addr: Vec<String>,

    /// Whitespace-separated node base addresses, used when no --vault-addr is given.
    #[arg(long = "vault-addrs", env = "VAULT_ADDRS", value_name = "URLS")]
    pub vault_addrs: Option<String>,

    /// Total key shares generated at initialization.
    #[arg(long, env = "SEALWATCH_SECRET_SHARES")]
    pub secret_shares: Option<u8>,

    /// Key shares required to unseal.
    #[arg(long, env = "SEALWATCH_SECRET_THRESHOLD")]
    pub secret_threshold: Option<u8>,

    /// Legacy name for `--secret-shares`, read from `VOM_SECRET_SHARES`.
    #[arg(long = "vom-secret-shares", env = "VOM_SECRET_SHARES", hide = true)]
    pub legacy_secret_shares: Option<u8>,

    /// Legacy name for `--secret-threshold`, read from `VOM_SECRET_THRESHOLD`.
    #[arg(long = "vom-secret-threshold", env = "VOM_SECRET_THRESHOLD", hide = true)]
    pub legacy_secret_threshold: Option<u8>,

    /// Interval between steady-state seal checks (e.g. `5s`).
    #[arg(long, env = "SEALWATCH_WATCH_INTERVAL", value_parser = humantime::parse_duration)]
    pub watch_interval: Option<Duration>,

    /// Give up if not every node answers the initialization check within this bound.
    #[arg(long, env = "SEALWATCH_INIT_CHECK_TIMEOUT", value_parser = humantime::parse_duration)]
    pub init_check_timeout: Option<Duration>,

    /// Per-request timeout for node API calls.
    #[arg(long, env = "SEALWATCH_REQUEST_TIMEOUT", value_parser = humantime::parse_duration)]
    pub request_timeout: Option<Duration>,

    /// PEM bundle of additional CA certificates to trust.
    #[arg(long, env = "SEALWATCH_CA_CERT", value_name = "PATH")]
    pub ca_cert: Option<PathBuf>,

    /// Skip TLS certificate verification. Development only.
    #[arg(long, env = "SEALWATCH_TLS_SKIP_VERIFY")]
    pub tls_skip_verify: bool,

    /// Log output format.
    #[arg(long, env = "SEALWATCH_LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    /// Address for the Prometheus `/metrics` listener (e.g. `0.0.0.0:9102`).
    #[arg(long, env = "SEALWATCH_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Inspect the settings file format.
    Config {
        /// What to print.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// `sealwatch config` actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the JSON schema of the settings file.
    Schema,
    /// Print an example settings file.
    Example,
}

impl Cli {
    /// Loads, overrides and validates the daemon settings.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if loading or validation fails.
    pub fn settings(&self) -> Result<Settings, SettingsError> {
        let mut settings = Settings::load(self.config.as_deref())?;
        self.apply(&mut settings);
        settings.validate()?;
        Ok(settings)
    }

    /// Applies the flags that were given on top of `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        let nodes = self.nodes();
        if !nodes.is_empty() {
            settings.cluster.nodes = nodes;
        }
        if let Some(shares) = self.secret_shares.or(self.legacy_secret_shares) {
            settings.cluster.secret_shares = shares;
        }
        if let Some(threshold) = self.secret_threshold.or(self.legacy_secret_threshold) {
            settings.cluster.secret_threshold = threshold;
        }
        if let Some(interval) = self.watch_interval {
            settings.reconcile.watch_interval = interval;
        }
        if let Some(timeout) = self.init_check_timeout {
            settings.reconcile.init_check_timeout = Some(timeout);
        }
        if let Some(timeout) = self.request_timeout {
            settings.client.request_timeout = timeout;
        }
        if let Some(path) = &self.ca_cert {
            settings.client.ca_cert = Some(path.clone());
        }
        if self.tls_skip_verify {
            settings.client.tls_skip_verify = true;
        }
        if let Some(format) = self.log_format {
            settings.log_format = format;
        }
        if let Some(addr) = self.metrics_addr {
            settings.metrics_addr = Some(addr);
        }
    }

    /// Node addresses from `--vault-addr`, else from `--vault-addrs`/`VAULT_ADDRS`.
    pub fn nodes(&self) -> Vec<String> {
        if !self.vault_addr.is_empty() {
            return self.vault_addr.clone();
        }
        self.vault_addrs
            .as_deref()
            .map(|addrs| addrs.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods, clippy::panic)]
mod tests {
    use std::io::Write;

    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sealwatch").chain(args.iter().copied())).unwrap()
    }

    fn env(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_without_sources() {
        let settings = Settings::load_with_env(None, env(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.cluster.secret_shares, 5);
        assert_eq!(settings.cluster.secret_threshold, 3);
        assert_eq!(settings.reconcile.watch_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
log_format = "json"
metrics_addr = "127.0.0.1:9102"

[cluster]
nodes = ["http://vault-0:8200", "http://vault-1:8200"]
secret_shares = 7
secret_threshold = 4

[reconcile]
watch_interval = "10s"
init_check_timeout = "5m"
"#
        )
        .unwrap();

        let settings = Settings::load_with_env(Some(file.path()), env(&[])).unwrap();
        settings.validate().unwrap();

        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.metrics_addr, Some("127.0.0.1:9102".parse().unwrap()));
        assert_eq!(settings.cluster.nodes, vec!["http://vault-0:8200", "http://vault-1:8200"]);
        assert_eq!(settings.cluster.secret_shares, 7);
        assert_eq!(settings.cluster.secret_threshold, 4);
        assert_eq!(settings.reconcile.watch_interval, Duration::from_secs(10));
        assert_eq!(settings.reconcile.init_check_timeout, Some(Duration::from_secs(300)));
        assert_eq!(settings.reconcile.join_max_attempts, 3);
        assert_eq!(settings.client, NodeClientConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "[cluster]\nsecret_shares = 7\nsecret_threshold = 4\n").unwrap();

        let settings = Settings::load_with_env(
            Some(file.path()),
            env(&[
                ("SEALWATCH__CLUSTER__SECRET_THRESHOLD", "5"),
                ("SEALWATCH__CLUSTER__NODES", "http://a:8200 http://b:8200"),
                ("SEALWATCH__RECONCILE__JOIN_RETRY_DELAY", "500ms"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.cluster.secret_shares, 7);
        assert_eq!(settings.cluster.secret_threshold, 5);
        assert_eq!(settings.cluster.nodes, vec!["http://a:8200", "http://b:8200"]);
        assert_eq!(settings.reconcile.join_retry_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = Settings::load_with_env(Some(&path), env(&[])).unwrap_err();
        assert!(matches!(err, SettingsError::Load { .. }));
    }

    #[test]
    fn test_repeated_vault_addr_flags() {
        let cli = parse(&["--vault-addr", "http://a:8200", "--vault-addr", "http://b:8200"]);
        assert_eq!(cli.nodes(), vec!["http://a:8200", "http://b:8200"]);
    }

    #[test]
    fn test_vault_addrs_split_on_whitespace() {
        let cli = parse(&["--vault-addrs", "http://a:8200  http://b:8200\n\thttp://c:8200"]);
        assert_eq!(cli.nodes(), vec!["http://a:8200", "http://b:8200", "http://c:8200"]);
    }

    #[test]
    fn test_vault_addr_wins_over_list() {
        let cli = parse(&["--vault-addrs", "http://a:8200", "--vault-addr", "http://z:8200"]);
        assert_eq!(cli.nodes(), vec!["http://z:8200"]);
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = parse(&[
            "--vault-addr",
            "http://a:8200",
            "--secret-shares",
            "3",
            "--secret-threshold",
            "2",
            "--watch-interval",
            "30s",
            "--init-check-timeout",
            "2m",
            "--log-format",
            "text",
            "--tls-skip-verify",
        ]);
        let mut settings = Settings::default();
        cli.apply(&mut settings);
        settings.validate().unwrap();

        assert_eq!(settings.cluster.nodes, vec!["http://a:8200"]);
        assert_eq!(settings.cluster.secret_shares, 3);
        assert_eq!(settings.cluster.secret_threshold, 2);
        assert_eq!(settings.reconcile.watch_interval, Duration::from_secs(30));
        assert_eq!(settings.reconcile.init_check_timeout, Some(Duration::from_secs(120)));
        assert_eq!(settings.log_format, LogFormat::Text);
        assert!(settings.client.tls_skip_verify);
    }

    #[test]
    fn test_legacy_share_names_apply() {
        let cli = parse(&["--vom-secret-shares", "7", "--vom-secret-threshold", "4"]);
        let mut settings = Settings::default();
        cli.apply(&mut settings);
        settings.validate().unwrap();
        assert_eq!(settings.cluster.secret_shares, 7);
        assert_eq!(settings.cluster.secret_threshold, 4);
    }

    #[test]
    fn test_current_share_names_win_over_legacy() {
        let cli = parse(&[
            "--secret-shares",
            "3",
            "--vom-secret-shares",
            "7",
            "--secret-threshold",
            "2",
            "--vom-secret-threshold",
            "4",
        ]);
        let mut settings = Settings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.cluster.secret_shares, 3);
        assert_eq!(settings.cluster.secret_threshold, 2);
    }

    #[test]
    fn test_absent_flags_keep_settings() {
        let cli = parse(&[]);
        let mut settings = Settings::default();
        settings.cluster.nodes = vec!["http://from-file:8200".to_string()];
        cli.apply(&mut settings);
        assert_eq!(settings.cluster.nodes, vec!["http://from-file:8200"]);
        assert_eq!(settings.cluster.secret_shares, 5);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let cli = parse(&["--secret-shares", "3", "--secret-threshold", "4"]);
        let mut settings = Settings::default();
        cli.apply(&mut settings);
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { .. }));
    }

    #[test]
    fn test_config_subcommands_parse() {
        let cli = parse(&["config", "schema"]);
        assert!(matches!(
            cli.command,
            Some(CliCommand::Config { action: ConfigAction::Schema })
        ));
        let cli = parse(&["config", "example"]);
        assert!(matches!(
            cli.command,
            Some(CliCommand::Config { action: ConfigAction::Example })
        ));
    }

    #[test]
    fn test_schema_describes_sections() {
        let schema = generate_config_schema().unwrap();
        let value: serde_json::Value = serde_json::from_str(&schema).unwrap();
        let properties = value["properties"].as_object().unwrap();
        for key in ["cluster", "reconcile", "client", "log_format", "metrics_addr"] {
            assert!(properties.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn test_example_loads_back() {
        let example = generate_config_example().unwrap();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(example.as_bytes()).unwrap();

        let settings = Settings::load_with_env(Some(file.path()), env(&[])).unwrap();
        settings.validate().unwrap();
        assert_eq!(settings.cluster.nodes.len(), 3);
        assert_eq!(settings.cluster.nodes[0], "http://vault-0.vault-internal:8200");
        assert_eq!(settings.reconcile, ReconcileConfig::default());
    }
}
