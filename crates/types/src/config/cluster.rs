//! Cluster membership and key-splitting configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default number of key shares generated at initialization.
fn default_secret_shares() -> u8 {
    5
}

/// Default number of key shares required to unseal.
fn default_secret_threshold() -> u8 {
    3
}

/// Cluster configuration: which nodes to manage and how to split the master key.
///
/// Node order is significant: the first address is the bootstrap leader.
///
/// # Example
///
/// ```no_run
/// # use sealwatch_types::config::ClusterConfig;
/// let config = ClusterConfig::builder()
///     .nodes(vec!["http://vault-0:8200".to_string(), "http://vault-1:8200".to_string()])
///     .secret_shares(5)
///     .secret_threshold(3)
///     .build()
///     .expect("valid cluster config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClusterConfig {
    /// Base addresses of the cluster nodes (e.g. `http://vault-0:8200`).
    ///
    /// Each must be an absolute `http` or `https` URL.
    #[serde(default)]
    pub nodes: Vec<String>,
    /// Total number of key shares to generate.
    ///
    /// Must be in 1..=255.
    #[serde(default = "default_secret_shares")]
    pub secret_shares: u8,
    /// Number of key shares required to reconstruct the master key.
    ///
    /// Must be >= 1 and <= `secret_shares`, and > 1 when `secret_shares` > 1.
    #[serde(default = "default_secret_threshold")]
    pub secret_threshold: u8,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            secret_shares: default_secret_shares(),
            secret_threshold: default_secret_threshold(),
        }
    }
}

#[bon::bon]
impl ClusterConfig {
    /// Creates a new cluster configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the share/threshold pair is
    /// inconsistent or a node address is not an HTTP(S) URL.
    #[builder]
    pub fn new(
        #[builder(default)] nodes: Vec<String>,
        #[builder(default = default_secret_shares())] secret_shares: u8,
        #[builder(default = default_secret_threshold())] secret_threshold: u8,
    ) -> Result<Self, ConfigError> {
        let config = Self { nodes, secret_shares, secret_threshold };
        config.validate()?;
        Ok(config)
    }
}

impl ClusterConfig {
    /// Validates the configuration values.
    ///
    /// An empty node list is accepted here; the reconciler rejects it when
    /// it starts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_shares == 0 {
            return Err(ConfigError::Validation {
                message: "secret_shares must be > 0".to_string(),
            });
        }
        if self.secret_threshold == 0 {
            return Err(ConfigError::Validation {
                message: "secret_threshold must be > 0".to_string(),
            });
        }
        if self.secret_threshold > self.secret_shares {
            return Err(ConfigError::Validation {
                message: format!(
                    "secret_threshold ({}) must be <= secret_shares ({})",
                    self.secret_threshold, self.secret_shares
                ),
            });
        }
        if self.secret_shares > 1 && self.secret_threshold == 1 {
            return Err(ConfigError::Validation {
                message: "secret_threshold must be greater than one when splitting into \
                          multiple shares"
                    .to_string(),
            });
        }
        for addr in &self.nodes {
            validate_node_addr(addr)?;
        }
        Ok(())
    }
}

/// Validates that a node address is an absolute HTTP(S) URL with a host.
fn validate_node_addr(addr: &str) -> Result<(), ConfigError> {
    let url = url::Url::parse(addr).map_err(|e| ConfigError::Validation {
        message: format!("node address '{addr}' is not a valid URL: {e}"),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation {
            message: format!("node address '{addr}' must use http or https"),
        });
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::Validation {
            message: format!("node address '{addr}' must have a host"),
        });
    }
    Ok(())
}
