//! Node API client configuration.

use std::{path::PathBuf, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default per-request timeout.
fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Default connection establishment timeout.
fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Transport settings shared by every node client.
///
/// Bounds each node call so a hung node cannot stall a sweep indefinitely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeClientConfig {
    /// Total time allowed for a single API request.
    ///
    /// Must be > 0.
    #[serde(default = "default_request_timeout")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub request_timeout: Duration,
    /// Time allowed to establish a TCP/TLS connection.
    ///
    /// Must be > 0 and <= `request_timeout`.
    #[serde(default = "default_connect_timeout")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub connect_timeout: Duration,
    /// PEM bundle of additional CA certificates to trust.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
    /// Skip TLS certificate verification. Development only.
    #[serde(default)]
    pub tls_skip_verify: bool,
}

impl Default for NodeClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            ca_cert: None,
            tls_skip_verify: false,
        }
    }
}

#[bon::bon]
impl NodeClientConfig {
    /// Creates a new client configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a timeout is zero or the
    /// connect timeout exceeds the request timeout.
    #[builder]
    pub fn new(
        #[builder(default = default_request_timeout())] request_timeout: Duration,
        #[builder(default = default_connect_timeout())] connect_timeout: Duration,
        #[builder(into)] ca_cert: Option<PathBuf>,
        #[builder(default)] tls_skip_verify: bool,
    ) -> Result<Self, ConfigError> {
        let config = Self { request_timeout, connect_timeout, ca_cert, tls_skip_verify };
        config.validate()?;
        Ok(config)
    }
}

impl NodeClientConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Validation {
                message: "request_timeout must be > 0".to_string(),
            });
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Validation {
                message: "connect_timeout must be > 0".to_string(),
            });
        }
        if self.connect_timeout > self.request_timeout {
            return Err(ConfigError::Validation {
                message: format!(
                    "connect_timeout ({}) must be <= request_timeout ({})",
                    humantime::format_duration(self.connect_timeout),
                    humantime::format_duration(self.request_timeout)
                ),
            });
        }
        Ok(())
    }
}
