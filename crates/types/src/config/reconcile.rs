//! Reconciliation loop timing and retry configuration.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default delay between initialization-check sweeps.
fn default_init_poll_interval() -> Duration {
    Duration::from_secs(1)
}

/// Default number of raft join attempts per follower.
fn default_join_max_attempts() -> u32 {
    3
}

/// Default delay between raft join attempts.
fn default_join_retry_delay() -> Duration {
    Duration::from_secs(2)
}

/// Default steady-state sweep interval.
fn default_watch_interval() -> Duration {
    Duration::from_secs(5)
}

/// Timing and retry configuration for the reconciliation loop.
///
/// # Example
///
/// ```no_run
/// # use std::time::Duration;
/// # use sealwatch_types::config::ReconcileConfig;
/// let config = ReconcileConfig::builder()
///     .watch_interval(Duration::from_secs(10))
///     .init_check_timeout(Duration::from_secs(300))
///     .build()
///     .expect("valid reconcile config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReconcileConfig {
    /// Delay between full-registry sweeps while waiting for every node to
    /// answer the initialization check.
    ///
    /// Must be > 0.
    #[serde(default = "default_init_poll_interval")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub init_poll_interval: Duration,
    /// Upper bound on the initialization check. Unset waits indefinitely.
    ///
    /// Must be > 0 when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "super::humantime_serde_opt")]
    #[schemars(with = "Option<String>")]
    pub init_check_timeout: Option<Duration>,
    /// Total raft join attempts per follower, including the first.
    ///
    /// Must be > 0.
    #[serde(default = "default_join_max_attempts")]
    pub join_max_attempts: u32,
    /// Fixed delay between raft join attempts.
    #[serde(default = "default_join_retry_delay")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub join_retry_delay: Duration,
    /// Interval between steady-state seal checks.
    ///
    /// Must be > 0.
    #[serde(default = "default_watch_interval")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub watch_interval: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            init_poll_interval: default_init_poll_interval(),
            init_check_timeout: None,
            join_max_attempts: default_join_max_attempts(),
            join_retry_delay: default_join_retry_delay(),
            watch_interval: default_watch_interval(),
        }
    }
}

#[bon::bon]
impl ReconcileConfig {
    /// Creates a new reconcile configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if an interval or the attempt
    /// count is zero.
    #[builder]
    pub fn new(
        #[builder(default = default_init_poll_interval())] init_poll_interval: Duration,
        init_check_timeout: Option<Duration>,
        #[builder(default = default_join_max_attempts())] join_max_attempts: u32,
        #[builder(default = default_join_retry_delay())] join_retry_delay: Duration,
        #[builder(default = default_watch_interval())] watch_interval: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            init_poll_interval,
            init_check_timeout,
            join_max_attempts,
            join_retry_delay,
            watch_interval,
        };
        config.validate()?;
        Ok(config)
    }
}

impl ReconcileConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.init_poll_interval.is_zero() {
            return Err(ConfigError::Validation {
                message: "init_poll_interval must be > 0".to_string(),
            });
        }
        if self.init_check_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::Validation {
                message: "init_check_timeout must be > 0 when set".to_string(),
            });
        }
        if self.join_max_attempts == 0 {
            return Err(ConfigError::Validation {
                message: "join_max_attempts must be > 0".to_string(),
            });
        }
        if self.watch_interval.is_zero() {
            return Err(ConfigError::Validation {
                message: "watch_interval must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
