//! Node client error types.
//!
//! Separates transport failures (the node could not be reached or did not
//! answer in time) from API failures (the node answered with an error
//! status). The reconciler treats the former as an expected, per-node
//! condition and never escalates it.

use snafu::Snafu;

/// Result type alias for node client operations.
pub type Result<T, E = NodeError> = std::result::Result<T, E>;

/// Errors returned by [`NodeClient`](crate::NodeClient) operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum NodeError {
    /// The node refused or dropped the connection.
    #[snafu(display("Connection error to {addr}: {message}"))]
    Connection {
        /// Node address.
        addr: String,
        /// Error description.
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[snafu(display("Request to {addr} timed out"))]
    Timeout {
        /// Node address.
        addr: String,
    },

    /// Any other HTTP transport failure.
    #[snafu(display("Transport error talking to {addr}: {source}"))]
    Transport {
        /// Node address.
        addr: String,
        /// Underlying HTTP error.
        source: reqwest::Error,
    },

    /// The node answered with a non-success status.
    #[snafu(display("API error from {addr} (status={status}): {}", errors.join("; ")))]
    Api {
        /// Node address.
        addr: String,
        /// HTTP status code.
        status: u16,
        /// Error messages from the response body.
        errors: Vec<String>,
    },

    /// The response body could not be decoded.
    #[snafu(display("Failed to decode response from {addr}: {message}"))]
    Decode {
        /// Node address.
        addr: String,
        /// Decode error description.
        message: String,
    },

    /// Client construction failed.
    #[snafu(display("Configuration error: {message}"))]
    Config {
        /// Error description.
        message: String,
    },

    /// Retry attempts exhausted.
    #[snafu(display("Retry exhausted after {attempts} attempts: {last_error}"))]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Last error message before giving up.
        last_error: String,
    },

    /// The operation was cancelled before it completed.
    #[snafu(display("Operation cancelled"))]
    Cancelled,
}

impl NodeError {
    /// Returns true if the node could not be reached at all.
    ///
    /// Transport errors are expected while nodes start up or restart and are
    /// handled by skipping the node for the current sweep.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. } | Self::Transport { .. })
    }

    /// Returns the HTTP status code if this is an API error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Builds the appropriate variant for a failed HTTP send.
    pub(crate) fn from_send(addr: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { addr: addr.to_owned() }
        } else if source.is_connect() {
            Self::Connection { addr: addr.to_owned(), message: source.to_string() }
        } else {
            Self::Transport { addr: addr.to_owned(), source }
        }
    }
}
