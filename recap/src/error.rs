//! Error types for the supervisor and its consumer ports.

use recap_core::{AuthError, SendError};
use recap_streaming::StreamError;
use thiserror::Error;

/// Failures surfaced by [`ConnectionSupervisor`](crate::ConnectionSupervisor).
///
/// `Display` is the message published in the `Error` status.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A query is already loading; the new one was not started.
    #[error("A query is already in progress")]
    QueryInFlight,

    /// No usable session.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The completion request failed.
    #[error(transparent)]
    Send(#[from] SendError),

    /// The response stream failed after it started.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A URL setting did not parse.
    #[error("Invalid {name}: {source}")]
    InvalidUrl {
        /// Setting name.
        name: &'static str,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },

    /// A numeric setting did not parse.
    #[error("Invalid {name}: '{value}' is not a number of seconds")]
    InvalidSeconds {
        /// Setting name.
        name: &'static str,
        /// Offending value.
        value: String,
    },

    /// A keepalive period of zero.
    #[error("{name} must be greater than zero")]
    ZeroPeriod {
        /// Setting name.
        name: &'static str,
    },
}

/// Consumer port failures.
#[derive(Debug, Error)]
pub enum PortError {
    /// Reading from or writing to the port failed.
    #[error("Port I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An outbound message could not be encoded.
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result alias for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;
