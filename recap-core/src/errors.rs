//! Error types for recap.
//!
//! Every variant renders to the exact message surfaced to consumers as an
//! error status.

use std::fmt;
use thiserror::Error;

/// Failure while acquiring a session from the identity endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The upstream anti-automation challenge must be solved interactively.
    ///
    /// Returned for HTTP 403. Not recoverable from inside this process.
    #[error("Refresh Cloudflare")]
    ChallengeRequired,

    /// The identity endpoint answered with a non-success status other than 403.
    #[error("Failed to refresh session")]
    SessionRefreshFailed {
        /// HTTP status code returned by the endpoint.
        status: u16,
    },

    /// The response was successful but carried no access token.
    #[error("Unauthorized")]
    Unauthorized,

    /// Network or transport failure; the message is preserved verbatim.
    #[error("{0}")]
    Transport(String),
}

impl AuthError {
    /// Create a transport error from any displayable cause.
    pub fn transport(err: impl fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Classify a non-success HTTP status from the identity endpoint.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        if status == 403 {
            Self::ChallengeRequired
        } else {
            Self::SessionRefreshFailed { status }
        }
    }

    /// Whether this failure needs a human before it can clear.
    #[must_use]
    pub fn requires_user_action(&self) -> bool {
        matches!(self, Self::ChallengeRequired | Self::Unauthorized)
    }
}

/// Failure while issuing a completion request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The completion endpoint answered with a non-success status.
    #[error("{}", status_line(.status, .status_text))]
    Http {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status.
        status_text: String,
    },

    /// The response carried no readable body.
    #[error("No response body")]
    EmptyBody,

    /// Network or transport failure; the message is preserved verbatim.
    #[error("{0}")]
    Transport(String),
}

impl SendError {
    /// Create an HTTP error.
    pub fn http(status: u16, status_text: impl Into<String>) -> Self {
        Self::Http {
            status,
            status_text: status_text.into(),
        }
    }

    /// Create a transport error from any displayable cause.
    pub fn transport(err: impl fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Get the HTTP status, if the failure was an HTTP response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the stored session is possibly stale given this failure.
    ///
    /// Callers re-authenticate before retrying after a 401/403.
    #[must_use]
    pub fn session_possibly_stale(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

/// `"{status} {reason}"`, or the bare code when there is no reason phrase.
fn status_line(status: &u16, status_text: &str) -> String {
    let status_text = status_text.trim();
    if status_text.is_empty() {
        status.to_string()
    } else {
        format!("{status} {status_text}")
    }
}
