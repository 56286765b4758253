//! Messages exchanged with local consumers.
//!
//! Consumers speak a small JSON protocol tagged by `type`:
//!
//! ```text
//! inbound:  {"type":"status"}
//!           {"type":"query","prompt":"..."}
//! outbound: {"type":"status","status":"loading"|"connected"}
//!           {"type":"status","status":"error","error":"..."}
//!           {"type":"query","response":"..."}
//! ```

use serde::{Deserialize, Serialize};

use crate::status::Status;

/// Message sent by a consumer to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Health probe; triggers a fresh authentication.
    Status,
    /// Run a completion for `prompt`.
    Query {
        /// Fully composed prompt text.
        prompt: String,
    },
}

/// Status name as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLabel {
    /// Work in progress (also used before the first authentication).
    Loading,
    /// Healthy.
    Connected,
    /// Failed; an `error` message accompanies it.
    Error,
}

/// Message sent by the supervisor to a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// A status transition.
    Status {
        /// New status.
        status: StatusLabel,
        /// Failure message when `status` is `error`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// One response fragment.
    Query {
        /// Newly appended response text.
        response: String,
    },
}

impl OutboundMessage {
    /// Create a fragment message.
    pub fn fragment(response: impl Into<String>) -> Self {
        Self::Query {
            response: response.into(),
        }
    }

    /// Create an error status message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Status {
            status: StatusLabel::Error,
            error: Some(message.into()),
        }
    }

    /// Serialize to a single JSON line (no trailing newline).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&Status> for OutboundMessage {
    fn from(status: &Status) -> Self {
        match status {
            Status::Initializing { .. } | Status::Loading { .. } => Self::Status {
                status: StatusLabel::Loading,
                error: None,
            },
            Status::Connected { .. } => Self::Status {
                status: StatusLabel::Connected,
                error: None,
            },
            Status::Error { message, .. } => Self::error(message.clone()),
        }
    }
}

impl InboundMessage {
    /// Parse one JSON message.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
