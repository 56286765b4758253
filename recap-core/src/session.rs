//! Authenticated session held in memory.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::identifier::now_utc;

/// A short-lived access token and the time it was obtained.
///
/// Sessions are immutable; a refresh produces a new `Session` that replaces
/// the old one as a whole.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    obtained_at: DateTime<Utc>,
}

impl Session {
    /// Create a session obtained now.
    pub fn new(token: impl Into<String>) -> Self {
        Self::obtained_at(token, now_utc())
    }

    /// Create a session with an explicit acquisition time.
    pub fn obtained_at(token: impl Into<String>, obtained_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            obtained_at,
        }
    }

    /// The raw access token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// When the token was obtained.
    #[must_use]
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.obtained_at
    }

    /// Time elapsed since the token was obtained.
    #[must_use]
    pub fn age(&self) -> chrono::Duration {
        now_utc() - self.obtained_at
    }

    /// The `Authorization` header value for this session.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

// Tokens never reach logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}
