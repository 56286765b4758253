//! Identity endpoint configuration.

use reqwest::Client;
use std::time::Duration;

/// Default origin of the ChatGPT web backend.
pub const DEFAULT_BASE_URL: &str = "https://chat.openai.com";

/// Path of the session endpoint relative to the base URL.
pub const DEFAULT_SESSION_PATH: &str = "/api/auth/session";

/// Configuration for session acquisition.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Full URL of the session endpoint.
    pub session_url: String,
    /// `User-Agent` sent with every request.
    pub user_agent: Option<String>,
    /// Whole-request timeout.
    pub timeout: Option<Duration>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            session_url: format!("{}{}", DEFAULT_BASE_URL, DEFAULT_SESSION_PATH),
            user_agent: None,
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl IdentityConfig {
    /// Create a config for an explicit session URL.
    pub fn new(session_url: impl Into<String>) -> Self {
        Self {
            session_url: session_url.into(),
            ..Default::default()
        }
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build an HTTP client with this config.
    pub fn build_client(&self) -> Client {
        let mut builder = Client::builder();

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        builder.build().unwrap_or_default()
    }
}
