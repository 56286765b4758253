//! Supervisor configuration.
//!
//! Every setting has a default and an environment override:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `RECAP_BASE_URL` | `https://chat.openai.com` |
//! | `RECAP_SESSION_PATH` | `/api/auth/session` |
//! | `RECAP_CONVERSATION_PATH` | `/backend-api/conversation` |
//! | `RECAP_MODEL` | `gpt-3.5-turbo` |
//! | `RECAP_USER_AGENT` | reqwest default |
//! | `RECAP_ERROR_KEEPALIVE_SECS` | `15` |
//! | `RECAP_HEALTHY_KEEPALIVE_SECS` | `1800` |
//! | `RECAP_READ_TIMEOUT_SECS` | `120` (`0` disables) |
//! | `RECAP_REQUEST_TIMEOUT_SECS` | `30` |

use recap_models::{CompletionConfig, DEFAULT_CONVERSATION_PATH, DEFAULT_MODEL};
use recap_providers::{IdentityConfig, DEFAULT_BASE_URL, DEFAULT_SESSION_PATH};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;
use crate::keepalive::KeepalivePolicy;

/// Configuration for a [`ConnectionSupervisor`](crate::ConnectionSupervisor).
#[derive(Debug, Clone)]
pub struct RecapConfig {
    /// Origin of the web backend.
    pub base_url: String,
    /// Path of the session endpoint.
    pub session_path: String,
    /// Path of the conversation endpoint.
    pub conversation_path: String,
    /// Model selector sent with every query.
    pub model: String,
    /// `User-Agent` for both endpoints.
    pub user_agent: Option<String>,
    /// Keepalive period while the status is `Error` or `Initializing`.
    pub error_keepalive: Duration,
    /// Keepalive period otherwise.
    pub healthy_keepalive: Duration,
    /// Longest wait for the next fragment of a query.
    pub read_timeout: Option<Duration>,
    /// Timeout for the session request and for connecting to the conversation endpoint.
    pub request_timeout: Duration,
}

impl Default for RecapConfig {
    fn default() -> Self {
        let policy = KeepalivePolicy::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_path: DEFAULT_SESSION_PATH.to_string(),
            conversation_path: DEFAULT_CONVERSATION_PATH.to_string(),
            model: DEFAULT_MODEL.to_string(),
            user_agent: None,
            error_keepalive: policy.error_period,
            healthy_keepalive: policy.healthy_period,
            read_timeout: Some(Duration::from_secs(120)),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RecapConfig {
    /// Create a config against a different backend origin.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Load overrides from `RECAP_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load overrides from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("RECAP_BASE_URL") {
            config.base_url = value;
        }
        if let Some(value) = lookup("RECAP_SESSION_PATH") {
            config.session_path = value;
        }
        if let Some(value) = lookup("RECAP_CONVERSATION_PATH") {
            config.conversation_path = value;
        }
        if let Some(value) = lookup("RECAP_MODEL") {
            config.model = value;
        }
        if let Some(value) = lookup("RECAP_USER_AGENT") {
            config.user_agent = Some(value);
        }
        if let Some(value) = lookup("RECAP_ERROR_KEEPALIVE_SECS") {
            config.error_keepalive = parse_seconds("RECAP_ERROR_KEEPALIVE_SECS", &value)?;
        }
        if let Some(value) = lookup("RECAP_HEALTHY_KEEPALIVE_SECS") {
            config.healthy_keepalive = parse_seconds("RECAP_HEALTHY_KEEPALIVE_SECS", &value)?;
        }
        if let Some(value) = lookup("RECAP_READ_TIMEOUT_SECS") {
            let timeout = parse_seconds("RECAP_READ_TIMEOUT_SECS", &value)?;
            config.read_timeout = (!timeout.is_zero()).then_some(timeout);
        }
        if let Some(value) = lookup("RECAP_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = parse_seconds("RECAP_REQUEST_TIMEOUT_SECS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set both keepalive periods.
    #[must_use]
    pub fn with_keepalive(mut self, on_error: Duration, healthy: Duration) -> Self {
        self.error_keepalive = on_error;
        self.healthy_keepalive = healthy;
        self
    }

    /// Set or disable the read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Check URLs and periods.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session_url()?;
        self.conversation_url()?;
        if self.error_keepalive.is_zero() {
            return Err(ConfigError::ZeroPeriod {
                name: "RECAP_ERROR_KEEPALIVE_SECS",
            });
        }
        if self.healthy_keepalive.is_zero() {
            return Err(ConfigError::ZeroPeriod {
                name: "RECAP_HEALTHY_KEEPALIVE_SECS",
            });
        }
        Ok(())
    }

    /// Absolute URL of the session endpoint.
    pub fn session_url(&self) -> Result<Url, ConfigError> {
        join_url(&self.base_url, &self.session_path, "RECAP_SESSION_PATH")
    }

    /// Absolute URL of the conversation endpoint.
    pub fn conversation_url(&self) -> Result<Url, ConfigError> {
        join_url(&self.base_url, &self.conversation_path, "RECAP_CONVERSATION_PATH")
    }

    /// Identity endpoint settings derived from this config.
    pub fn identity_config(&self) -> Result<IdentityConfig, ConfigError> {
        let mut config =
            IdentityConfig::new(self.session_url()?.as_str()).with_timeout(self.request_timeout);
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent.clone());
        }
        Ok(config)
    }

    /// Completion client settings derived from this config.
    pub fn completion_config(&self) -> Result<CompletionConfig, ConfigError> {
        let mut config = CompletionConfig::new(self.conversation_url()?.as_str())
            .with_model(self.model.clone())
            .with_connect_timeout(self.request_timeout);
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent.clone());
        }
        Ok(config)
    }

    /// Keepalive periods derived from this config.
    pub fn keepalive_policy(&self) -> KeepalivePolicy {
        KeepalivePolicy::new(self.error_keepalive, self.healthy_keepalive)
    }
}

fn parse_seconds(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ConfigError::InvalidSeconds {
            name,
            value: value.to_string(),
        })
}

fn join_url(base: &str, path: &str, name: &'static str) -> Result<Url, ConfigError> {
    let base = Url::parse(base).map_err(|source| ConfigError::InvalidUrl {
        name: "RECAP_BASE_URL",
        source,
    })?;
    base.join(path)
        .map_err(|source| ConfigError::InvalidUrl { name, source })
}
