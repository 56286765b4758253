//! Session acquisition and failure classification.

use parking_lot::RwLock;
use recap_core::{AuthError, Session, Status, StatusBus};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::IdentityConfig;

/// Body returned by the session endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionResponse {
    /// Bearer token for the completion endpoint.
    #[serde(rename = "accessToken", default)]
    pub access_token: Option<String>,
    /// Expiry reported by the server, if any.
    #[serde(default)]
    pub expires: Option<String>,
}

/// Owns the current session and refreshes it from the identity endpoint.
///
/// The stored session is replaced as a whole on success and left untouched
/// on failure, so concurrent readers see either the old token or the new one.
#[derive(Debug)]
pub struct SessionManager {
    client: Client,
    config: IdentityConfig,
    current: RwLock<Option<Session>>,
    bus: Arc<StatusBus>,
}

impl SessionManager {
    /// Create a session manager that reports to `bus`.
    pub fn new(config: IdentityConfig, bus: Arc<StatusBus>) -> Self {
        Self {
            client: config.build_client(),
            config,
            current: RwLock::new(None),
            bus,
        }
    }

    /// Set a custom HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// The status bus this manager reports to.
    pub fn status_bus(&self) -> &Arc<StatusBus> {
        &self.bus
    }

    /// The identity configuration.
    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// The stored session, which may be stale.
    pub fn session(&self) -> Option<Session> {
        self.current.read().clone()
    }

    /// Whether any token has ever been obtained.
    pub fn has_session(&self) -> bool {
        self.current.read().is_some()
    }

    /// Refresh the session and report the outcome as a status.
    ///
    /// Success publishes `Connected`; failure publishes `Error` with the
    /// failure message.
    pub async fn authenticate(&self) -> Result<Session, AuthError> {
        let result = self.acquire().await;
        match &result {
            Ok(_) => self.bus.publish(Status::connected()),
            Err(err) => self.bus.publish(Status::error(err.to_string())),
        }
        result
    }

    /// Refresh the session without publishing a status.
    pub async fn acquire(&self) -> Result<Session, AuthError> {
        debug!(target: "recap::session", url = %self.config.session_url, "Refreshing session");

        let response = self
            .client
            .get(&self.config.session_url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| {
                warn!(target: "recap::session", error = %err, "Session request failed");
                AuthError::transport(err)
            })?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            warn!(target: "recap::session", "Session endpoint requires an interactive challenge");
            return Err(AuthError::ChallengeRequired);
        }
        if !status.is_success() {
            warn!(target: "recap::session", status = status.as_u16(), "Session refresh rejected");
            return Err(AuthError::from_status(status.as_u16()));
        }

        let body: SessionResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                warn!(target: "recap::session", error = %err, "Session response was not valid JSON");
                return Err(AuthError::Unauthorized);
            }
        };

        let token = body
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::Unauthorized)?;

        let session = Session::new(token);
        *self.current.write() = Some(session.clone());
        info!(
            target: "recap::session",
            expires = body.expires.as_deref().unwrap_or("unknown"),
            "Session refreshed"
        );
        Ok(session)
    }
}
