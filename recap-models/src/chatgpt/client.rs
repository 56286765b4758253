//! Streaming completion client.

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use recap_core::{SendError, Session};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

use super::models::DEFAULT_MODEL;
use super::types::ConversationRequest;
use super::DEFAULT_CONVERSATION_PATH;

/// Raw response body, chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Completion client configuration.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Full URL of the conversation endpoint.
    pub conversation_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// `User-Agent` sent with every request.
    pub user_agent: Option<String>,
    /// Connection establishment timeout.
    ///
    /// There is no whole-request timeout; the body is a long-lived stream.
    pub connect_timeout: Option<Duration>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            conversation_url: format!("https://chat.openai.com{}", DEFAULT_CONVERSATION_PATH),
            model: DEFAULT_MODEL.to_string(),
            user_agent: None,
            connect_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl CompletionConfig {
    /// Create a config for an explicit conversation URL.
    pub fn new(conversation_url: impl Into<String>) -> Self {
        Self {
            conversation_url: conversation_url.into(),
            ..Default::default()
        }
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

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Build an HTTP client with this config.
    pub fn build_client(&self) -> Client {
        let mut builder = Client::builder();

        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        builder.build().unwrap_or_default()
    }
}

/// Client for the conversation endpoint.
#[derive(Debug, Clone)]
pub struct ChatGptClient {
    client: Client,
    config: CompletionConfig,
}

impl ChatGptClient {
    /// Create a new client.
    pub fn new(config: CompletionConfig) -> Self {
        Self {
            client: config.build_client(),
            config,
        }
    }

    /// Set a custom HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// The client configuration.
    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Build the request body for `prompt`.
    pub fn build_request(&self, prompt: &str) -> ConversationRequest {
        ConversationRequest::user_prompt(&self.config.model, prompt)
    }

    /// Send `prompt` and return the raw response body.
    ///
    /// A non-success status yields `"{status} {reason}"`; a response declared
    /// empty yields `No response body`.
    pub async fn send(&self, prompt: &str, session: &Session) -> Result<ByteStream, SendError> {
        let request = self.build_request(prompt);
        debug!(
            target: "recap::completion",
            url = %self.config.conversation_url,
            model = %request.model,
            prompt_len = prompt.len(),
            "Sending conversation request"
        );

        let response = self
            .client
            .post(&self.config.conversation_url)
            .header(AUTHORIZATION, session.bearer())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                warn!(target: "recap::completion", error = %err, "Conversation request failed");
                SendError::transport(err)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "recap::completion", status = status.as_u16(), "Conversation request rejected");
            return Err(SendError::http(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
            ));
        }

        if response.content_length() == Some(0) {
            warn!(target: "recap::completion", "Conversation response had no body");
            return Err(SendError::EmptyBody);
        }

        Ok(Box::pin(
            response.bytes_stream().map_err(std::io::Error::other),
        ))
    }
}
