//! ChatGPT web conversation endpoint.
//!
//! The endpoint authenticates with the bearer token from the web session and
//! answers with an SSE stream. Decoding that stream is left to
//! `recap-streaming`; this module only opens it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use recap_models::chatgpt::{ChatGptClient, CompletionConfig};
//!
//! let client = ChatGptClient::new(CompletionConfig::default());
//! let bytes = client.send("Summarize: ...", &session).await?;
//! ```

mod client;
mod types;

pub use client::{ByteStream, ChatGptClient, CompletionConfig};
pub use types::*;

/// Default path of the conversation endpoint relative to the base URL.
pub const DEFAULT_CONVERSATION_PATH: &str = "/backend-api/conversation";

/// Known model identifiers.
pub mod models {
    /// The model every request uses unless configured otherwise.
    pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
}
