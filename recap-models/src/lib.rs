//! # recap-models
//!
//! Completion client for recap.
//!
//! Opens a conversation request against the ChatGPT web backend and hands the
//! raw SSE body back to the caller.
//!
//! ## Example
//!
//! ```rust,ignore
//! use recap_models::chatgpt::{ChatGptClient, CompletionConfig};
//! use recap_streaming::FragmentStream;
//! use futures::StreamExt;
//!
//! let client = ChatGptClient::new(CompletionConfig::default());
//! let mut fragments = FragmentStream::new(client.send(prompt, &session).await?);
//! while let Some(fragment) = fragments.next().await {
//!     print!("{}", fragment?);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod chatgpt;

pub use chatgpt::{
    models::DEFAULT_MODEL, ByteStream, ChatGptClient, CompletionConfig, ConversationRequest,
    DEFAULT_CONVERSATION_PATH,
};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{ByteStream, ChatGptClient, CompletionConfig};
}
