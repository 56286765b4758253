//! Conversation request body.

#![allow(missing_docs)] // DTO fields are self-documenting

use recap_core::MessageId;
use serde::{Deserialize, Serialize};

/// Request body for the conversation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationRequest {
    /// Always `"next"`.
    pub action: String,
    /// Random identifier; each request starts a fresh conversation.
    pub parent_message_id: MessageId,
    pub model: String,
    pub messages: Vec<ConversationMessage>,
}

impl ConversationRequest {
    /// Build a single-message request with fresh identifiers.
    pub fn user_prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            action: "next".to_string(),
            parent_message_id: MessageId::new(),
            model: model.into(),
            messages: vec![ConversationMessage::user(prompt)],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub id: MessageId,
    pub author: Author,
    pub content: MessageContent,
}

impl ConversationMessage {
    /// A user-authored text message with a fresh id.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            author: Author {
                role: "user".to_string(),
            },
            content: MessageContent {
                content_type: "text".to_string(),
                parts: vec![text.into()],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Author {
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageContent {
    pub content_type: String,
    pub parts: Vec<String>,
}
