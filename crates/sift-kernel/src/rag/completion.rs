//! Text completion contract (used by hypothetical-document generation)

use crate::error::RagResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single chat message sent to a completion model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// LLM completion capability.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Return the generated text for the request.
    async fn complete(&self, request: CompletionRequest) -> RagResult<String>;
}
