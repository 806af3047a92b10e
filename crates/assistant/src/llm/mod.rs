pub mod openai;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use openai::OpenAiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub user_id: i64,
    pub message: String,
    /// Plain-text snapshot of the user's journal.
    pub context: String,
    /// Earlier turns, oldest first.
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to model API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model API returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("model returned an empty response")]
    EmptyResponse,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError>;
}
