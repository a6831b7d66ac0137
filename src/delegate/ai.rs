use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{delegate::DelegateError, session::HistoryEntry};

/// Model parameters an AI node passes along with its prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u64,
}

/// Text completion collaborator.
#[async_trait]
pub trait AiDelegate: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        history: &[HistoryEntry],
        config: &ModelConfig,
    ) -> Result<Completion, DelegateError>;
}
