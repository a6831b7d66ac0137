use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::delegate::DelegateError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Text-to-speech and speech-to-text collaborator.
#[async_trait]
pub trait SpeechDelegate: Send + Sync {
    async fn text_to_speech(
        &self,
        text: &str,
        voice: &VoiceConfig,
    ) -> Result<Vec<u8>, DelegateError>;

    async fn speech_to_text(
        &self,
        audio: &[u8],
        language_hint: Option<&str>,
    ) -> Result<String, DelegateError>;
}
