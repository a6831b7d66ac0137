use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    config::ExecutorConfig,
    delegate::{AiDelegate, ApiDelegate, SpeechDelegate},
    graph::{NodeId, Scope},
    session::SessionState,
};

/// One inbound user message as delivered by a channel adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub text: String,
    /// Raw audio for stt nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Vec<u8>>,
    /// Language hint for transcription and synthesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl InboundMessage {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            audio: None,
            language: None,
        }
    }

    pub fn with_audio(
        mut self,
        audio: Vec<u8>,
        language: Option<&str>,
    ) -> Self {
        self.audio = Some(audio);
        self.language = language.map(str::to_string);
        self
    }
}

impl From<&str> for InboundMessage {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

/// External collaborators available to node handlers. Any of them may be absent; a node
/// that needs a missing one fails with an `unavailable` delegate error.
#[derive(Clone, Default)]
pub struct Delegates {
    pub ai: Option<Arc<dyn AiDelegate>>,
    pub speech: Option<Arc<dyn SpeechDelegate>>,
    pub api: Option<Arc<dyn ApiDelegate>>,
}

/// Mutable state of one turn, threaded through every handler it visits.
pub struct ExecContext<'a> {
    pub state: SessionState,
    /// The turn's text input. An stt node replaces it with the transcript.
    pub input: String,
    pub audio: Option<Vec<u8>>,
    pub language: Option<String>,
    pub delegates: &'a Delegates,
    pub config: &'a ExecutorConfig,
    /// Tokens reported by AI delegates during this turn.
    pub tokens_reported: Option<u64>,
    pub hops: u32,
    pub visited: Vec<NodeId>,
}

impl<'a> ExecContext<'a> {
    pub fn new(
        state: SessionState,
        message: &InboundMessage,
        delegates: &'a Delegates,
        config: &'a ExecutorConfig,
    ) -> Self {
        Self {
            state,
            input: message.text.clone(),
            audio: message.audio.clone(),
            language: message.language.clone(),
            delegates,
            config,
            tokens_reported: None,
            hops: 0,
            visited: Vec::new(),
        }
    }

    pub fn scope(&self) -> Scope<'_> {
        Scope::new(&self.state.context, &self.input)
    }

    pub fn report_tokens(
        &mut self,
        tokens: u64,
    ) {
        self.tokens_reported = Some(self.tokens_reported.unwrap_or_default() + tokens);
    }
}
