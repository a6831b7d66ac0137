use async_trait::async_trait;
use tracing::warn;

use crate::{
    Result,
    delegate::{DelegateError, VoiceConfig, with_retry},
    executor::{
        ExecContext,
        handlers::{NodeHandler, Reply, Step, advance, resume_after_reply, route_answer},
    },
    graph::{Node, template},
};

const DEFAULT_TRANSCRIPT_VARIABLE: &str = "transcript";

/// Replies with text plus synthesized audio.
pub struct TtsHandler;

#[async_trait]
impl NodeHandler for TtsHandler {
    async fn run(
        &self,
        node: &Node,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Step> {
        if let Some(step) = route_answer(node, ctx) {
            return Ok(step);
        }

        let config = ctx.config;
        let text = template::render(node.text("text").unwrap_or_default(), &ctx.scope());
        let voice = VoiceConfig {
            voice: node.field_str("voice").map(str::to_string),
            language: node.field_str("language").map(str::to_string).or_else(|| ctx.language.clone()),
        };

        let audio = match ctx.delegates.speech.as_ref() {
            Some(speech) => Some(with_retry("tts", config.delegate_max_retries, config.retry_backoff(), || speech.text_to_speech(&text, &voice)).await?),
            None => {
                warn!(node = %node.id, "no speech delegate configured, replying with text only");
                None
            }
        };

        Ok(Step::Reply(Reply {
            text,
            audio,
            resume_at: resume_after_reply(node, ctx),
        }))
    }
}

/// Transcribes inbound audio into the turn input, then advances.
pub struct SttHandler;

#[async_trait]
impl NodeHandler for SttHandler {
    async fn run(
        &self,
        node: &Node,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Step> {
        if let Some(audio) = ctx.audio.take() {
            let speech = ctx.delegates.speech.as_ref().ok_or_else(|| DelegateError::unavailable("speech"))?;
            let config = ctx.config;
            let hint = node.field_str("language").map(str::to_string).or_else(|| ctx.language.clone());

            let transcript = with_retry("stt", config.delegate_max_retries, config.retry_backoff(), || speech.speech_to_text(&audio, hint.as_deref())).await?;

            let variable = node.field_str("variable").unwrap_or(DEFAULT_TRANSCRIPT_VARIABLE);
            ctx.state.context.set(variable, &transcript);
            ctx.input = transcript;
        }

        advance(node, &ctx.scope())
    }
}
