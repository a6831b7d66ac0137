use async_trait::async_trait;
use serde_json::Value;

use crate::{
    Result,
    delegate::{DelegateError, ModelConfig, with_retry},
    executor::{
        ExecContext,
        handlers::{NodeHandler, Reply, Step, resume_after_reply, route_answer},
    },
    graph::{Node, template},
    session::HistoryEntry,
};

const DEFAULT_OUTPUT_VARIABLE: &str = "ai_response";

pub struct AiHandler;

fn model_config(node: &Node) -> ModelConfig {
    ModelConfig {
        model: node.field_str("model").map(str::to_string),
        system_prompt: node.field_str("system_prompt").map(str::to_string),
        temperature: node.field("temperature").and_then(Value::as_f64),
        max_tokens: node.field("max_tokens").and_then(Value::as_u64).and_then(|n| u32::try_from(n).ok()),
    }
}

#[async_trait]
impl NodeHandler for AiHandler {
    async fn run(
        &self,
        node: &Node,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Step> {
        if let Some(step) = route_answer(node, ctx) {
            return Ok(step);
        }

        let ai = ctx.delegates.ai.as_ref().ok_or_else(|| DelegateError::unavailable("ai"))?;
        let config = ctx.config;

        let prompt = template::render(node.text("prompt").unwrap_or_default(), &ctx.scope());
        let model = model_config(node);
        let history: Vec<HistoryEntry> = ctx.state.history.iter().cloned().collect();

        let completion = with_retry("ai", config.delegate_max_retries, config.retry_backoff(), || ai.complete(&prompt, &history, &model)).await?;
        ctx.report_tokens(completion.tokens_used);

        let variable = node.field_str("output_variable").unwrap_or(DEFAULT_OUTPUT_VARIABLE);
        ctx.state.context.set(variable, &completion.text);

        let resume_at = resume_after_reply(node, ctx);
        Ok(Step::Reply(Reply::text(completion.text, resume_at)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{common::Vars, graph::NodeKind};

    #[test]
    fn test_model_config_reads_content_then_metadata() {
        let node = Node::new("ai", NodeKind::Ai, json!({"prompt": "p", "model": "small", "max_tokens": 64}))
            .with_metadata(Vars::new().with("temperature", 0.3).with("system_prompt", "Be brief."));
        let config = model_config(&node);
        assert_eq!(config.model.as_deref(), Some("small"));
        assert_eq!(config.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(config.temperature, Some(0.3));
        assert_eq!(config.max_tokens, Some(64));
    }
}
