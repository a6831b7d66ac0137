use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::{
    Result,
    executor::{
        ExecContext,
        handlers::{NodeHandler, Reply, Step, next_target},
    },
    graph::{Node, template},
};

/// Prompts on the first visit, captures the answer on the next turn.
pub struct InputHandler;

#[async_trait]
impl NodeHandler for InputHandler {
    async fn run(
        &self,
        node: &Node,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Step> {
        let prompt = template::render(node.text("prompt").unwrap_or_default(), &ctx.scope());

        if ctx.state.awaiting_input.as_deref() != Some(node.id.as_str()) {
            ctx.state.awaiting_input = Some(node.id.clone());
            return Ok(Step::Reply(Reply::text(prompt, Some(node.id.clone()))));
        }

        let answer = ctx.input.trim().to_string();
        if let Some(pattern) = node.field_str("pattern") {
            let re = Regex::new(pattern)?;
            if !re.is_match(&answer) {
                debug!(node = %node.id, "input rejected by pattern");
                let retry = node.field_str("retry_message").map(|t| template::render(t, &ctx.scope())).unwrap_or(prompt);
                return Ok(Step::Reply(Reply::text(retry, Some(node.id.clone()))));
            }
        }

        let variable = node.field_str("variable").unwrap_or(&node.id);
        ctx.state.context.set(variable, answer);
        ctx.state.awaiting_input = None;

        match next_target(node, &ctx.scope()) {
            Some(target) => Ok(Step::Advance(target)),
            None => Ok(Step::Reply(Reply::text(String::new(), None))),
        }
    }
}
