use async_trait::async_trait;

use crate::{
    Result,
    executor::{
        ExecContext,
        handlers::{NodeHandler, Reply, Step, resume_after_reply, route_answer},
    },
    graph::{Node, template},
};

pub struct MessageHandler;

#[async_trait]
impl NodeHandler for MessageHandler {
    async fn run(
        &self,
        node: &Node,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Step> {
        if let Some(step) = route_answer(node, ctx) {
            return Ok(step);
        }

        let text = template::render(node.text("text").unwrap_or_default(), &ctx.scope());
        let resume_at = resume_after_reply(node, ctx);
        Ok(Step::Reply(Reply::text(text, resume_at)))
    }
}
