use async_trait::async_trait;

use crate::{
    Result,
    executor::{
        ExecContext,
        handlers::{NodeHandler, Reply, Step},
    },
    graph::{Node, template},
};

pub struct EndHandler;

#[async_trait]
impl NodeHandler for EndHandler {
    async fn run(
        &self,
        node: &Node,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Step> {
        let text = node.text("text").map(|t| template::render(t, &ctx.scope())).unwrap_or_default();
        ctx.state.completed = true;
        ctx.state.awaiting_input = None;
        Ok(Step::Reply(Reply::text(text, None)))
    }
}
