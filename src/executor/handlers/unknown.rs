use async_trait::async_trait;
use tracing::warn;

use crate::{
    Result,
    executor::{
        ExecContext,
        handlers::{NodeHandler, Reply, Step, next_target},
    },
    graph::Node,
};

/// Unrecognized node types pass through to their successor, or echo their content.
pub struct UnknownHandler;

#[async_trait]
impl NodeHandler for UnknownHandler {
    async fn run(
        &self,
        node: &Node,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Step> {
        warn!(node = %node.id, node_type = %node.raw_type, "executing node of unrecognized type");
        match next_target(node, &ctx.scope()) {
            Some(target) => Ok(Step::Advance(target)),
            None => Ok(Step::Reply(Reply::text(node.raw_text(), None))),
        }
    }
}
