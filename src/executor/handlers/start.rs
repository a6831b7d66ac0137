use async_trait::async_trait;

use crate::{
    Result,
    executor::{
        ExecContext,
        handlers::{NodeHandler, Step, advance},
    },
    graph::Node,
};

pub struct StartHandler;

#[async_trait]
impl NodeHandler for StartHandler {
    async fn run(
        &self,
        node: &Node,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Step> {
        advance(node, &ctx.scope())
    }
}
