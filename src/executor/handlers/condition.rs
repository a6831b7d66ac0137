use async_trait::async_trait;

use crate::{
    FlowError, Result,
    executor::{
        ExecContext,
        handlers::{NodeHandler, Step, first_match, no_match_reply},
    },
    graph::{Node, Transition},
};

/// First matching branch wins; no match replies and stays put.
pub struct ConditionHandler;

#[async_trait]
impl NodeHandler for ConditionHandler {
    async fn run(
        &self,
        node: &Node,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Step> {
        let branches = match &node.next {
            Some(Transition::Conditional(branches)) if !branches.is_empty() => branches,
            _ => return Err(FlowError::Configuration(format!("condition node {} has no conditional transitions", node.id))),
        };

        match first_match(branches, &ctx.scope()) {
            Some(target) => Ok(Step::Advance(target)),
            None => Ok(Step::Reply(no_match_reply(node, ctx))),
        }
    }
}
