use async_trait::async_trait;
use serde_json::Value;

use crate::{
    Result,
    executor::{
        ExecContext,
        handlers::{NodeHandler, Step, advance},
    },
    graph::{Node, template},
};

/// Applies `set` assignments and `clear` removals to the session context.
pub struct ActionHandler;

#[async_trait]
impl NodeHandler for ActionHandler {
    async fn run(
        &self,
        node: &Node,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Step> {
        if let Some(Value::Object(set)) = node.field("set") {
            let scope = ctx.scope();
            let assignments = set.iter().map(|(k, v)| template::resolve_json_value(v, &scope).map(|rv| (k.clone(), rv))).collect::<Result<Vec<_>>>()?;
            for (key, value) in assignments {
                ctx.state.context.set(&key, value);
            }
        }

        if let Some(Value::Array(keys)) = node.field("clear") {
            for key in keys.iter().filter_map(Value::as_str) {
                ctx.state.context.remove(key);
            }
        }

        advance(node, &ctx.scope())
    }
}
