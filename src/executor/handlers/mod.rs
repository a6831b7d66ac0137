//! Per-kind node semantics.
//!
//! Every handler runs one node against the turn's [`ExecContext`] and says whether the
//! turn continues to another node or ends with a reply.

mod action;
mod ai;
mod api_call;
mod condition;
mod end;
mod input;
mod message;
mod speech;
mod start;
mod unknown;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    FlowError, Result,
    executor::ExecContext,
    graph::{ConditionalTarget, Node, NodeId, NodeKind, Scope, Transition, template},
};

/// What a handler decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Continue with this node in the same turn.
    Advance(NodeId),
    /// End the turn.
    Reply(Reply),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub text: String,
    pub audio: Option<Vec<u8>>,
    /// Node the next turn starts from. `None` restarts at the entry node.
    pub resume_at: Option<NodeId>,
}

impl Reply {
    pub fn text(
        text: String,
        resume_at: Option<NodeId>,
    ) -> Self {
        Self {
            text,
            audio: None,
            resume_at,
        }
    }
}

#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Executes `node`, mutating the turn context.
    ///
    /// # Arguments
    ///
    /// * `node` - The node to run, with template overrides already applied.
    /// * `ctx` - The turn's [`ExecContext`].
    async fn run(
        &self,
        node: &Node,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Step>;
}

/// The handler for a kind.
pub fn handler(kind: NodeKind) -> &'static dyn NodeHandler {
    match kind {
        NodeKind::Start => &start::StartHandler,
        NodeKind::Message => &message::MessageHandler,
        NodeKind::Input => &input::InputHandler,
        NodeKind::Condition => &condition::ConditionHandler,
        NodeKind::Action => &action::ActionHandler,
        NodeKind::ApiCall => &api_call::ApiCallHandler,
        NodeKind::Ai => &ai::AiHandler,
        NodeKind::Tts => &speech::TtsHandler,
        NodeKind::Stt => &speech::SttHandler,
        NodeKind::End => &end::EndHandler,
        NodeKind::Unknown => &unknown::UnknownHandler,
    }
}

/// Target of the first branch whose condition holds. List order breaks ties.
pub(crate) fn first_match(
    branches: &[ConditionalTarget],
    scope: &Scope<'_>,
) -> Option<NodeId> {
    branches.iter().find(|b| b.condition.matches(scope.lookup(&b.condition.variable).as_ref())).map(|b| b.target.clone())
}

/// Resolve `node.next`: a direct target, or the first conditional target that matches.
pub(crate) fn next_target(
    node: &Node,
    scope: &Scope<'_>,
) -> Option<NodeId> {
    match node.next.as_ref()? {
        Transition::Direct(target) => Some(target.clone()),
        Transition::Conditional(branches) => first_match(branches, scope),
    }
}

/// Reply for a branching node none of whose conditions held. The session stays on the node.
pub(crate) fn no_match_reply(
    node: &Node,
    ctx: &ExecContext<'_>,
) -> Reply {
    debug!(node = %node.id, "no branch matched");
    let text = match node.field_str("fallback_message") {
        Some(t) => template::render(t, &ctx.scope()),
        None => ctx.config.no_match_message.clone(),
    };
    Reply::text(text, Some(node.id.clone()))
}

/// Where a replying node (message, ai, tts) resumes. With conditional branches the session
/// waits on the node itself and the branches see the user's answer on the next turn.
pub(crate) fn resume_after_reply(
    node: &Node,
    ctx: &mut ExecContext<'_>,
) -> Option<NodeId> {
    match node.next.as_ref()? {
        Transition::Direct(target) => Some(target.clone()),
        Transition::Conditional(_) => {
            ctx.state.awaiting_input = Some(node.id.clone());
            Some(node.id.clone())
        }
    }
}

/// Routes the answer to a replying node that is waiting on its branches. `None` when the
/// node was not waiting, in which case it runs normally.
pub(crate) fn route_answer(
    node: &Node,
    ctx: &mut ExecContext<'_>,
) -> Option<Step> {
    let Some(Transition::Conditional(branches)) = &node.next else {
        return None;
    };
    if ctx.state.awaiting_input.as_deref() != Some(node.id.as_str()) {
        return None;
    }

    let target = first_match(branches, &ctx.scope());
    match target {
        Some(target) => {
            ctx.state.awaiting_input = None;
            Some(Step::Advance(target))
        }
        None => Some(Step::Reply(no_match_reply(node, ctx))),
    }
}

/// Next step of an auto-advancing node, which must have somewhere to go.
pub(crate) fn advance(
    node: &Node,
    scope: &Scope<'_>,
) -> Result<Step> {
    next_target(node, scope)
        .map(Step::Advance)
        .ok_or_else(|| FlowError::Configuration(format!("{} node {} has no next node", node.kind, node.id)))
}
