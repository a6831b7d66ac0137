//! Node executor: runs one user turn against a compiled graph.
//!
//! A turn starts at the session's current node (or the entry fallback chain), then hops
//! through auto-advancing nodes until a handler replies. Hops are capped by
//! `executor.max_hops`. Failures never escape `execute`: the session keeps its state
//! from before the turn and the user gets the configured fallback reply.

mod context;
pub mod handlers;
mod metrics;

#[cfg(test)]
pub(crate) mod testing;

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Instant};

use base64::Engine as _;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{error, trace, warn};

use crate::{
    FlowError, Result,
    common::Clock,
    config::ExecutorConfig,
    graph::{FlowGraph, NodeId, NodeKind, TemplateOverride, apply_overrides},
    session::{HistoryEntry, Role, SessionState},
    utils,
};

pub use context::{Delegates, ExecContext, InboundMessage};
pub use handlers::{NodeHandler, Reply, Step};
pub use metrics::{TurnMetrics, estimate_tokens};

/// What the user sees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub text: String,
    /// Base64-encoded audio from a tts node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

impl Response {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            audio: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub response: Response,
    /// Node the next turn starts from.
    pub next_node_id: Option<NodeId>,
    pub metrics: TurnMetrics,
    pub error: Option<FlowError>,
}

pub struct NodeExecutor {
    delegates: Delegates,
    config: ExecutorConfig,
    history_limit: usize,
    clock: Arc<dyn Clock>,
}

impl NodeExecutor {
    pub fn new(
        delegates: Delegates,
        config: ExecutorConfig,
        history_limit: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            delegates,
            config,
            history_limit,
            clock,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run one turn from the session's current node. Never fails; errors come back in
    /// [`ExecutionResult::error`] alongside the fallback reply.
    pub async fn execute(
        &self,
        graph: &FlowGraph,
        state: SessionState,
        message: &InboundMessage,
        overrides: &[TemplateOverride],
    ) -> (ExecutionResult, SessionState) {
        let started = Instant::now();
        let original = state.clone();

        let mut ctx = ExecContext::new(state, message, &self.delegates, &self.config);
        ctx.state.completed = false;

        let outcome = match self.resolve_entry(graph, &ctx.state) {
            Ok(entry) => {
                if ctx.state.current_node_id.as_deref() != Some(entry.as_str()) {
                    ctx.state.awaiting_input = None;
                }
                self.drive_guarded(graph, entry, &mut ctx, overrides).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(reply) => self.complete(graph, ctx, reply, started),
            Err(e) => {
                let (hops, visited) = (ctx.hops, ctx.visited);
                self.fail(graph, original, e, message, hops, visited, started)
            }
        }
    }

    /// Run from `node_id` regardless of the session's position. Errors are returned
    /// instead of converted so the caller can roll back.
    pub async fn execute_at(
        &self,
        graph: &FlowGraph,
        state: SessionState,
        node_id: &str,
        message: &InboundMessage,
        overrides: &[TemplateOverride],
    ) -> Result<(ExecutionResult, SessionState)> {
        let started = Instant::now();
        let mut ctx = ExecContext::new(state, message, &self.delegates, &self.config);
        ctx.state.completed = false;

        let reply = self.drive_guarded(graph, node_id.to_string(), &mut ctx, overrides).await?;
        Ok(self.complete(graph, ctx, reply, started))
    }

    /// Where a turn starts: the current node if it still exists, else the entry node,
    /// the first start node, the first message node, in that order.
    fn resolve_entry(
        &self,
        graph: &FlowGraph,
        state: &SessionState,
    ) -> Result<NodeId> {
        if let Some(current) = &state.current_node_id {
            if graph.contains(current) {
                return Ok(current.clone());
            }
            warn!(session = %state.key(), flow = %graph.id, node = %current, "current node missing from flow, falling back");
        }

        graph
            .entry_node()
            .or_else(|| graph.first_of_kind(NodeKind::Start))
            .or_else(|| graph.first_of_kind(NodeKind::Message))
            .map(|node| node.id.clone())
            .ok_or_else(|| {
                error!(session = %state.key(), flow = %graph.id, "no node to start the turn from");
                FlowError::NotFound(format!("no entry, start or message node in flow {}", graph.id))
            })
    }

    /// [`Self::drive`], with a panicking handler or delegate turned into an internal error.
    async fn drive_guarded(
        &self,
        graph: &FlowGraph,
        node_id: NodeId,
        ctx: &mut ExecContext<'_>,
        overrides: &[TemplateOverride],
    ) -> Result<Reply> {
        match AssertUnwindSafe(self.drive(graph, node_id, ctx, overrides)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let detail = panic_detail(&*panic);
                error!(session = %ctx.state.key(), flow = %graph.id, "node execution panicked: {}", detail);
                Err(FlowError::Internal(format!("node execution panicked: {detail}")))
            }
        }
    }

    async fn drive(
        &self,
        graph: &FlowGraph,
        mut node_id: NodeId,
        ctx: &mut ExecContext<'_>,
        overrides: &[TemplateOverride],
    ) -> Result<Reply> {
        loop {
            let node = graph.node(&node_id).ok_or_else(|| FlowError::NotFound(format!("node {} in flow {}", node_id, graph.id)))?;
            let node = apply_overrides(node, overrides);
            trace!("executor::run({}, {})", node.id, node.kind);
            ctx.visited.push(node.id.clone());

            match handlers::handler(node.kind).run(&node, ctx).await? {
                Step::Reply(reply) => return Ok(reply),
                Step::Advance(next) => {
                    if ctx.hops == self.config.max_hops {
                        return Err(FlowError::Configuration(format!(
                            "hop limit {} exceeded in flow {} at node {}",
                            self.config.max_hops, graph.id, node.id
                        )));
                    }
                    ctx.hops += 1;
                    node_id = next;
                }
            }
        }
    }

    fn complete(
        &self,
        graph: &FlowGraph,
        ctx: ExecContext<'_>,
        reply: Reply,
        started: Instant,
    ) -> (ExecutionResult, SessionState) {
        let now = self.clock.now_millis();
        let (tokens_used, tokens_estimated) = match ctx.tokens_reported {
            Some(tokens) => (tokens, false),
            None => (estimate_tokens(&ctx.input, &reply.text, ctx.hops, self.config.hop_token_overhead), true),
        };

        let mut state = ctx.state;
        state.current_node_id = reply.resume_at.clone();
        state.flow_version = Some(graph.version);
        let last_node = ctx.visited.last().cloned();
        self.record_exchange(&mut state, &ctx.input, &reply.text, last_node, now);
        state.touch(now);

        let result = ExecutionResult {
            response: Response {
                text: reply.text,
                audio: reply.audio.map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes)),
            },
            next_node_id: reply.resume_at,
            metrics: TurnMetrics {
                tokens_used,
                tokens_estimated,
                hops: ctx.hops,
                visited: ctx.visited,
                duration_ms: utils::time::elapsed_millis(started),
                error: None,
            },
            error: None,
        };
        (result, state)
    }

    fn fail(
        &self,
        graph: &FlowGraph,
        mut state: SessionState,
        error: FlowError,
        message: &InboundMessage,
        hops: u32,
        visited: Vec<NodeId>,
        started: Instant,
    ) -> (ExecutionResult, SessionState) {
        warn!(session = %state.key(), flow = %graph.id, kind = %error.kind(), error = %error, "turn failed, replying with fallback");

        let now = self.clock.now_millis();
        let text = self.config.fallback_message.clone();
        let tokens_used = estimate_tokens(&message.text, &text, hops, self.config.hop_token_overhead).max(1);

        self.record_exchange(&mut state, &message.text, &text, None, now);
        state.touch(now);

        let result = ExecutionResult {
            response: Response::text(&text),
            next_node_id: state.current_node_id.clone(),
            metrics: TurnMetrics {
                tokens_used,
                tokens_estimated: true,
                hops,
                visited,
                duration_ms: utils::time::elapsed_millis(started),
                error: Some(error.kind()),
            },
            error: Some(error),
        };
        (result, state)
    }

    fn record_exchange(
        &self,
        state: &mut SessionState,
        input: &str,
        output: &str,
        node_id: Option<NodeId>,
        now: i64,
    ) {
        if !input.trim().is_empty() {
            state.push_history(
                HistoryEntry {
                    role: Role::User,
                    text: input.to_string(),
                    node_id: None,
                    timestamp: now,
                },
                self.history_limit,
            );
        }
        if !output.is_empty() {
            state.push_history(
                HistoryEntry {
                    role: Role::Assistant,
                    text: output.to_string(),
                    node_id,
                    timestamp: now,
                },
                self.history_limit,
            );
        }
    }
}

/// Readable text of a panic payload.
pub(crate) fn panic_detail(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use super::*;
    use crate::{
        ErrorKind,
        delegate::{DelegateError, DelegateErrorKind},
        executor::testing::{PanickingAi, ScriptedAi, ScriptedApi, ScriptedSpeech, flow, price_flow},
        graph::{OverrideField, OverrideMode},
        session::SessionKey,
    };

    fn executor(delegates: Delegates) -> NodeExecutor {
        let config = ExecutorConfig {
            retry_backoff_ms: 0,
            ..ExecutorConfig::default()
        };
        NodeExecutor::new(delegates, config, 50, Arc::new(crate::common::ManualClock::new(1_000)))
    }

    fn fresh() -> SessionState {
        SessionState::new(&SessionKey::new("acme", "u1", "s1"), 0)
    }

    #[tokio::test]
    async fn test_price_scenario_branches_on_input() {
        let graph = price_flow();
        let exec = executor(Delegates::default());

        let (first, state) = exec.execute(&graph, fresh(), &"hello".into(), &[]).await;
        assert_eq!(first.response.text, "Hi");
        assert_eq!(first.next_node_id.as_deref(), Some("cond"));
        assert_eq!(first.metrics.visited, vec!["start", "msg1"]);

        let (priced, _) = exec.execute(&graph, state.clone(), &"what is the PRICE?".into(), &[]).await;
        assert_eq!(priced.response.text, "It costs 10");
        assert!(priced.error.is_none());

        let (other, _) = exec.execute(&graph, state, &"hello".into(), &[]).await;
        assert_eq!(other.response.text, "How can I help?");
        assert_eq!(other.metrics.visited, vec!["cond", "msg3"]);
    }

    #[tokio::test]
    async fn test_message_turn_is_idempotent() {
        let graph = price_flow();
        let exec = executor(Delegates::default());
        let (_, state) = exec.execute(&graph, fresh(), &"hello".into(), &[]).await;

        let (a, _) = exec.execute(&graph, state.clone(), &"tell me the price".into(), &[]).await;
        let (b, _) = exec.execute(&graph, state, &"tell me the price".into(), &[]).await;
        assert_eq!(a.response, b.response);
        assert_eq!(a.next_node_id, b.next_node_id);
        assert_eq!(a.metrics.tokens_used, b.metrics.tokens_used);
    }

    #[tokio::test]
    async fn test_removed_current_node_falls_back_to_entry() {
        let graph = price_flow();
        let exec = executor(Delegates::default());
        let mut state = fresh();
        state.current_node_id = Some("deleted".into());

        let (result, state) = exec.execute(&graph, state, &"hi".into(), &[]).await;
        assert!(result.error.is_none());
        assert_eq!(result.response.text, "Hi");
        assert_eq!(result.metrics.visited[0], "start");
        assert_eq!(state.current_node_id.as_deref(), Some("cond"));
    }

    #[tokio::test]
    async fn test_hop_limit_is_a_configuration_fallback() {
        let graph = flow(json!([
            { "id": "a", "type": "action", "next": "b" },
            { "id": "b", "type": "action", "next": "a" }
        ]));
        let exec = executor(Delegates::default());
        let before = fresh();

        let (result, state) = exec.execute(&graph, before.clone(), &"go".into(), &[]).await;
        assert_eq!(result.response.text, ExecutorConfig::default().fallback_message);
        assert_eq!(result.metrics.error, Some(ErrorKind::Configuration));
        assert_eq!(result.metrics.hops, 25);
        assert!(result.metrics.tokens_used >= 1);
        assert_eq!(state.current_node_id, before.current_node_id);
        assert_eq!(state.history.len(), 2);
    }

    #[tokio::test]
    async fn test_condition_without_match_stays_put() {
        let graph = flow(json!([
            { "id": "cond", "type": "condition", "metadata": { "fallback_message": "Say yes or no" }, "next": [
                { "condition": { "operator": "equals", "value": "yes" }, "target": "y" },
                { "condition": { "operator": "equals", "value": "no" }, "target": "n" }
            ] },
            { "id": "y", "type": "message", "content": "Great" },
            { "id": "n", "type": "message", "content": "Pity" }
        ]));
        let exec = executor(Delegates::default());

        let (result, state) = exec.execute(&graph, fresh(), &"maybe".into(), &[]).await;
        assert_eq!(result.response.text, "Say yes or no");
        assert_eq!(state.current_node_id.as_deref(), Some("cond"));

        let (result, _) = exec.execute(&graph, state, &" YES ".into(), &[]).await;
        assert_eq!(result.response.text, "Great");
    }

    #[tokio::test]
    async fn test_message_branches_route_on_the_reply() {
        let graph = flow(json!([
            { "id": "menu", "type": "message", "content": "Orders or billing?", "metadata": { "fallback_message": "Please pick orders or billing" }, "next": [
                { "condition": { "operator": "contains", "value": "order" }, "target": "orders" },
                { "condition": { "operator": "contains", "value": "bill" }, "target": "billing" }
            ] },
            { "id": "orders", "type": "message", "content": "Order desk" },
            { "id": "billing", "type": "message", "content": "Billing desk" }
        ]));
        let exec = executor(Delegates::default());

        let (shown, state) = exec.execute(&graph, fresh(), &"my order".into(), &[]).await;
        assert_eq!(shown.response.text, "Orders or billing?");
        assert_eq!(shown.next_node_id.as_deref(), Some("menu"));

        let (unmatched, state) = exec.execute(&graph, state, &"weather".into(), &[]).await;
        assert_eq!(unmatched.response.text, "Please pick orders or billing");
        assert!(unmatched.error.is_none());
        assert_eq!(state.current_node_id.as_deref(), Some("menu"));

        let (routed, state) = exec.execute(&graph, state, &"a billing question".into(), &[]).await;
        assert_eq!(routed.response.text, "Billing desk");
        assert_eq!(routed.metrics.visited, vec!["menu", "billing"]);
        assert!(state.awaiting_input.is_none());
    }

    #[tokio::test]
    async fn test_condition_without_branches_is_a_fallback() {
        let graph = flow(json!([
            { "id": "cond", "type": "condition", "next": "x" },
            { "id": "x", "type": "message", "content": "x" }
        ]));
        let (result, _) = executor(Delegates::default()).execute(&graph, fresh(), &"".into(), &[]).await;
        assert_eq!(result.metrics.error, Some(ErrorKind::Configuration));
    }

    #[tokio::test]
    async fn test_input_capture_with_pattern_retry() {
        let graph = flow(json!([
            { "id": "ask", "type": "input", "content": {
                "prompt": "Your age?", "variable": "age", "pattern": "^[0-9]+$", "retry_message": "Digits only please"
            }, "next": "thanks" },
            { "id": "thanks", "type": "message", "content": "Noted, {{age}}." }
        ]));
        let exec = executor(Delegates::default());

        let (prompt, state) = exec.execute(&graph, fresh(), &"hi".into(), &[]).await;
        assert_eq!(prompt.response.text, "Your age?");
        assert_eq!(state.awaiting_input.as_deref(), Some("ask"));

        let (retry, state) = exec.execute(&graph, state, &"old".into(), &[]).await;
        assert_eq!(retry.response.text, "Digits only please");
        assert!(state.context.get_value("age").is_none());

        let (done, state) = exec.execute(&graph, state, &" 42 ".into(), &[]).await;
        assert_eq!(done.response.text, "Noted, 42.");
        assert_eq!(state.context.get_str("age"), Some("42"));
        assert!(state.awaiting_input.is_none());
    }

    #[tokio::test]
    async fn test_action_and_end_complete_session() {
        let graph = flow(json!([
            { "id": "set", "type": "action", "content": { "set": { "greeting": "hello {{input}}", "count": 3 }, "clear": ["stale"] }, "next": "bye" },
            { "id": "bye", "type": "end", "content": "{{greeting}} x{{count}}" }
        ]));
        let exec = executor(Delegates::default());
        let mut state = fresh();
        state.context.set("stale", true);

        let (result, state) = exec.execute(&graph, state, &"bob".into(), &[]).await;
        assert_eq!(result.response.text, "hello bob x3");
        assert!(state.completed);
        assert!(state.current_node_id.is_none());
        assert!(!state.context.contains_key("stale"));

        let (again, state) = exec.execute(&graph, state, &"amy".into(), &[]).await;
        assert_eq!(again.response.text, "hello amy x3");
        assert!(state.completed);
    }

    #[tokio::test]
    async fn test_ai_node_reports_tokens_and_stores_output() {
        let graph = flow(json!([
            { "id": "ai", "type": "llm", "content": { "prompt": "Answer: {{input}}", "model": "small" }, "next": "ai" }
        ]));
        let ai = Arc::new(ScriptedAi::replying("Sure thing", 77));
        let exec = executor(Delegates {
            ai: Some(ai.clone()),
            ..Delegates::default()
        });

        let (result, state) = exec.execute(&graph, fresh(), &"help".into(), &[]).await;
        assert_eq!(result.response.text, "Sure thing");
        assert_eq!(result.metrics.tokens_used, 77);
        assert!(!result.metrics.tokens_estimated);
        assert_eq!(state.context.get_str("ai_response"), Some("Sure thing"));

        let seen = ai.prompts();
        assert_eq!(seen, vec!["Answer: help".to_string()]);
        assert_eq!(ai.models()[0].model.as_deref(), Some("small"));
    }

    #[tokio::test]
    async fn test_ai_retries_upstream_failures_only() {
        let graph = flow(json!([{ "id": "ai", "type": "ai", "content": "Hi" }]));

        let flaky = Arc::new(ScriptedAi::failing_then(DelegateError::new(DelegateErrorKind::Upstream, "503"), 2, "ok"));
        let (result, _) = executor(Delegates {
            ai: Some(flaky.clone()),
            ..Delegates::default()
        })
        .execute(&graph, fresh(), &"".into(), &[])
        .await;
        assert_eq!(result.response.text, "ok");
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);

        let limited = Arc::new(ScriptedAi::failing_then(DelegateError::new(DelegateErrorKind::RateLimit, "429"), 5, "ok"));
        let (result, _) = executor(Delegates {
            ai: Some(limited.clone()),
            ..Delegates::default()
        })
        .execute(&graph, fresh(), &"".into(), &[])
        .await;
        assert_eq!(result.metrics.error, Some(ErrorKind::Delegate));
        assert_eq!(limited.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_delegate_becomes_internal_fallback() {
        let graph = flow(json!([
            { "id": "start", "type": "start", "next": "ai" },
            { "id": "ai", "type": "ai", "content": "Hi" }
        ]));
        let exec = executor(Delegates {
            ai: Some(Arc::new(PanickingAi)),
            ..Delegates::default()
        });
        let before = fresh();

        let (result, state) = exec.execute(&graph, before.clone(), &"hello".into(), &[]).await;
        assert!(matches!(result.error, Some(FlowError::Internal(ref detail)) if detail.contains("model client crashed")));
        assert_eq!(result.metrics.error, Some(ErrorKind::Internal));
        assert_eq!(result.response.text, ExecutorConfig::default().fallback_message);
        assert_eq!(result.metrics.visited, vec!["start", "ai"]);
        assert_eq!(state.current_node_id, before.current_node_id);

        let err = exec.execute_at(&graph, fresh(), "ai", &"".into(), &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_missing_ai_delegate_is_delegate_error() {
        let graph = flow(json!([{ "id": "ai", "type": "ai", "content": "Hi" }]));
        let (result, _) = executor(Delegates::default()).execute(&graph, fresh(), &"".into(), &[]).await;
        assert!(matches!(result.error, Some(FlowError::Delegate(ref e)) if e.kind == DelegateErrorKind::Unavailable));
    }

    #[tokio::test]
    async fn test_api_call_stores_reply_and_follows_error_target() {
        let graph = flow(json!([
            { "id": "call", "type": "api_call", "content": {
                "url": "https://api.test/orders/{{order_id}}", "method": "post", "body": { "id": "{{order_id}}" }
            }, "metadata": { "error_target": "sorry" }, "next": "show" },
            { "id": "show", "type": "message", "content": "Status: {{api_response.status}}" },
            { "id": "sorry", "type": "message", "content": "Lookup failed" }
        ]));
        let mut state = fresh();
        state.context.set("order_id", 7);

        let api = Arc::new(ScriptedApi::replying(json!({"status": "shipped"})));
        let (result, _) = executor(Delegates {
            api: Some(api.clone()),
            ..Delegates::default()
        })
        .execute(&graph, state.clone(), &"".into(), &[])
        .await;
        assert_eq!(result.response.text, "Status: shipped");
        let requests = api.requests();
        let request = &requests[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "https://api.test/orders/7");
        assert_eq!(request.body, Some(json!({"id": 7})));

        let broken = Arc::new(ScriptedApi::failing(DelegateError::new(DelegateErrorKind::Auth, "401")));
        let (result, state) = executor(Delegates {
            api: Some(broken),
            ..Delegates::default()
        })
        .execute(&graph, state, &"".into(), &[])
        .await;
        assert_eq!(result.response.text, "Lookup failed");
        assert!(result.error.is_none());
        assert!(state.context.get_str("api_error").is_some());
    }

    #[tokio::test]
    async fn test_tts_encodes_audio_and_stt_replaces_input() {
        let graph = flow(json!([
            { "id": "listen", "type": "stt", "next": "route" },
            { "id": "route", "type": "condition", "next": [
                { "condition": { "operator": "contains", "value": "order" }, "target": "speak" },
                { "condition": { "operator": "default" }, "target": "other" }
            ] },
            { "id": "speak", "type": "tts", "content": { "text": "You said {{transcript}}", "voice": "alto" } },
            { "id": "other", "type": "message", "content": "Pardon?" }
        ]));
        let speech = Arc::new(ScriptedSpeech::new("track my order", vec![1, 2, 3]));
        let exec = executor(Delegates {
            speech: Some(speech.clone()),
            ..Delegates::default()
        });

        let message = InboundMessage::text("").with_audio(vec![9, 9], Some("en"));
        let (result, state) = exec.execute(&graph, fresh(), &message, &[]).await;
        assert_eq!(result.response.text, "You said track my order");
        assert_eq!(result.response.audio.as_deref(), Some("AQID"));
        assert_eq!(speech.language_hints(), vec![Some("en".to_string())]);
        assert_eq!(state.history[0].text, "track my order");
    }

    #[tokio::test]
    async fn test_template_overrides_apply_without_mutating_graph() {
        let graph = price_flow();
        let overrides = vec![TemplateOverride::new(Some("msg1"), OverrideField::Content, OverrideMode::Prefix, "Welcome! ")];
        let exec = executor(Delegates::default());

        let (result, _) = exec.execute(&graph, fresh(), &"".into(), &overrides).await;
        assert_eq!(result.response.text, "Welcome! Hi");
        assert_eq!(graph.node("msg1").and_then(|n| n.text("text")), Some("Hi"));
    }

    #[tokio::test]
    async fn test_unknown_node_passes_through_or_echoes() {
        let graph = flow(json!([
            { "id": "card", "type": "carousel", "content": { "items": [1] }, "next": "tail" },
            { "id": "tail", "type": "gallery", "content": "raw text" }
        ]));
        let (result, _) = executor(Delegates::default()).execute(&graph, fresh(), &"".into(), &[]).await;
        assert_eq!(result.response.text, "raw text");
        assert_eq!(result.metrics.visited, vec!["card", "tail"]);
    }

    #[tokio::test]
    async fn test_estimated_tokens_follow_formula() {
        let graph = price_flow();
        let (result, _) = executor(Delegates::default()).execute(&graph, fresh(), &"hello!!".into(), &[]).await;
        // 7 input chars, 2 output chars, one hop
        assert_eq!(result.metrics.tokens_used, 2 + 1 + 10);
        assert!(result.metrics.tokens_estimated);
    }

    #[tokio::test]
    async fn test_execute_at_returns_errors() {
        let graph = price_flow();
        let exec = executor(Delegates::default());
        let err = exec.execute_at(&graph, fresh(), "missing", &"".into(), &[]).await.unwrap_err();
        assert!(matches!(err, FlowError::NotFound(_)));

        let (result, state) = exec.execute_at(&graph, fresh(), "msg2", &"".into(), &[]).await.unwrap();
        assert_eq!(result.response.text, "It costs 10");
        assert!(state.current_node_id.is_none());
    }
}
