//! Explicit, non-linear jumps within a tenant's flow.
//!
//! A navigation claims the session like a turn does, validates the target, snapshots the
//! context, optionally executes the target node, and appends a [`NavigationStep`] to the
//! session's bounded history. A failed execution rolls the session back to where it was.

mod history;
mod hooks;

use std::{sync::Arc, time::Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    FlowError, Result,
    cache::FlowCache,
    common::{Clock, Vars},
    config::NavigationConfig,
    executor::{InboundMessage, NodeExecutor, Response, TurnMetrics},
    graph::{FlowGraph, TemplateOverride},
    session::{SessionKey, SessionLocks, SessionState, SessionStateStore},
    utils,
};

pub use history::{DEFAULT_HISTORY_CAP, NavigationHistory, NavigationMethod, NavigationStep};
pub use hooks::{NavigationHook, StageBoard, StageHook};

/// What to do when a target was visited too often recently.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CircularPolicy {
    #[default]
    Reject,
    Warn,
}

#[derive(Debug, Clone)]
pub struct NavigationOptions {
    pub method: NavigationMethod,
    /// Keep the session context; when false it is cleared before the jump.
    pub preserve_context: bool,
    /// Run the target node now instead of on the next turn.
    pub execute: bool,
    /// Input handed to the target node when executing.
    pub input: Option<String>,
    /// Take a context snapshot for rollback.
    pub snapshot: bool,
    pub circular_policy: CircularPolicy,
    pub overrides: Vec<TemplateOverride>,
    /// Graph to navigate in instead of the tenant's active flow.
    pub graph: Option<Arc<FlowGraph>>,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            method: NavigationMethod::Goto,
            preserve_context: true,
            execute: true,
            input: None,
            snapshot: true,
            circular_policy: CircularPolicy::Reject,
            overrides: Vec::new(),
            graph: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub success: bool,
    pub step: NavigationStep,
    /// Reply of the executed target node.
    pub response: Option<Response>,
    pub metrics: Option<TurnMetrics>,
    pub state: SessionState,
    /// Execution failure that caused a rollback.
    pub error: Option<FlowError>,
    pub warnings: Vec<String>,
}

pub struct NavigationService {
    cache: Arc<FlowCache>,
    sessions: Arc<dyn SessionStateStore>,
    executor: Arc<NodeExecutor>,
    locks: Arc<SessionLocks>,
    clock: Arc<dyn Clock>,
    config: NavigationConfig,
    hooks: Vec<Arc<dyn NavigationHook>>,
}

impl NavigationService {
    pub fn new(
        cache: Arc<FlowCache>,
        sessions: Arc<dyn SessionStateStore>,
        executor: Arc<NodeExecutor>,
        locks: Arc<SessionLocks>,
        clock: Arc<dyn Clock>,
        config: NavigationConfig,
    ) -> Self {
        Self {
            cache,
            sessions,
            executor,
            locks,
            clock,
            config,
            hooks: Vec::new(),
        }
    }

    pub fn add_hook(
        &mut self,
        hook: Arc<dyn NavigationHook>,
    ) {
        self.hooks.push(hook);
    }

    /// Jump the session to `target`.
    ///
    /// Validation failures return an error and leave the session untouched. A failed
    /// execution of the target is rolled back, recorded as an unsuccessful step and
    /// reported through [`NavigationResult::error`].
    pub async fn goto_flow(
        &self,
        key: &SessionKey,
        target: &str,
        options: NavigationOptions,
    ) -> Result<NavigationResult> {
        let _guard = self.locks.try_acquire(key).ok_or_else(|| FlowError::SessionBusy(key.to_string()))?;
        let started = Instant::now();

        let graph = match options.graph.clone() {
            Some(graph) => graph,
            None => self.cache.get_or_load(&key.tenant_id).await?.ok_or_else(|| FlowError::NotFound(format!("no active flow for tenant {}", key.tenant_id)))?,
        };
        if graph.tenant_id != key.tenant_id {
            return Err(FlowError::Validation(format!("flow {} does not belong to tenant {}", graph.id, key.tenant_id)));
        }
        if !graph.contains(target) {
            return Err(FlowError::NotFound(format!("node {} in flow {}", target, graph.id)));
        }

        let mut state = match self.sessions.load(key).await? {
            Some(state) => state,
            None => SessionState::new(key, self.clock.now_millis()),
        };
        state.navigation.set_cap(self.config.history_limit);

        let mut warnings = Vec::new();
        let recent = state.navigation.count_recent(target, self.config.circular_window);
        if recent > self.config.circular_max_repeats {
            let message = format!("circular navigation to {}: {} times in the last {} steps", target, recent, self.config.circular_window);
            warn!(session = %key, "{}", message);
            match options.circular_policy {
                CircularPolicy::Reject => return Err(FlowError::Validation(message)),
                CircularPolicy::Warn => warnings.push(message),
            }
        }

        let snapshot = options.snapshot.then(|| state.context.clone());
        let from_node_id = state.current_node_id.clone();
        let awaiting_before = state.awaiting_input.clone();

        if !options.preserve_context {
            state.context.clear();
        }
        state.current_node_id = Some(target.to_string());
        state.awaiting_input = None;
        state.completed = false;

        let (mut state, response, metrics, error) = if options.execute {
            let message = InboundMessage::text(options.input.as_deref().unwrap_or_default());
            match self.executor.execute_at(&graph, state.clone(), target, &message, &options.overrides).await {
                Ok((result, state)) => (state, Some(result.response), Some(result.metrics), None),
                Err(e) => {
                    warn!(session = %key, node = target, error = %e, "navigation failed, rolling back");
                    let mut state = state;
                    state.current_node_id = from_node_id.clone();
                    state.awaiting_input = awaiting_before;
                    if let Some(context) = rollback_context(snapshot.as_ref(), &state) {
                        state.context = context;
                    }
                    (state, None, None, Some(e))
                }
            }
        } else {
            (state, None, None, None)
        };

        let now = self.clock.now_millis();
        let step = NavigationStep {
            id: nanoid::nanoid!(),
            timestamp: now,
            from_node_id,
            to_node_id: target.to_string(),
            method: if error.is_some() { NavigationMethod::Rollback } else { options.method },
            success: error.is_none(),
            duration_ms: utils::time::elapsed_millis(started),
            error_message: error.as_ref().map(ToString::to_string),
            context_snapshot: snapshot,
        };
        state.navigation.push(step.clone());
        state.touch(now);
        self.sessions.save(&state).await?;

        if step.success {
            for hook in &self.hooks {
                hook.after_navigation(&step, &graph, &state).await;
            }
        }
        info!(session = %key, from = ?step.from_node_id, to = target, method = %step.method, success = step.success, "navigation");

        Ok(NavigationResult {
            success: step.success,
            step,
            response,
            metrics,
            state,
            error,
            warnings,
        })
    }
}

/// The navigation's own snapshot, else the latest successful one on record.
fn rollback_context(
    own: Option<&Vars>,
    state: &SessionState,
) -> Option<Vars> {
    own.or_else(|| state.navigation.latest_snapshot()).cloned()
}
