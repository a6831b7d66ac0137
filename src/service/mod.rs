//! Flow service facade.
//!
//! `FlowService` is the one entry point channel adapters talk to. It serializes traffic per
//! session, loads the tenant's compiled graph through the [`FlowCache`], runs the turn on the
//! [`NodeExecutor`], persists the session and aggregates per-tenant metrics. Errors stop
//! here: callers always get a response and a valid session state.

mod metrics;

use std::{
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::{Arc, PoisonError, RwLock},
};

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::{
    Config, FlowError, Result, ShareLock,
    cache::FlowCache,
    common::Clock,
    executor::{InboundMessage, NodeExecutor, Response, TurnMetrics, estimate_tokens, panic_detail},
    graph::{FlowGraph, TemplateOverride},
    model::FlowModel,
    navigation::{NavigationOptions, NavigationService},
    session::{SessionKey, SessionLocks, SessionState, SessionStateStore},
    store::{FlowGraphStore, FlowRecord},
};

pub use metrics::{MetricsRegistry, TenantMetrics};

/// One inbound turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub message: InboundMessage,
    pub tenant_id: String,
    pub user_id: String,
    pub session_id: String,
    /// State returned by the previous turn of this same session. Takes precedence over the session store.
    pub prev_state: Option<SessionState>,
    /// Graph to run instead of the tenant's active flow.
    pub override_graph: Option<Arc<FlowGraph>>,
    /// Applied after the tenant's registered overrides.
    pub template_overrides: Vec<TemplateOverride>,
}

impl TurnRequest {
    pub fn new(
        tenant_id: &str,
        user_id: &str,
        session_id: &str,
        message: impl Into<InboundMessage>,
    ) -> Self {
        Self {
            message: message.into(),
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            prev_state: None,
            override_graph: None,
            template_overrides: Vec::new(),
        }
    }

    pub fn with_prev_state(
        mut self,
        state: SessionState,
    ) -> Self {
        self.prev_state = Some(state);
        self
    }

    pub fn with_graph(
        mut self,
        graph: Arc<FlowGraph>,
    ) -> Self {
        self.override_graph = Some(graph);
        self
    }

    pub fn with_overrides(
        mut self,
        overrides: Vec<TemplateOverride>,
    ) -> Self {
        self.template_overrides = overrides;
        self
    }

    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.tenant_id, &self.user_id, &self.session_id)
    }
}

/// What a turn or navigation hands back to the channel adapter.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: Response,
    pub state: SessionState,
    pub metrics: TurnMetrics,
    pub error: Option<FlowError>,
}

pub struct FlowService {
    store: Arc<dyn FlowGraphStore>,
    cache: Arc<FlowCache>,
    sessions: Arc<dyn SessionStateStore>,
    executor: Arc<NodeExecutor>,
    navigator: NavigationService,
    locks: Arc<SessionLocks>,
    clock: Arc<dyn Clock>,
    config: Config,
    overrides: ShareLock<HashMap<String, Vec<TemplateOverride>>>,
    metrics: MetricsRegistry,
}

impl FlowService {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        store: Arc<dyn FlowGraphStore>,
        cache: Arc<FlowCache>,
        sessions: Arc<dyn SessionStateStore>,
        executor: Arc<NodeExecutor>,
        navigator: NavigationService,
        locks: Arc<SessionLocks>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        let metrics = MetricsRegistry::new(config.cache.capacity);
        Self {
            store,
            cache,
            sessions,
            executor,
            navigator,
            locks,
            clock,
            config,
            overrides: Arc::new(RwLock::new(HashMap::new())),
            metrics,
        }
    }

    /// Run one user turn.
    pub async fn process_message(
        &self,
        request: TurnRequest,
    ) -> TurnOutcome {
        let key = request.key();
        if let Some(prev) = &request.prev_state
            && prev.key() != key
        {
            let e = FlowError::Validation(format!("previous state belongs to session {}, not {}", prev.key(), key));
            return self.fallback(&key, SessionState::new(&key, self.clock.now_millis()), &request.message, e);
        }

        let Some(_guard) = self.locks.try_acquire(&key) else {
            warn!(session = %key, "turn rejected, session busy");
            let state = request.prev_state.unwrap_or_else(|| SessionState::new(&key, self.clock.now_millis()));
            return self.fallback(&key, state, &request.message, FlowError::SessionBusy(key.to_string()));
        };

        let state = match request.prev_state {
            Some(state) => state,
            None => match self.sessions.load(&key).await {
                Ok(Some(state)) => state,
                Ok(None) => SessionState::new(&key, self.clock.now_millis()),
                Err(e) => return self.fallback(&key, SessionState::new(&key, self.clock.now_millis()), &request.message, e),
            },
        };

        let graph = match request.override_graph {
            Some(graph) if graph.tenant_id != key.tenant_id => {
                let e = FlowError::Validation(format!("flow {} does not belong to tenant {}", graph.id, key.tenant_id));
                return self.fallback(&key, state, &request.message, e);
            }
            Some(graph) => graph,
            None => match self.cache.get_or_load(&key.tenant_id).await {
                Ok(Some(graph)) => graph,
                Ok(None) => return self.no_flow(&key, state, &request.message),
                Err(e) => return self.fallback(&key, state, &request.message, e),
            },
        };

        let mut overrides = self.template_overrides(&key.tenant_id);
        overrides.extend(request.template_overrides);

        let (result, state) = self.executor.execute(&graph, state, &request.message, &overrides).await;
        let mut outcome = TurnOutcome {
            response: result.response,
            state,
            metrics: result.metrics,
            error: result.error,
        };

        if let Err(e) = self.sessions.save(&outcome.state).await {
            error!(session = %key, error = %e, "failed to persist session state");
            outcome.metrics.error = Some(e.kind());
            outcome.error.get_or_insert(e);
        }
        self.metrics.record(&key.tenant_id, &outcome.metrics);
        debug!(session = %key, hops = outcome.metrics.hops, tokens = outcome.metrics.tokens_used, "turn complete");
        outcome
    }

    /// Jump a session to `target`, converting failures into a fallback reply.
    pub async fn goto_flow(
        &self,
        key: &SessionKey,
        target: &str,
        options: NavigationOptions,
    ) -> TurnOutcome {
        let message = InboundMessage::text(options.input.as_deref().unwrap_or_default());
        let navigated = AssertUnwindSafe(self.navigator.goto_flow(key, target, options))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(FlowError::Internal(format!("navigation panicked: {}", panic_detail(&*panic)))));
        match navigated {
            Ok(nav) => match nav.error {
                Some(e) => self.fallback(key, nav.state, &message, e),
                None => {
                    let outcome = TurnOutcome {
                        response: nav.response.unwrap_or_default(),
                        state: nav.state,
                        metrics: nav.metrics.unwrap_or_default(),
                        error: None,
                    };
                    self.metrics.record(&key.tenant_id, &outcome.metrics);
                    outcome
                }
            },
            Err(e) => {
                let state = match self.sessions.load(key).await {
                    Ok(Some(state)) => state,
                    _ => SessionState::new(key, self.clock.now_millis()),
                };
                self.fallback(key, state, &message, e)
            }
        }
    }

    pub fn navigator(&self) -> &NavigationService {
        &self.navigator
    }

    pub fn cache(&self) -> &FlowCache {
        &self.cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Store a new flow. The graph must compile without errors.
    pub async fn create_flow(
        &self,
        model: &FlowModel,
    ) -> Result<FlowRecord> {
        Self::check(model)?;
        if self.store.find(&model.id).await?.is_some() {
            return Err(FlowError::Validation(format!("flow {} already exists", model.id)));
        }
        let record = self.store.upsert(&FlowRecord::from_model(model, self.clock.now_millis())?).await?;
        self.cache.invalidate(&record.tenant_id);
        info!(flow = %record.id, tenant = %record.tenant_id, "flow created");
        Ok(record)
    }

    /// Replace an existing flow's definition, bumping its version.
    pub async fn update_flow(
        &self,
        model: &FlowModel,
    ) -> Result<FlowRecord> {
        Self::check(model)?;
        if self.store.find(&model.id).await?.is_none() {
            return Err(FlowError::NotFound(format!("flow {}", model.id)));
        }
        let record = self.store.upsert(&FlowRecord::from_model(model, self.clock.now_millis())?).await?;
        self.cache.invalidate(&record.tenant_id);
        info!(flow = %record.id, tenant = %record.tenant_id, version = record.version, "flow updated");
        Ok(record)
    }

    /// Make `flow_id` the tenant's active flow.
    pub async fn activate_flow(
        &self,
        flow_id: &str,
        tenant_id: &str,
    ) -> Result<()> {
        self.store.set_active(flow_id, tenant_id).await?;
        self.cache.invalidate(tenant_id);
        info!(flow = flow_id, tenant = tenant_id, "flow activated");
        Ok(())
    }

    pub async fn delete_flow(
        &self,
        flow_id: &str,
    ) -> Result<Option<FlowRecord>> {
        let removed = self.store.delete(flow_id).await?;
        if let Some(record) = &removed {
            self.cache.invalidate(&record.tenant_id);
            info!(flow = flow_id, tenant = %record.tenant_id, "flow deleted");
        }
        Ok(removed)
    }

    pub async fn get_flows_by_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<FlowRecord>> {
        self.store.list(tenant_id).await
    }

    /// Register overrides applied to every turn of the tenant.
    pub fn set_template_overrides(
        &self,
        tenant_id: &str,
        overrides: Vec<TemplateOverride>,
    ) {
        let mut all = self.overrides.write().unwrap_or_else(PoisonError::into_inner);
        if overrides.is_empty() {
            all.remove(tenant_id);
        } else {
            all.insert(tenant_id.to_string(), overrides);
        }
    }

    pub fn template_overrides(
        &self,
        tenant_id: &str,
    ) -> Vec<TemplateOverride> {
        let all = self.overrides.read().unwrap_or_else(PoisonError::into_inner);
        all.get(tenant_id).cloned().unwrap_or_default()
    }

    /// Drop sessions idle for longer than `session.ttl_secs`.
    pub async fn purge_inactive_sessions(&self) -> Result<usize> {
        let purged = self.sessions.purge_older_than(self.config.session.ttl()).await?;
        if purged > 0 {
            info!(purged, "purged inactive sessions");
        }
        Ok(purged)
    }

    pub fn metrics(
        &self,
        tenant_id: &str,
    ) -> TenantMetrics {
        self.metrics.snapshot(tenant_id)
    }

    fn check(model: &FlowModel) -> Result<()> {
        let report = FlowGraph::check(model);
        if !report.is_ok() {
            return Err(FlowError::Validation(format!("flow {} is invalid: {}", model.id, report.errors.join("; "))));
        }
        for warning in &report.warnings {
            warn!(flow = %model.id, "{}", warning);
        }
        Ok(())
    }

    fn no_flow(
        &self,
        key: &SessionKey,
        state: SessionState,
        message: &InboundMessage,
    ) -> TurnOutcome {
        debug!(session = %key, "no active flow for tenant");
        let text = self.config.executor.no_flow_message.clone();
        let metrics = TurnMetrics {
            tokens_used: estimate_tokens(&message.text, &text, 0, 0).max(1),
            tokens_estimated: true,
            ..TurnMetrics::default()
        };
        self.metrics.record(&key.tenant_id, &metrics);
        TurnOutcome {
            response: Response::text(&text),
            state,
            metrics,
            error: None,
        }
    }

    fn fallback(
        &self,
        key: &SessionKey,
        state: SessionState,
        message: &InboundMessage,
        error: FlowError,
    ) -> TurnOutcome {
        warn!(session = %key, kind = %error.kind(), error = %error, "replying with fallback");
        let text = self.config.executor.fallback_message.clone();
        let metrics = TurnMetrics {
            tokens_used: estimate_tokens(&message.text, &text, 0, 0).max(1),
            tokens_estimated: true,
            error: Some(error.kind()),
            ..TurnMetrics::default()
        };
        self.metrics.record(&key.tenant_id, &metrics);
        TurnOutcome {
            response: Response::text(&text),
            state,
            metrics,
            error: Some(error),
        }
    }
}
