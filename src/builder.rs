use std::sync::Arc;

use crate::{
    Config, FlowError, FlowService, Result,
    cache::FlowCache,
    common::{Clock, InProgress, SystemClock},
    delegate::{AiDelegate, ApiDelegate, HttpApiDelegate, SpeechDelegate},
    executor::{Delegates, NodeExecutor},
    navigation::{NavigationHook, NavigationService},
    session::{MemSessionStore, SessionStateStore},
    store::{FlowGraphStore, MemFlowStore},
};

/// Wires stores, delegates and the clock into a [`FlowService`].
///
/// Anything not set falls back to the in-memory stores, the reqwest api delegate and
/// the system clock. AI and speech delegates have no default.
#[derive(Default)]
pub struct FlowServiceBuilder {
    config: Config,
    flow_store: Option<Arc<dyn FlowGraphStore>>,
    session_store: Option<Arc<dyn SessionStateStore>>,
    clock: Option<Arc<dyn Clock>>,
    ai: Option<Arc<dyn AiDelegate>>,
    speech: Option<Arc<dyn SpeechDelegate>>,
    api: Option<Arc<dyn ApiDelegate>>,
    hooks: Vec<Arc<dyn NavigationHook>>,
}

impl FlowServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn flow_store(
        mut self,
        store: Arc<dyn FlowGraphStore>,
    ) -> Self {
        self.flow_store = Some(store);
        self
    }

    pub fn session_store(
        mut self,
        store: Arc<dyn SessionStateStore>,
    ) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn clock(
        mut self,
        clock: Arc<dyn Clock>,
    ) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn ai_delegate(
        mut self,
        ai: Arc<dyn AiDelegate>,
    ) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn speech_delegate(
        mut self,
        speech: Arc<dyn SpeechDelegate>,
    ) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn api_delegate(
        mut self,
        api: Arc<dyn ApiDelegate>,
    ) -> Self {
        self.api = Some(api);
        self
    }

    pub fn navigation_hook(
        mut self,
        hook: Arc<dyn NavigationHook>,
    ) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> Result<FlowService> {
        if self.config.executor.max_hops == 0 {
            return Err(FlowError::Config("executor.max_hops must be at least 1".to_string()));
        }
        if self.config.navigation.circular_window == 0 {
            return Err(FlowError::Config("navigation.circular_window must be at least 1".to_string()));
        }

        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self.flow_store.unwrap_or_else(|| Arc::new(MemFlowStore::new()));
        let sessions = self.session_store.unwrap_or_else(|| Arc::new(MemSessionStore::new(config.session.capacity, clock.clone())));

        let delegates = Delegates {
            ai: self.ai,
            speech: self.speech,
            api: Some(self.api.unwrap_or_else(|| Arc::new(HttpApiDelegate::default()))),
        };

        let cache = Arc::new(FlowCache::new(store.clone(), config.cache.capacity, config.cache.ttl(), clock.clone()));
        let executor = Arc::new(NodeExecutor::new(delegates, config.executor.clone(), config.session.history_limit, clock.clone()));
        let locks = InProgress::new();

        let mut navigator = NavigationService::new(cache.clone(), sessions.clone(), executor.clone(), locks.clone(), clock.clone(), config.navigation.clone());
        for hook in self.hooks {
            navigator.add_hook(hook);
        }

        Ok(FlowService::new(store, cache, sessions, executor, navigator, locks, clock, config))
    }
}
