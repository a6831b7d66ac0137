use async_trait::async_trait;

use crate::{
    common::MemCache,
    graph::FlowGraph,
    navigation::NavigationStep,
    session::{SessionKey, SessionState},
};

/// Observer run after every successful navigation.
#[async_trait]
pub trait NavigationHook: Send + Sync {
    async fn after_navigation(
        &self,
        step: &NavigationStep,
        graph: &FlowGraph,
        state: &SessionState,
    );
}

/// Side-channel view of which stage each session is in, kept outside the engine state
/// so CRM-style integrations can read it without touching sessions.
#[derive(Clone)]
pub struct StageBoard {
    stages: MemCache<SessionKey, String>,
}

impl StageBoard {
    pub fn new(capacity: usize) -> Self {
        Self {
            stages: MemCache::new(capacity),
        }
    }

    pub fn stage(
        &self,
        key: &SessionKey,
    ) -> Option<String> {
        self.stages.get(key)
    }

    pub fn set_stage(
        &self,
        key: SessionKey,
        stage: &str,
    ) {
        self.stages.set(key, stage.to_string());
    }
}

/// Records the target node's `stage` metadata, or its id, on a [`StageBoard`].
pub struct StageHook {
    board: StageBoard,
}

impl StageHook {
    pub fn new(board: StageBoard) -> Self {
        Self {
            board,
        }
    }
}

#[async_trait]
impl NavigationHook for StageHook {
    async fn after_navigation(
        &self,
        step: &NavigationStep,
        graph: &FlowGraph,
        state: &SessionState,
    ) {
        let stage = graph.node(&step.to_node_id).and_then(|n| n.metadata.get_str("stage")).unwrap_or(&step.to_node_id);
        self.board.set_stage(state.key(), stage);
    }
}
