use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{common::Vars, graph::NodeId};

/// Steps kept per session when no explicit cap is configured.
pub const DEFAULT_HISTORY_CAP: usize = 50;

/// How a navigation was requested.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NavigationMethod {
    /// Explicit jump requested by the integration.
    #[default]
    Goto,
    /// Jump triggered by a user action such as a button.
    UserAction,
    /// The jump failed and the session was restored to where it was.
    Rollback,
}

/// Immutable audit record of one navigation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationStep {
    pub id: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_node_id: Option<NodeId>,
    pub to_node_id: NodeId,
    pub method: NavigationMethod,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Context as it was before the navigation ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_snapshot: Option<Vars>,
}

/// Bounded per-session ring of navigation steps, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationHistory {
    steps: VecDeque<NavigationStep>,
    cap: usize,
}

impl Default for NavigationHistory {
    fn default() -> Self {
        Self::with_cap(DEFAULT_HISTORY_CAP)
    }
}

impl NavigationHistory {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            steps: VecDeque::new(),
            cap: cap.max(1),
        }
    }

    /// Append a step, evicting the oldest past the cap.
    pub fn push(
        &mut self,
        step: NavigationStep,
    ) {
        self.steps.push_back(step);
        while self.steps.len() > self.cap {
            self.steps.pop_front();
        }
    }

    pub fn set_cap(
        &mut self,
        cap: usize,
    ) {
        self.cap = cap.max(1);
        while self.steps.len() > self.cap {
            self.steps.pop_front();
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &NavigationStep> {
        self.steps.iter()
    }

    pub fn last(&self) -> Option<&NavigationStep> {
        self.steps.back()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// How often `target` was navigated to among the last `window` steps.
    pub fn count_recent(
        &self,
        target: &str,
        window: usize,
    ) -> usize {
        self.steps.iter().rev().take(window).filter(|s| s.to_node_id == target).count()
    }

    /// Snapshot of the most recent successful step that took one.
    pub fn latest_snapshot(&self) -> Option<&Vars> {
        self.steps.iter().rev().filter(|s| s.success).find_map(|s| s.context_snapshot.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(
        to: &str,
        success: bool,
        snapshot: Option<Vars>,
    ) -> NavigationStep {
        NavigationStep {
            id: nanoid::nanoid!(),
            timestamp: 0,
            from_node_id: None,
            to_node_id: to.to_string(),
            method: NavigationMethod::Goto,
            success,
            duration_ms: 0,
            error_message: None,
            context_snapshot: snapshot,
        }
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let mut history = NavigationHistory::with_cap(3);
        for to in ["a", "b", "c", "d"] {
            history.push(step(to, true, None));
        }
        let targets: Vec<&str> = history.iter().map(|s| s.to_node_id.as_str()).collect();
        assert_eq!(targets, vec!["b", "c", "d"]);
        assert_eq!(history.last().map(|s| s.to_node_id.as_str()), Some("d"));
    }

    #[test]
    fn test_count_recent_respects_window() {
        let mut history = NavigationHistory::default();
        for to in ["x", "x", "a", "b", "x"] {
            history.push(step(to, true, None));
        }
        assert_eq!(history.count_recent("x", 10), 3);
        assert_eq!(history.count_recent("x", 2), 1);
        assert_eq!(history.count_recent("y", 10), 0);
    }

    #[test]
    fn test_latest_snapshot_skips_failures() {
        let mut history = NavigationHistory::default();
        history.push(step("a", true, Some(Vars::new().with("n", 1))));
        history.push(step("b", false, Some(Vars::new().with("n", 2))));
        history.push(step("c", true, None));
        assert_eq!(history.latest_snapshot().and_then(|v| v.get::<u32>("n")), Some(1));
    }
}
