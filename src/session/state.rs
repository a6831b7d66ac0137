use std::{collections::VecDeque, fmt};

use serde::{Deserialize, Serialize};

use crate::{common::Vars, graph::NodeId, navigation::NavigationHistory};

/// Identifies one conversation: (tenant, user, session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub tenant_id: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(
        tenant_id: &str,
        user_id: &str,
        session_id: &str,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}:{}", self.tenant_id, self.user_id, self.session_id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One line of conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    pub timestamp: i64,
}

/// Per-session execution state carried between turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub tenant_id: String,
    pub user_id: String,
    pub session_id: String,
    /// Node the next turn starts from. `None` starts from the entry node.
    pub current_node_id: Option<NodeId>,
    /// Input node whose answer the next turn carries.
    #[serde(default)]
    pub awaiting_input: Option<NodeId>,
    #[serde(default)]
    pub context: Vars,
    #[serde(default)]
    pub history: VecDeque<HistoryEntry>,
    #[serde(default)]
    pub navigation: NavigationHistory,
    /// Set when an end node was reached.
    #[serde(default)]
    pub completed: bool,
    /// Version of the graph the state was last advanced with.
    #[serde(default)]
    pub flow_version: Option<u64>,
    pub started_at: i64,
    pub last_updated_at: i64,
}

impl SessionState {
    pub fn new(
        key: &SessionKey,
        now: i64,
    ) -> Self {
        Self {
            tenant_id: key.tenant_id.clone(),
            user_id: key.user_id.clone(),
            session_id: key.session_id.clone(),
            current_node_id: None,
            awaiting_input: None,
            context: Vars::new(),
            history: VecDeque::new(),
            navigation: NavigationHistory::default(),
            completed: false,
            flow_version: None,
            started_at: now,
            last_updated_at: now,
        }
    }

    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.tenant_id, &self.user_id, &self.session_id)
    }

    /// Append to the conversation history, evicting the oldest entries past `limit`.
    pub fn push_history(
        &mut self,
        entry: HistoryEntry,
        limit: usize,
    ) {
        self.history.push_back(entry);
        while self.history.len() > limit.max(1) {
            self.history.pop_front();
        }
    }

    pub fn touch(
        &mut self,
        now: i64,
    ) {
        self.last_updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let key = SessionKey::new("t", "u", "s");
        let mut state = SessionState::new(&key, 0);
        for i in 0..5 {
            state.push_history(
                HistoryEntry {
                    role: Role::User,
                    text: format!("m{}", i),
                    node_id: None,
                    timestamp: i,
                },
                3,
            );
        }
        let texts: Vec<&str> = state.history.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["m2", "m3", "m4"]);
        assert_eq!(state.key(), key);
        assert_eq!(key.to_string(), "t:u:s");
    }

    #[test]
    fn test_state_serde_defaults() {
        let state: SessionState = serde_json::from_value(serde_json::json!({
            "tenant_id": "t", "user_id": "u", "session_id": "s",
            "current_node_id": "n1", "started_at": 1, "last_updated_at": 2
        }))
        .unwrap();
        assert_eq!(state.current_node_id.as_deref(), Some("n1"));
        assert!(state.context.is_empty());
        assert!(state.navigation.is_empty());
    }
}
