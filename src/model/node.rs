use serde::{Deserialize, Serialize};

use crate::graph::Condition;

/// A node as authored. `node_type` is free text and normalized at compile time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeModel {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<NextModel>,
}

/// The authored `next` field accepts a bare id, a branch list or `{"target": id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NextModel {
    Target(String),
    Branches(Vec<BranchModel>),
    Keyed {
        target: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchModel {
    pub condition: Condition,
    pub target: String,
}
