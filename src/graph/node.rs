use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    common::Vars,
    graph::Condition,
    model::{NextModel, NodeModel},
};

/// node id
pub type NodeId = String;

/// The closed set of node kinds the executor dispatches on.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::Display, strum::EnumString, strum::EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeKind {
    Start,
    Message,
    Input,
    Condition,
    Action,
    ApiCall,
    Ai,
    Tts,
    Stt,
    End,
    /// Anything the alias table does not recognize.
    Unknown,
}

impl NodeKind {
    /// Map an authored type string onto a canonical kind.
    pub fn normalize(raw: &str) -> Self {
        let key = raw.trim().to_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "start" | "begin" | "entry" | "trigger" => NodeKind::Start,
            "message" | "msg" | "text" | "send_message" | "reply" => NodeKind::Message,
            "input" | "question" | "ask" | "user_input" | "collect" | "prompt" => NodeKind::Input,
            "condition" | "conditional" | "branch" | "if" | "if_else" | "switch" | "router" => NodeKind::Condition,
            "action" | "set_variable" | "assign" | "set" => NodeKind::Action,
            "api_call" | "api" | "http" | "http_request" | "webhook" => NodeKind::ApiCall,
            "ai" | "llm" | "gpt" | "openai" | "ai_response" | "agent" | "chatgpt" => NodeKind::Ai,
            "tts" | "text_to_speech" | "speak" | "voice" => NodeKind::Tts,
            "stt" | "speech_to_text" | "transcribe" | "listen" => NodeKind::Stt,
            "end" | "finish" | "stop" | "exit" | "terminate" => NodeKind::End,
            _ => NodeKind::Unknown,
        }
    }

    /// Kinds that hop to their successor within the same turn.
    pub fn auto_advances(self) -> bool {
        matches!(self, NodeKind::Start | NodeKind::Condition | NodeKind::Action | NodeKind::ApiCall | NodeKind::Stt)
    }

    /// JSON schema the node's `content` must satisfy.
    pub fn content_schema(self) -> Value {
        let text_or = |required: &str, extra: Value| {
            json!({
                "anyOf": [
                    { "type": "string" },
                    { "type": "object", "required": [required], "properties": extra }
                ]
            })
        };
        match self {
            NodeKind::Message => text_or("text", json!({ "text": { "type": "string" } })),
            NodeKind::Input => text_or(
                "prompt",
                json!({
                    "prompt": { "type": "string" },
                    "variable": { "type": "string" },
                    "pattern": { "type": "string" },
                    "retry_message": { "type": "string" }
                }),
            ),
            NodeKind::Ai => text_or(
                "prompt",
                json!({
                    "prompt": { "type": "string" },
                    "system_prompt": { "type": "string" },
                    "model": { "type": "string" },
                    "temperature": { "type": "number" },
                    "max_tokens": { "type": "integer", "minimum": 1 },
                    "output_variable": { "type": "string" }
                }),
            ),
            NodeKind::Tts => text_or("text", json!({ "text": { "type": "string" }, "voice": { "type": "string" } })),
            NodeKind::ApiCall => json!({
                "type": "object",
                "required": ["url"],
                "properties": {
                    "url": { "type": "string" },
                    "method": { "type": "string", "enum": ["GET", "POST", "PUT", "PATCH", "DELETE", "get", "post", "put", "patch", "delete"] },
                    "headers": { "type": "object", "additionalProperties": { "type": "string" } },
                    "result_variable": { "type": "string" }
                }
            }),
            NodeKind::Action => json!({
                "anyOf": [
                    { "type": "null" },
                    {
                        "type": "object",
                        "properties": {
                            "set": { "type": "object" },
                            "clear": { "type": "array", "items": { "type": "string" } }
                        }
                    }
                ]
            }),
            _ => json!({}),
        }
    }
}

/// Where a node goes next.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Direct(NodeId),
    Conditional(Vec<ConditionalTarget>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalTarget {
    pub condition: Condition,
    pub target: NodeId,
}

impl Transition {
    /// Every node id this transition can lead to, in order.
    pub fn targets(&self) -> Vec<&NodeId> {
        match self {
            Transition::Direct(target) => vec![target],
            Transition::Conditional(branches) => branches.iter().map(|b| &b.target).collect(),
        }
    }
}

impl From<NextModel> for Transition {
    fn from(next: NextModel) -> Self {
        match next {
            NextModel::Target(target) => Transition::Direct(target),
            NextModel::Keyed {
                target,
            } => Transition::Direct(target),
            NextModel::Branches(branches) => Transition::Conditional(
                branches
                    .into_iter()
                    .map(|b| ConditionalTarget {
                        condition: b.condition,
                        target: b.target,
                    })
                    .collect(),
            ),
        }
    }
}

/// Runtime node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Type string as authored, kept for diagnostics.
    pub raw_type: String,
    pub content: Value,
    pub metadata: Vars,
    pub next: Option<Transition>,
}

impl Node {
    pub fn new(
        id: &str,
        kind: NodeKind,
        content: Value,
    ) -> Self {
        Self {
            id: id.to_string(),
            kind,
            raw_type: kind.as_ref().to_string(),
            content,
            metadata: Vars::new(),
            next: None,
        }
    }

    pub fn with_next(
        mut self,
        next: Transition,
    ) -> Self {
        self.next = Some(next);
        self
    }

    pub fn with_metadata(
        mut self,
        metadata: Vars,
    ) -> Self {
        self.metadata = metadata;
        self
    }

    /// The node's primary text: the content itself when it is a string, otherwise `key` inside it.
    pub fn text(
        &self,
        key: &str,
    ) -> Option<&str> {
        match &self.content {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => obj.get(key).and_then(Value::as_str),
            _ => None,
        }
    }

    /// A named field from the content object, falling back to metadata.
    pub fn field(
        &self,
        key: &str,
    ) -> Option<&Value> {
        self.content.as_object().and_then(|obj| obj.get(key)).or_else(|| self.metadata.get_value(key))
    }

    pub fn field_str(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    /// The raw content rendered as text, used when an unknown node has nowhere to go.
    pub fn raw_text(&self) -> String {
        match &self.content {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl From<NodeModel> for Node {
    fn from(model: NodeModel) -> Self {
        Self {
            kind: NodeKind::normalize(&model.node_type),
            id: model.id,
            raw_type: model.node_type,
            content: model.content,
            metadata: model.metadata.into(),
            next: model.next.map(Transition::from),
        }
    }
}
