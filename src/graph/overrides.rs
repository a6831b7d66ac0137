//! Per-tenant rewrites of prompt-like node fields, applied to copies at execution time.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::graph::{Node, NodeId, NodeKind};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OverrideField {
    /// The node's primary text (`text` for messages, `prompt` for inputs and AI nodes).
    Content,
    Prompt,
    SystemPrompt,
    Model,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OverrideMode {
    #[default]
    Replace,
    Prefix,
    Suffix,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TemplateOverride {
    /// Node to rewrite; every node when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    pub field: OverrideField,
    #[serde(default)]
    pub mode: OverrideMode,
    pub value: String,
}

impl TemplateOverride {
    pub fn new(
        node_id: Option<&str>,
        field: OverrideField,
        mode: OverrideMode,
        value: &str,
    ) -> Self {
        Self {
            node_id: node_id.map(str::to_string),
            field,
            mode,
            value: value.to_string(),
        }
    }

    fn applies_to(
        &self,
        node: &Node,
    ) -> bool {
        self.node_id.as_ref().is_none_or(|id| *id == node.id)
    }

    fn compose(
        &self,
        existing: Option<&str>,
    ) -> String {
        let existing = existing.unwrap_or_default();
        match self.mode {
            OverrideMode::Replace => self.value.clone(),
            OverrideMode::Prefix => format!("{}{}", self.value, existing),
            OverrideMode::Suffix => format!("{}{}", existing, self.value),
        }
    }
}

fn primary_key(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Input | NodeKind::Ai => "prompt",
        _ => "text",
    }
}

/// Prompt-like fields only exist on the kinds that send a prompt.
fn accepts(
    kind: NodeKind,
    field: OverrideField,
) -> bool {
    match field {
        OverrideField::Content => true,
        OverrideField::Prompt => matches!(kind, NodeKind::Input | NodeKind::Ai),
        OverrideField::SystemPrompt | OverrideField::Model => kind == NodeKind::Ai,
    }
}

/// Apply every matching override in order. Returns the node untouched when none match.
pub fn apply_overrides<'a>(
    node: &'a Node,
    overrides: &[TemplateOverride],
) -> Cow<'a, Node> {
    let mut matching = overrides.iter().filter(|o| o.applies_to(node) && accepts(node.kind, o.field)).peekable();
    if matching.peek().is_none() {
        return Cow::Borrowed(node);
    }

    let mut node = node.clone();
    for o in matching {
        let key = match o.field {
            OverrideField::Content => primary_key(node.kind),
            OverrideField::Prompt => "prompt",
            OverrideField::SystemPrompt => "system_prompt",
            OverrideField::Model => "model",
        };
        rewrite_field(&mut node, key, o);
    }
    Cow::Owned(node)
}

fn rewrite_field(
    node: &mut Node,
    key: &str,
    o: &TemplateOverride,
) {
    let primary = primary_key(node.kind);
    match &mut node.content {
        Value::String(text) if key == primary => {
            let composed = o.compose(Some(text.as_str()));
            *text = composed;
        }
        Value::Object(obj) => {
            let composed = o.compose(obj.get(key).and_then(Value::as_str));
            obj.insert(key.to_string(), Value::String(composed));
        }
        other => {
            let mut obj = Map::new();
            if let Value::String(text) = other {
                obj.insert(primary.to_string(), Value::String(std::mem::take(text)));
            }
            obj.insert(key.to_string(), Value::String(o.compose(None)));
            *other = Value::Object(obj);
        }
    }
}
