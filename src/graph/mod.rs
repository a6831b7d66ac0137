//! Runtime flow graph: nodes, transitions, conditions, templates and overrides.

mod condition;
#[allow(clippy::module_inception)]
mod graph;
mod node;
mod overrides;
pub mod template;

pub use condition::{Condition, INPUT_VARIABLE, Operator, value_to_text};
pub use graph::{FlowGraph, GraphReport};
pub use node::{ConditionalTarget, Node, NodeId, NodeKind, Transition};
pub use overrides::{OverrideField, OverrideMode, TemplateOverride, apply_overrides};
pub use template::Scope;
