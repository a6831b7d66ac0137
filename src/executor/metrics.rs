use serde::{Deserialize, Serialize};

use crate::{ErrorKind, graph::NodeId};

/// Per-turn execution record returned with every response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnMetrics {
    pub tokens_used: u64,
    /// False when the figure came from an AI delegate.
    pub tokens_estimated: bool,
    pub hops: u32,
    /// Node ids executed this turn, in order.
    pub visited: Vec<NodeId>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

/// Deterministic token estimate: a quarter token per character of input and output,
/// rounded up, plus `hop_overhead` per internal hop.
pub fn estimate_tokens(
    input: &str,
    output: &str,
    hops: u32,
    hop_overhead: u64,
) -> u64 {
    let quarter = |s: &str| (s.chars().count() as u64).div_ceil(4);
    quarter(input) + quarter(output) + hop_overhead * u64::from(hops)
}
