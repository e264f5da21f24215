//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token, rounded up.
//! This is not a tokenizer. It is deterministic and language-agnostic but
//! can be off by a wide margin for code, CJK text, or dense punctuation;
//! treat every figure derived from it as an approximation.

use promptgraph_core::Node;

/// Fixed per-node overhead for id, category and hierarchy metadata.
pub const NODE_METADATA_OVERHEAD: usize = 10;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up. Counts Unicode scalar
/// values, not bytes.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.chars().count().div_ceil(4)
}

/// Estimate tokens for a node's full representation: title, content and
/// a fixed metadata overhead.
pub fn estimate_node_tokens(node: &Node) -> usize {
    estimate_tokens(&node.title) + estimate_tokens(&node.content) + NODE_METADATA_OVERHEAD
}

/// Estimate tokens for a slice of nodes.
pub fn estimate_total_tokens(nodes: &[Node]) -> usize {
    nodes.iter().map(estimate_node_tokens).sum()
}

/// The node's declared size if present, otherwise the heuristic estimate.
pub fn node_actual_tokens(node: &Node) -> usize {
    node.estimated_tokens
        .unwrap_or_else(|| estimate_node_tokens(node))
}
