//! Error types for the promptgraph domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Analysis itself never fails: malformed hierarchy data is reported as
//! conflicts or issues. Errors exist only at the edges (serialization), for
//! usage updates naming a node the window does not hold, and for per-node
//! compaction failures.

use thiserror::Error;

/// The top-level error type for all promptgraph operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Window errors ---
    #[error("No allocation in the context window for node: {0}")]
    UnknownAllocation(String),

    // --- Compaction errors ---
    #[error("Compaction error: {0}")]
    Compaction(#[from] CompactionError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A failure while compacting a single node.
///
/// These never abort a compaction pass; the engine records them next to
/// the partial result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompactionError {
    #[error("No allocation for node: {0}")]
    UnknownNode(String),

    #[error("Summarization failed for {node_id}: {reason}")]
    SummarizerFailed { node_id: String, reason: String },
}
