//! Compaction: shrink low-priority allocations until a target is met.
//!
//! Candidates are compressible allocations outside the preserve list,
//! lowest priority first. Each candidate is handed to a [`Summarizer`] and
//! awaited in turn; a failure on one node is recorded and the pass moves
//! on. Every pass appends exactly one [`CompactionEvent`] to the window
//! history, including passes that fall short of the target.

use crate::window::{Allocation, CompactionEvent, CompactionTrigger, ContextWindow};
use async_trait::async_trait;
use chrono::Utc;
use promptgraph_core::CompactionError;
use serde::{Deserialize, Serialize};

/// Default fraction of `used` removed per compacted node.
pub const DEFAULT_COMPRESSION_RATIO: f64 = 0.5;

// ── Summarizer ────────────────────────────────────────────────────────────

/// Shrinks the content behind one allocation.
///
/// Stands in for an external summarization service. Implementations
/// return the node's new `used` size.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn compact(&self, allocation: &Allocation) -> Result<usize, CompactionError>;
}

/// Removes a fixed fraction of each node's `used` tokens. No content is
/// actually rewritten.
#[derive(Debug, Clone)]
pub struct SimulatedSummarizer {
    ratio: f64,
}

impl SimulatedSummarizer {
    /// `ratio` is clamped to `[0, 1]`.
    pub fn new(ratio: f64) -> Self {
        Self {
            ratio: ratio.clamp(0.0, 1.0),
        }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }
}

impl Default for SimulatedSummarizer {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_RATIO)
    }
}

#[async_trait]
impl Summarizer for SimulatedSummarizer {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn compact(&self, allocation: &Allocation) -> Result<usize, CompactionError> {
        let saved = (allocation.used as f64 * self.ratio).floor() as usize;
        Ok(allocation.used - saved.min(allocation.used))
    }
}

// ── Result ────────────────────────────────────────────────────────────────

/// Outcome of one pass. Check `success` and `errors`; partial success is
/// a normal result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionResult {
    /// Whether `tokens_saved` reached the target.
    pub success: bool,
    pub tokens_saved: usize,
    pub compacted_nodes: Vec<String>,
    /// The window's allocations after the pass.
    pub updated_allocations: Vec<Allocation>,
    pub errors: Vec<String>,
}

// ── Engine ────────────────────────────────────────────────────────────────

/// Ids eligible for compaction, lowest priority first. Equal priorities
/// keep allocation order.
pub fn compaction_candidates(window: &ContextWindow) -> Vec<String> {
    let mut candidates: Vec<&Allocation> = window
        .allocations
        .iter()
        .filter(|a| a.compressible && !window.is_preserved(&a.node_id))
        .collect();
    candidates.sort_by_key(|a| a.priority);
    candidates.into_iter().map(|a| a.node_id.clone()).collect()
}

/// Compact `window` until `target_reduction` tokens are saved or the
/// candidates run out.
pub async fn compact_window(
    window: &mut ContextWindow,
    summarizer: &dyn Summarizer,
    target_reduction: usize,
    trigger: CompactionTrigger,
) -> CompactionResult {
    let tokens_before = window.used;
    let mut tokens_saved = 0usize;
    let mut compacted_nodes = Vec::new();
    let mut errors = Vec::new();

    for node_id in compaction_candidates(window) {
        if tokens_saved >= target_reduction {
            break;
        }
        let Some(allocation) = window.allocation_mut(&node_id) else {
            errors.push(CompactionError::UnknownNode(node_id).to_string());
            continue;
        };
        if allocation.used == 0 {
            continue;
        }

        match summarizer.compact(allocation).await {
            Ok(new_used) if new_used < allocation.used => {
                let saved = allocation.used - new_used;
                allocation.compression_ratio *= new_used as f64 / allocation.used as f64;
                allocation.used = new_used;
                tokens_saved += saved;
                tracing::debug!(
                    node_id = %node_id,
                    summarizer = summarizer.name(),
                    saved,
                    "Node compacted"
                );
                compacted_nodes.push(node_id);
            }
            Ok(_) => {
                tracing::debug!(node_id = %node_id, "Compaction produced no savings");
            }
            Err(e) => {
                tracing::warn!(node_id = %node_id, error = %e, "Node compaction failed");
                errors.push(e.to_string());
            }
        }
    }

    window.recompute();
    let success = tokens_saved >= target_reduction;

    window.compaction_history.push(CompactionEvent {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        trigger,
        target_reduction,
        tokens_before,
        tokens_after: window.used,
        tokens_saved,
        affected_node_ids: compacted_nodes.clone(),
    });

    if success {
        tracing::info!(
            trigger = %trigger,
            target = target_reduction,
            saved = tokens_saved,
            nodes = compacted_nodes.len(),
            "Compaction reached target"
        );
    } else {
        tracing::warn!(
            trigger = %trigger,
            target = target_reduction,
            saved = tokens_saved,
            nodes = compacted_nodes.len(),
            errors = errors.len(),
            "Compaction fell short of target"
        );
    }

    CompactionResult {
        success,
        tokens_saved,
        compacted_nodes,
        updated_allocations: window.allocations.clone(),
        errors,
    }
}
