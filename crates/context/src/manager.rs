//! Context manager: one window, its allocator and its summarizer.

use crate::allocator::{BudgetAllocator, BudgetSettings};
use crate::compaction::{compact_window, CompactionResult, SimulatedSummarizer, Summarizer};
use crate::window::{Allocation, CompactionTrigger, ContextWindow, WindowSettings};
use promptgraph_core::{Error, Node, Result};
use std::sync::Arc;

/// Owns a [`ContextWindow`] and keeps it consistent across allocation,
/// usage updates and compaction.
pub struct ContextManager {
    window: ContextWindow,
    allocator: BudgetAllocator,
    summarizer: Arc<dyn Summarizer>,
}

impl ContextManager {
    pub fn new(window: WindowSettings, budget: BudgetSettings) -> Self {
        let summarizer = Arc::new(SimulatedSummarizer::new(window.compression_ratio));
        Self {
            window: ContextWindow::new(&window),
            allocator: BudgetAllocator::new(budget),
            summarizer,
        }
    }

    /// Resume from an exported window. The window carries its own budget
    /// and threshold; `compression_ratio` configures the default summarizer.
    pub fn from_window(window: ContextWindow, compression_ratio: f64, budget: BudgetSettings) -> Self {
        Self {
            window,
            allocator: BudgetAllocator::new(budget),
            summarizer: Arc::new(SimulatedSummarizer::new(compression_ratio)),
        }
    }

    /// Replace the summarizer used by compaction.
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn window(&self) -> &ContextWindow {
        &self.window
    }

    /// Reallocate the whole budget for `nodes`. Nodes hinted `preserve` join
    /// the preserve list; existing entries on it are kept.
    pub fn allocate(&mut self, nodes: &[Node]) -> &[Allocation] {
        let allocations = self.allocator.allocate(nodes, self.window.total_budget);
        self.window.preserve_node_ids.extend(
            nodes
                .iter()
                .filter(|node| node.is_preserved())
                .map(|node| node.id.clone()),
        );
        self.window.set_allocations(allocations);

        tracing::info!(
            allocations = self.window.allocations.len(),
            used = self.window.used,
            remaining = self.window.remaining,
            "Context window allocated"
        );
        if self.window.should_compact() {
            tracing::warn!(
                utilization = self.window.utilization(),
                threshold = self.window.compaction_threshold,
                "Context window above compaction threshold"
            );
        }

        &self.window.allocations
    }

    /// Record the measured size of a node.
    pub fn record_usage(&mut self, node_id: &str, used: usize) -> Result<()> {
        let allocation = self
            .window
            .allocation_mut(node_id)
            .ok_or_else(|| Error::UnknownAllocation(node_id.to_string()))?;
        allocation.used = used;
        self.window.recompute();
        Ok(())
    }

    /// Protect a node from compaction.
    pub fn preserve(&mut self, node_id: impl Into<String>) {
        self.window.preserve_node_ids.insert(node_id.into());
    }

    pub fn should_compact(&self) -> bool {
        self.window.should_compact()
    }

    pub async fn compact(&mut self, target_reduction: usize) -> CompactionResult {
        self.compact_with_trigger(target_reduction, CompactionTrigger::Manual)
            .await
    }

    pub async fn compact_with_trigger(
        &mut self,
        target_reduction: usize,
        trigger: CompactionTrigger,
    ) -> CompactionResult {
        compact_window(
            &mut self.window,
            self.summarizer.as_ref(),
            target_reduction,
            trigger,
        )
        .await
    }

    pub fn export_json(&self) -> Result<String> {
        self.window.export_json()
    }
}
