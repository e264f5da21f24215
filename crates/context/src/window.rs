//! The context window: a finite token budget and its per-node allocations.
//!
//! The window is ephemeral. It is rebuilt from the graph on demand and
//! owned by a single caller; exporting it to JSON is the only form of
//! persistence it offers.

use chrono::{DateTime, Utc};
use promptgraph_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default token budget for a window.
pub const DEFAULT_TOTAL_BUDGET: usize = 200_000;

// ── Settings ──────────────────────────────────────────────────────────────

/// Window-level settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSettings {
    pub total_budget: usize,
    pub compaction_enabled: bool,
    /// Utilization above which compaction is recommended.
    pub compaction_threshold: f64,
    /// Fraction of `used` removed from each compacted node.
    pub compression_ratio: f64,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            total_budget: DEFAULT_TOTAL_BUDGET,
            compaction_enabled: true,
            compaction_threshold: 0.8,
            compression_ratio: 0.5,
        }
    }
}

// ── Types ─────────────────────────────────────────────────────────────────

/// Budget assigned to a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub node_id: String,
    pub allocated: usize,
    pub used: usize,
    /// Per-altitude importance, 20 to 100. Compaction starts from the lowest.
    pub priority: u32,
    pub compressible: bool,
    /// Current size relative to the size before any compaction.
    pub compression_ratio: f64,
}

impl Allocation {
    pub fn new(node_id: impl Into<String>, allocated: usize, priority: u32, compressible: bool) -> Self {
        Self {
            node_id: node_id.into(),
            allocated,
            used: 0,
            priority,
            compressible,
            compression_ratio: 1.0,
        }
    }

    pub fn with_used(mut self, used: usize) -> Self {
        self.used = used;
        self
    }
}

/// Why a compaction pass ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionTrigger {
    /// Requested explicitly by the caller.
    Manual,
    /// Requested after utilization crossed the threshold.
    Threshold,
}

impl std::fmt::Display for CompactionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Threshold => write!(f, "threshold"),
        }
    }
}

/// One entry in the append-only compaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub trigger: CompactionTrigger,
    pub target_reduction: usize,
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub tokens_saved: usize,
    pub affected_node_ids: Vec<String>,
}

/// Totals for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSummary {
    pub total_budget: usize,
    pub used: usize,
    pub remaining: usize,
    pub utilization: f64,
    pub allocations: usize,
    pub compressible: usize,
    pub preserved: usize,
    pub compactions: usize,
    pub tokens_saved: usize,
    pub should_compact: bool,
}

/// A token budget and its allocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextWindow {
    pub total_budget: usize,
    /// Sum of `allocation.used`.
    pub used: usize,
    /// `total_budget - used`, floored at zero.
    pub remaining: usize,
    pub allocations: Vec<Allocation>,
    pub compaction_enabled: bool,
    pub compaction_threshold: f64,
    /// Nodes compaction must never touch.
    pub preserve_node_ids: BTreeSet<String>,
    pub compaction_history: Vec<CompactionEvent>,
}

// ── Implementation ────────────────────────────────────────────────────────

impl ContextWindow {
    /// An empty window with the full budget remaining.
    pub fn new(settings: &WindowSettings) -> Self {
        Self {
            total_budget: settings.total_budget,
            used: 0,
            remaining: settings.total_budget,
            allocations: Vec::new(),
            compaction_enabled: settings.compaction_enabled,
            compaction_threshold: settings.compaction_threshold,
            preserve_node_ids: BTreeSet::new(),
            compaction_history: Vec::new(),
        }
    }

    /// Replace all allocations and recompute totals.
    pub fn set_allocations(&mut self, allocations: Vec<Allocation>) {
        self.allocations = allocations;
        self.recompute();
    }

    /// Recompute `used` and `remaining` from the allocations.
    pub fn recompute(&mut self) {
        self.used = self.allocations.iter().map(|a| a.used).sum();
        self.remaining = self.total_budget.saturating_sub(self.used);
    }

    pub fn allocation(&self, node_id: &str) -> Option<&Allocation> {
        self.allocations.iter().find(|a| a.node_id == node_id)
    }

    pub fn allocation_mut(&mut self, node_id: &str) -> Option<&mut Allocation> {
        self.allocations.iter_mut().find(|a| a.node_id == node_id)
    }

    pub fn is_preserved(&self, node_id: &str) -> bool {
        self.preserve_node_ids.contains(node_id)
    }

    /// Fraction of the budget in use. A zero budget reads as full once
    /// anything is used.
    pub fn utilization(&self) -> f64 {
        if self.total_budget == 0 {
            return if self.used > 0 { 1.0 } else { 0.0 };
        }
        self.used as f64 / self.total_budget as f64
    }

    /// Advisory only: nothing compacts automatically.
    pub fn should_compact(&self) -> bool {
        if !self.compaction_enabled {
            return false;
        }
        if self.total_budget == 0 {
            return self.used > 0;
        }
        self.utilization() > self.compaction_threshold
    }

    pub fn summary(&self) -> WindowSummary {
        WindowSummary {
            total_budget: self.total_budget,
            used: self.used,
            remaining: self.remaining,
            utilization: self.utilization(),
            allocations: self.allocations.len(),
            compressible: self.allocations.iter().filter(|a| a.compressible).count(),
            preserved: self.preserve_node_ids.len(),
            compactions: self.compaction_history.len(),
            tokens_saved: self.compaction_history.iter().map(|e| e.tokens_saved).sum(),
            should_compact: self.should_compact(),
        }
    }

    /// Serialize to pretty JSON.
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restore a window written by [`ContextWindow::export_json`].
    /// Totals are recomputed rather than trusted.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut window: Self = serde_json::from_str(json)?;
        window.recompute();
        Ok(window)
    }
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new(&WindowSettings::default())
    }
}
