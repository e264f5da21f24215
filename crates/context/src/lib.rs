//! # promptgraph context
//!
//! Token budgeting for a prompt graph: the context window, the three-pass
//! budget allocator and the compaction engine that frees budget by
//! shrinking low-priority nodes.

pub mod allocator;
pub mod compaction;
pub mod manager;
pub mod window;

pub use allocator::{allocate_budget, merge_allocations, BudgetAllocator, BudgetSettings};
pub use compaction::{
    compact_window, compaction_candidates, CompactionResult, SimulatedSummarizer, Summarizer,
};
pub use manager::ContextManager;
pub use window::{
    Allocation, CompactionEvent, CompactionTrigger, ContextWindow, WindowSettings, WindowSummary,
    DEFAULT_TOTAL_BUDGET,
};
