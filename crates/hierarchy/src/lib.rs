//! # promptgraph hierarchy
//!
//! Structural analysis of a prompt graph: token estimates, metrics,
//! hierarchy conflict detection and the issue / recommendation / hotspot
//! synthesis built on top of them.
//!
//! Every entry point takes the node and edge slices as plain arguments and
//! returns new data. Nothing here mutates the graph or does I/O.

pub mod analyzer;
pub mod conflicts;
pub mod metrics;
pub mod token;

pub use analyzer::{
    analyze, AnalysisThresholds, HierarchyAnalysis, HierarchyAnalyzer, Hotspot, Issue, IssueType,
    Recommendation, RecommendationKind,
};
pub use conflicts::{
    detect_conflicts, detect_hierarchy_conflicts, detect_relationship_conflicts, Conflict,
    ConflictType, Severity,
};
pub use metrics::{calculate_metrics, calculate_metrics_with, FanoutStats, HierarchyMetrics, ValueRange};
pub use token::{estimate_node_tokens, estimate_tokens, estimate_total_tokens};
