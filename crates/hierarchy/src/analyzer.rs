//! Analysis pipeline: metrics → issues → recommendations → hotspots.
//!
//! Issues are structural findings over the whole collection, distinct from
//! the pairwise relationship problems in [`crate::conflicts`].

use crate::conflicts::Severity;
use crate::metrics::{self, HierarchyMetrics};
use crate::token;
use promptgraph_core::{Altitude, Edge, GraphView, Node};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Hotspot score contributions from structure alone.
const DEEP_NESTING_DEPTH: u32 = 4;
const DEEP_NESTING_BONUS: u32 = 15;
const HIGH_FANOUT_CHILDREN: usize = 8;
const HIGH_FANOUT_BONUS: u32 = 10;
const HIGH_TOKEN_COUNT: usize = 5000;
const HIGH_TOKEN_BONUS: u32 = 20;

/// Nodes scoring at or below this are not reported.
const HOTSPOT_REPORT_THRESHOLD: u32 = 20;
const HOTSPOT_MAX_SCORE: u32 = 100;

// ── Thresholds ────────────────────────────────────────────────────────────

/// Limits that turn metrics into issues and recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisThresholds {
    /// Depth above this is an issue.
    pub max_depth_warning: u32,
    /// Depth above this escalates the issue to high severity.
    pub max_depth_critical: u32,
    pub balance_threshold: f64,
    pub similarity_threshold: f64,
    pub redundancy_threshold: f64,
    pub max_fanout: usize,
    pub low_specificity: f64,
    /// Fraction of under-specified nodes above which an issue is raised.
    pub under_specified_ratio: f64,
}

impl Default for AnalysisThresholds {
    fn default() -> Self {
        Self {
            max_depth_warning: 5,
            max_depth_critical: 7,
            balance_threshold: 0.5,
            similarity_threshold: metrics::DEFAULT_SIMILARITY_THRESHOLD,
            redundancy_threshold: 0.3,
            max_fanout: 10,
            low_specificity: 0.3,
            under_specified_ratio: 0.3,
        }
    }
}

// ── Output types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    DepthExceeded,
    Imbalance,
    Orphans,
    OverAllocation,
    UnderSpecification,
}

impl IssueType {
    fn slug(self) -> &'static str {
        match self {
            Self::DepthExceeded => "depth-exceeded",
            Self::Imbalance => "imbalance",
            Self::Orphans => "orphans",
            Self::OverAllocation => "over-allocation",
            Self::UnderSpecification => "under-specification",
        }
    }

    /// Short reason shown on a hotspot for nodes named by this issue.
    fn reason(self) -> &'static str {
        match self {
            Self::DepthExceeded => "Exceeds maximum depth",
            Self::Imbalance => "Part of an unbalanced hierarchy",
            Self::Orphans => "Orphaned node",
            Self::OverAllocation => "Token usage exceeds budget",
            Self::UnderSpecification => "Under-specified content",
        }
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// A structural finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub node_ids: Vec<String>,
    pub description: String,
}

impl Issue {
    fn new(
        issue_type: IssueType,
        severity: Severity,
        node_ids: Vec<String>,
        description: String,
    ) -> Self {
        let id = match issue_type {
            IssueType::OverAllocation => format!("{}:{}", issue_type.slug(), node_ids.join(",")),
            _ => issue_type.slug().to_string(),
        };
        Self {
            id,
            issue_type,
            severity,
            node_ids,
            description,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    FlattenHierarchy,
    Rebalance,
    MergeRedundant,
    AddGroupingLayer,
    ConnectOrphans,
    TrimBudgets,
    IncreaseSpecificity,
}

impl RecommendationKind {
    /// Fixed ordering weight; higher sorts first.
    pub fn priority(self) -> u32 {
        match self {
            Self::FlattenHierarchy => 80,
            Self::TrimBudgets => 75,
            Self::MergeRedundant => 70,
            Self::Rebalance => 60,
            Self::AddGroupingLayer => 50,
            Self::ConnectOrphans => 40,
            Self::IncreaseSpecificity => 30,
        }
    }

    fn slug(self) -> &'static str {
        match self {
            Self::FlattenHierarchy => "flatten-hierarchy",
            Self::Rebalance => "rebalance",
            Self::MergeRedundant => "merge-redundant",
            Self::AddGroupingLayer => "add-grouping-layer",
            Self::ConnectOrphans => "connect-orphans",
            Self::TrimBudgets => "trim-budgets",
            Self::IncreaseSpecificity => "increase-specificity",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::FlattenHierarchy => "Flatten deep hierarchy",
            Self::Rebalance => "Rebalance hierarchy",
            Self::MergeRedundant => "Merge near-duplicate content",
            Self::AddGroupingLayer => "Add intermediate grouping layer",
            Self::ConnectOrphans => "Connect orphaned nodes",
            Self::TrimBudgets => "Trim over-budget nodes",
            Self::IncreaseSpecificity => "Increase specificity",
        }
    }
}

/// A suggested change, ordered by [`RecommendationKind::priority`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    pub kind: RecommendationKind,
    pub title: String,
    pub description: String,
    pub priority: u32,
    pub node_ids: Vec<String>,
}

impl Recommendation {
    fn new(kind: RecommendationKind, description: String, node_ids: Vec<String>) -> Self {
        Self {
            id: kind.slug().to_string(),
            kind,
            title: kind.title().to_string(),
            description,
            priority: kind.priority(),
            node_ids,
        }
    }
}

/// A node flagged as disproportionately problematic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub node_id: String,
    pub title: String,
    /// Capped at 100.
    pub score: u32,
    pub reasons: Vec<String>,
    pub suggested_actions: Vec<String>,
}

/// Everything the analyzer produces for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyAnalysis {
    pub metrics: HierarchyMetrics,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<Recommendation>,
    pub hotspots: Vec<Hotspot>,
}

// ── Analyzer ──────────────────────────────────────────────────────────────

/// Analyze with default thresholds.
pub fn analyze(nodes: &[Node], edges: &[Edge]) -> HierarchyAnalysis {
    HierarchyAnalyzer::default().analyze(nodes, edges)
}

#[derive(Debug, Clone, Default)]
pub struct HierarchyAnalyzer {
    thresholds: AnalysisThresholds,
}

impl HierarchyAnalyzer {
    pub fn new(thresholds: AnalysisThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AnalysisThresholds {
        &self.thresholds
    }

    pub fn analyze(&self, nodes: &[Node], edges: &[Edge]) -> HierarchyAnalysis {
        let distinct = GraphView::new(nodes).distinct();
        let nodes: &[Node] = &distinct;
        let metrics = metrics::calculate_metrics_with(nodes, edges, self.thresholds.similarity_threshold);
        let issues = self.find_issues(nodes, edges, &metrics);
        let recommendations = self.recommend(nodes, &metrics, &issues);
        let hotspots = find_hotspots(nodes, &issues);

        tracing::info!(
            nodes = metrics.total_nodes,
            issues = issues.len(),
            recommendations = recommendations.len(),
            hotspots = hotspots.len(),
            "Hierarchy analysis complete"
        );

        HierarchyAnalysis {
            metrics,
            issues,
            recommendations,
            hotspots,
        }
    }

    fn find_issues(&self, nodes: &[Node], edges: &[Edge], metrics: &HierarchyMetrics) -> Vec<Issue> {
        let t = &self.thresholds;
        let mut issues = Vec::new();

        if metrics.max_depth > t.max_depth_warning {
            let severity = if metrics.max_depth > t.max_depth_critical {
                Severity::High
            } else {
                Severity::Medium
            };
            let deep: Vec<String> = nodes
                .iter()
                .filter(|n| n.depth_or_default() > t.max_depth_warning)
                .map(|n| n.id.clone())
                .collect();
            issues.push(Issue::new(
                IssueType::DepthExceeded,
                severity,
                deep,
                format!(
                    "Hierarchy depth {} exceeds the recommended maximum of {}",
                    metrics.max_depth, t.max_depth_warning
                ),
            ));
        }

        if metrics.balance_factor < t.balance_threshold {
            issues.push(Issue::new(
                IssueType::Imbalance,
                Severity::Medium,
                Vec::new(),
                format!(
                    "Root subtrees are unbalanced (balance factor {:.2})",
                    metrics.balance_factor
                ),
            ));
        }

        let orphans: Vec<String> = metrics::orphaned_nodes(nodes, edges)
            .into_iter()
            .map(str::to_string)
            .collect();
        if !orphans.is_empty() {
            issues.push(Issue::new(
                IssueType::Orphans,
                Severity::Low,
                orphans.clone(),
                format!("{} node(s) have no relationships", orphans.len()),
            ));
        }

        for node in nodes {
            let (Some(used), Some(budget)) = (node.estimated_tokens, node.token_budget) else {
                continue;
            };
            if used > budget {
                issues.push(Issue::new(
                    IssueType::OverAllocation,
                    Severity::Medium,
                    vec![node.id.clone()],
                    format!(
                        "\"{}\" uses {} tokens against a budget of {}",
                        node.title, used, budget
                    ),
                ));
            }
        }

        let under_specified: Vec<String> = nodes
            .iter()
            .filter(|n| n.altitude != Some(Altitude::Meta))
            .filter(|n| n.specificity.is_some_and(|s| s < t.low_specificity))
            .map(|n| n.id.clone())
            .collect();
        if !nodes.is_empty()
            && under_specified.len() as f64 / nodes.len() as f64 > t.under_specified_ratio
        {
            issues.push(Issue::new(
                IssueType::UnderSpecification,
                Severity::Low,
                under_specified.clone(),
                format!(
                    "{} of {} nodes have specificity below {}",
                    under_specified.len(),
                    nodes.len(),
                    t.low_specificity
                ),
            ));
        }

        issues
    }

    fn recommend(
        &self,
        nodes: &[Node],
        metrics: &HierarchyMetrics,
        issues: &[Issue],
    ) -> Vec<Recommendation> {
        let t = &self.thresholds;
        let mut recommendations = Vec::new();

        let issue_nodes = |kind: IssueType| -> Vec<String> {
            let mut seen = HashSet::new();
            issues
                .iter()
                .filter(|i| i.issue_type == kind)
                .flat_map(|i| i.node_ids.iter().cloned())
                .filter(|id| seen.insert(id.clone()))
                .collect()
        };
        let raised = |kind: IssueType| issues.iter().any(|i| i.issue_type == kind);

        if raised(IssueType::DepthExceeded) {
            recommendations.push(Recommendation::new(
                RecommendationKind::FlattenHierarchy,
                format!(
                    "Collapse intermediate levels so no chain is deeper than {}",
                    t.max_depth_warning
                ),
                issue_nodes(IssueType::DepthExceeded),
            ));
        }

        if raised(IssueType::Imbalance) {
            recommendations.push(Recommendation::new(
                RecommendationKind::Rebalance,
                "Redistribute children so root subtrees have similar depth".to_string(),
                Vec::new(),
            ));
        }

        if metrics.redundancy_score > t.redundancy_threshold {
            let mut seen = HashSet::new();
            let pairs = metrics::redundant_pairs(nodes, t.similarity_threshold);
            let ids = pairs
                .iter()
                .flat_map(|(a, b)| [*a, *b])
                .filter(|id| seen.insert(*id))
                .map(str::to_string)
                .collect();
            recommendations.push(Recommendation::new(
                RecommendationKind::MergeRedundant,
                format!(
                    "{:.0}% of node pairs carry near-duplicate content; merge them",
                    metrics.redundancy_score * 100.0
                ),
                ids,
            ));
        }

        let wide: Vec<String> = nodes
            .iter()
            .filter(|n| n.child_ids.len() > t.max_fanout)
            .map(|n| n.id.clone())
            .collect();
        if !wide.is_empty() {
            recommendations.push(Recommendation::new(
                RecommendationKind::AddGroupingLayer,
                format!(
                    "Group children under intermediate nodes where fan-out exceeds {}",
                    t.max_fanout
                ),
                wide,
            ));
        }

        if raised(IssueType::Orphans) {
            recommendations.push(Recommendation::new(
                RecommendationKind::ConnectOrphans,
                "Link orphaned nodes to related fragments or remove them".to_string(),
                issue_nodes(IssueType::Orphans),
            ));
        }

        if raised(IssueType::OverAllocation) {
            recommendations.push(Recommendation::new(
                RecommendationKind::TrimBudgets,
                "Summarize or split nodes that exceed their token budget".to_string(),
                issue_nodes(IssueType::OverAllocation),
            ));
        }

        if raised(IssueType::UnderSpecification) {
            recommendations.push(Recommendation::new(
                RecommendationKind::IncreaseSpecificity,
                "Add concrete detail to vague non-meta nodes".to_string(),
                issue_nodes(IssueType::UnderSpecification),
            ));
        }

        recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
        recommendations
    }
}

// ── Hotspots ──────────────────────────────────────────────────────────────

fn suggested_action(reason: &str) -> Option<&'static str> {
    let reason = reason.to_lowercase();
    if reason.contains("depth") || reason.contains("nested") {
        Some("Move closer to the root or merge with its parent")
    } else if reason.contains("fan-out") {
        Some("Group children under an intermediate node")
    } else if reason.contains("token") {
        Some("Split or summarize the content")
    } else if reason.contains("orphan") {
        Some("Connect to related nodes or remove")
    } else if reason.contains("specified") {
        Some("Add concrete, actionable detail")
    } else {
        None
    }
}

fn find_hotspots(nodes: &[Node], issues: &[Issue]) -> Vec<Hotspot> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut hotspots = Vec::new();

    for node in nodes {
        if !seen.insert(node.id.as_str()) {
            continue;
        }

        let mut score = 0;
        let mut reasons = Vec::new();

        for issue in issues.iter().filter(|i| i.node_ids.contains(&node.id)) {
            score += issue.severity.weight();
            reasons.push(issue.issue_type.reason().to_string());
        }

        let depth = node.depth_or_default();
        if depth > DEEP_NESTING_DEPTH {
            score += DEEP_NESTING_BONUS;
            reasons.push(format!("Deeply nested (depth {depth})"));
        }
        if node.child_ids.len() > HIGH_FANOUT_CHILDREN {
            score += HIGH_FANOUT_BONUS;
            reasons.push(format!("High fan-out ({} children)", node.child_ids.len()));
        }
        let tokens = token::node_actual_tokens(node);
        if tokens > HIGH_TOKEN_COUNT {
            score += HIGH_TOKEN_BONUS;
            reasons.push(format!("High token count ({tokens} tokens)"));
        }

        if score <= HOTSPOT_REPORT_THRESHOLD {
            continue;
        }

        let mut suggested_actions: Vec<String> = Vec::new();
        for action in reasons.iter().filter_map(|r| suggested_action(r)) {
            if !suggested_actions.iter().any(|a| a == action) {
                suggested_actions.push(action.to_string());
            }
        }

        hotspots.push(Hotspot {
            node_id: node.id.clone(),
            title: node.title.clone(),
            score: score.min(HOTSPOT_MAX_SCORE),
            reasons,
            suggested_actions,
        });
    }

    hotspots.sort_by(|a, b| b.score.cmp(&a.score));
    hotspots
}
