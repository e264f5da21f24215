//! Structural statistics over a node/edge collection.
//!
//! Everything here is a pure function of its inputs. Results do not
//! depend on input ordering, and degenerate inputs (empty sets, missing
//! fields, dangling references, parent cycles) produce defined values
//! rather than errors.

use crate::token;
use promptgraph_core::{Altitude, Edge, GraphView, Node, Scope};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Word-set Jaccard similarity above which two nodes count as redundant.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

// ── Types ─────────────────────────────────────────────────────────────────

/// Min / max / mean of a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl ValueRange {
    /// Used when no node carries a value: unknown is treated as neutral.
    pub const NEUTRAL: ValueRange = ValueRange {
        min: 0.0,
        max: 1.0,
        avg: 0.5,
    };

    fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::NEUTRAL;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        Self { min, max, avg }
    }
}

/// Child-count statistics over nodes that have at least one child.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FanoutStats {
    pub min: usize,
    pub max: usize,
    pub avg: f64,
}

/// A snapshot of structural metrics. Recomputed on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyMetrics {
    // Structure
    pub total_nodes: usize,
    pub total_edges: usize,
    pub max_depth: u32,
    pub avg_depth: f64,
    pub leaf_nodes: usize,
    pub root_nodes: usize,
    /// Shortest root subtree over tallest, 1.0 when trivially balanced.
    pub balance_factor: f64,
    pub fanout: FanoutStats,

    // Distributions (every enum value present, zero if unused)
    pub altitude_distribution: BTreeMap<Altitude, usize>,
    pub scope_distribution: BTreeMap<Scope, usize>,
    pub specificity_range: ValueRange,
    pub flexibility_range: ValueRange,

    // Tokens
    pub total_tokens: usize,
    pub avg_tokens_per_node: f64,
    /// Actual over allocated tokens among nodes declaring a budget.
    pub budget_utilization: f64,

    // Complexity
    pub cyclomatic_complexity: i64,
    pub coupling_score: f64,
    pub cohesion_score: f64,

    // Quality
    pub orphaned_nodes: usize,
    /// Fraction of node pairs whose content is near-duplicate.
    pub redundancy_score: f64,
    pub template_usage: f64,
}

// ── Calculation ───────────────────────────────────────────────────────────

/// Compute metrics with the default similarity threshold.
pub fn calculate_metrics(nodes: &[Node], edges: &[Edge]) -> HierarchyMetrics {
    calculate_metrics_with(nodes, edges, DEFAULT_SIMILARITY_THRESHOLD)
}

/// Compute metrics, counting node pairs above `similarity_threshold` as
/// redundant.
pub fn calculate_metrics_with(
    nodes: &[Node],
    edges: &[Edge],
    similarity_threshold: f64,
) -> HierarchyMetrics {
    let distinct = GraphView::new(nodes).distinct();
    let nodes: &[Node] = &distinct;
    let view = GraphView::new(nodes);
    let n = nodes.len();

    let max_depth = nodes.iter().map(Node::depth_or_default).max().unwrap_or(0);
    let avg_depth = mean(nodes.iter().map(|node| node.depth_or_default() as f64), n);

    let leaf_nodes = nodes.iter().filter(|node| node.is_leaf()).count();
    let root_nodes = nodes.iter().filter(|node| node.is_root()).count();

    let specificity: Vec<f64> = nodes
        .iter()
        .filter_map(|node| node.specificity)
        .filter(|v| *v > 0.0)
        .collect();
    let flexibility: Vec<f64> = nodes
        .iter()
        .filter_map(|node| node.flexibility)
        .filter(|v| *v > 0.0)
        .collect();

    let total_tokens = token::estimate_total_tokens(nodes);
    let avg_tokens_per_node = if n == 0 {
        0.0
    } else {
        total_tokens as f64 / n as f64
    };

    let metrics = HierarchyMetrics {
        total_nodes: n,
        total_edges: edges.len(),
        max_depth,
        avg_depth,
        leaf_nodes,
        root_nodes,
        balance_factor: balance_factor(&view, max_depth),
        fanout: fanout_stats(nodes),
        altitude_distribution: altitude_distribution(nodes),
        scope_distribution: scope_distribution(nodes),
        specificity_range: ValueRange::from_values(&specificity),
        flexibility_range: ValueRange::from_values(&flexibility),
        total_tokens,
        avg_tokens_per_node,
        budget_utilization: budget_utilization(nodes),
        cyclomatic_complexity: edges.len() as i64 - n as i64
            + 2 * connected_components(&view, edges) as i64,
        coupling_score: coupling_score(n, edges.len()),
        cohesion_score: cohesion_score(nodes),
        orphaned_nodes: orphaned_nodes(nodes, edges).len(),
        redundancy_score: redundancy_score(nodes, similarity_threshold),
        template_usage: if n == 0 {
            0.0
        } else {
            nodes.iter().filter(|node| node.is_template).count() as f64 / n as f64
        },
    };

    tracing::debug!(
        nodes = metrics.total_nodes,
        edges = metrics.total_edges,
        max_depth = metrics.max_depth,
        balance = metrics.balance_factor,
        orphans = metrics.orphaned_nodes,
        "Hierarchy metrics computed"
    );

    metrics
}

fn mean(values: impl Iterator<Item = f64>, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    values.sum::<f64>() / count as f64
}

/// Longest child chain below `id`, following children derived from
/// `parent_id`. A child already on the current path contributes 0 instead
/// of being walked again, so parent cycles cannot recurse forever.
fn subtree_depth<'a>(view: &GraphView<'a>, id: &'a str, on_path: &mut HashSet<&'a str>) -> u32 {
    if !on_path.insert(id) {
        return 0;
    }

    let mut deepest = 0;
    for &child in view.children_of(id) {
        let depth = if on_path.contains(child) {
            0
        } else {
            1 + subtree_depth(view, child, on_path)
        };
        deepest = deepest.max(depth);
    }

    on_path.remove(id);
    deepest
}

fn balance_factor(view: &GraphView<'_>, max_depth: u32) -> f64 {
    if max_depth == 0 {
        return 1.0;
    }

    let mut on_path = HashSet::new();
    let root_depths: Vec<u32> = view
        .roots()
        .map(|root| subtree_depth(view, root.id.as_str(), &mut on_path))
        .collect();

    let (Some(&min), Some(&max)) = (root_depths.iter().min(), root_depths.iter().max()) else {
        return 1.0;
    };
    if max == 0 {
        return 1.0;
    }
    min as f64 / max as f64
}

fn fanout_stats(nodes: &[Node]) -> FanoutStats {
    let counts: Vec<usize> = nodes
        .iter()
        .map(|node| node.child_ids.len())
        .filter(|c| *c > 0)
        .collect();

    if counts.is_empty() {
        return FanoutStats::default();
    }

    FanoutStats {
        min: counts.iter().copied().min().unwrap_or(0),
        max: counts.iter().copied().max().unwrap_or(0),
        avg: counts.iter().sum::<usize>() as f64 / counts.len() as f64,
    }
}

fn altitude_distribution(nodes: &[Node]) -> BTreeMap<Altitude, usize> {
    let mut dist: BTreeMap<Altitude, usize> = Altitude::ALL.iter().map(|a| (*a, 0)).collect();
    for altitude in nodes.iter().filter_map(|node| node.altitude) {
        *dist.entry(altitude).or_insert(0) += 1;
    }
    dist
}

fn scope_distribution(nodes: &[Node]) -> BTreeMap<Scope, usize> {
    let mut dist: BTreeMap<Scope, usize> = Scope::ALL.iter().map(|s| (*s, 0)).collect();
    for scope in nodes.iter().filter_map(|node| node.scope) {
        *dist.entry(scope).or_insert(0) += 1;
    }
    dist
}

fn budget_utilization(nodes: &[Node]) -> f64 {
    let (actual, allocated) = nodes
        .iter()
        .filter_map(|node| node.token_budget.map(|budget| (node, budget)))
        .fold((0usize, 0usize), |(actual, allocated), (node, budget)| {
            (actual + token::node_actual_tokens(node), allocated + budget)
        });

    if allocated == 0 {
        0.0
    } else {
        actual as f64 / allocated as f64
    }
}

/// Connected components over known nodes, treating edges as undirected.
/// Edges with a dangling endpoint do not connect anything.
fn connected_components(view: &GraphView<'_>, edges: &[Edge]) -> usize {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        if view.contains(&edge.source) && view.contains(&edge.target) {
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
            adjacency
                .entry(edge.target.as_str())
                .or_default()
                .push(edge.source.as_str());
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut components = 0;

    for node in view.unique_nodes() {
        let start = node.id.as_str();
        if !visited.insert(start) {
            continue;
        }
        components += 1;

        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for &next in adjacency.get(current).map(Vec::as_slice).unwrap_or(&[]) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }

    components
}

fn coupling_score(node_count: usize, edge_count: usize) -> f64 {
    if node_count <= 1 {
        return 0.0;
    }
    let max_edges = node_count * (node_count - 1) / 2;
    edge_count as f64 / max_edges as f64
}

fn cohesion_score(nodes: &[Node]) -> f64 {
    if nodes.is_empty() {
        return 0.0;
    }
    let n = nodes.len() as f64;
    let categories: HashSet<_> = nodes.iter().map(|node| node.category).collect();
    let scopes: HashSet<_> = nodes.iter().map(|node| node.scope).collect();

    ((1.0 - categories.len() as f64 / n) + (1.0 - scopes.len() as f64 / n)) / 2.0
}

/// Ids of nodes touched by no edge. Empty when there is at most one node.
pub fn orphaned_nodes<'a>(nodes: &'a [Node], edges: &[Edge]) -> Vec<&'a str> {
    if nodes.len() <= 1 {
        return Vec::new();
    }

    let touched: HashSet<&str> = edges
        .iter()
        .flat_map(|edge| [edge.source.as_str(), edge.target.as_str()])
        .collect();

    nodes
        .iter()
        .map(|node| node.id.as_str())
        .filter(|id| !touched.contains(id))
        .collect()
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Jaccard similarity of the lower-cased word sets of two texts.
pub fn content_similarity(a: &str, b: &str) -> f64 {
    jaccard(&word_set(a), &word_set(b))
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Unordered node pairs whose content similarity exceeds `threshold`.
pub fn redundant_pairs(nodes: &[Node], threshold: f64) -> Vec<(&str, &str)> {
    let sets: Vec<HashSet<String>> = nodes.iter().map(|node| word_set(&node.content)).collect();
    let mut pairs = Vec::new();

    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len() {
            if jaccard(&sets[i], &sets[j]) > threshold {
                pairs.push((nodes[i].id.as_str(), nodes[j].id.as_str()));
            }
        }
    }

    pairs
}

fn redundancy_score(nodes: &[Node], threshold: f64) -> f64 {
    let n = nodes.len();
    if n < 2 {
        return 0.0;
    }
    let total_pairs = n * (n - 1) / 2;
    redundant_pairs(nodes, threshold).len() as f64 / total_pairs as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptgraph_core::{NodeCategory, RelationshipType};

    fn edge(a: &str, b: &str) -> Edge {
        Edge::new(a, b, RelationshipType::DependsOn)
    }

    /// Three roots, each with two leaf children.
    fn balanced_forest() -> (Vec<Node>, Vec<Edge>) {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for r in 0..3 {
            let root = format!("r{r}");
            let kids = [format!("r{r}c0"), format!("r{r}c1")];
            nodes.push(
                Node::new(root.clone(), format!("Root {r}"), "root text")
                    .with_depth(0)
                    .with_children(kids.clone()),
            );
            for kid in &kids {
                nodes.push(
                    Node::new(kid.clone(), kid.clone(), format!("leaf {kid}"))
                        .with_parent(root.clone())
                        .with_depth(1),
                );
                edges.push(edge(&root, kid));
            }
        }
        (nodes, edges)
    }

    #[test]
    fn empty_input_gives_defaults() {
        let m = calculate_metrics(&[], &[]);
        assert_eq!(m.total_nodes, 0);
        assert_eq!(m.max_depth, 0);
        assert_eq!(m.avg_depth, 0.0);
        assert_eq!(m.balance_factor, 1.0);
        assert_eq!(m.fanout, FanoutStats::default());
        assert_eq!(m.specificity_range, ValueRange::NEUTRAL);
        assert_eq!(m.avg_tokens_per_node, 0.0);
        assert_eq!(m.cyclomatic_complexity, 0);
        assert_eq!(m.coupling_score, 0.0);
        assert_eq!(m.cohesion_score, 0.0);
        assert_eq!(m.orphaned_nodes, 0);
        assert_eq!(m.redundancy_score, 0.0);
        assert_eq!(m.template_usage, 0.0);
        assert!(m.altitude_distribution.values().all(|c| *c == 0));
        assert_eq!(m.altitude_distribution.len(), 5);
        assert_eq!(m.scope_distribution.len(), 5);
    }

    #[test]
    fn balanced_forest_metrics() {
        let (nodes, edges) = balanced_forest();
        let m = calculate_metrics(&nodes, &edges);
        assert_eq!(m.total_nodes, 9);
        assert_eq!(m.root_nodes, 3);
        assert_eq!(m.leaf_nodes, 6);
        assert_eq!(m.max_depth, 1);
        assert_eq!(m.balance_factor, 1.0);
        assert_eq!(m.orphaned_nodes, 0);
        assert_eq!(m.fanout, FanoutStats { min: 2, max: 2, avg: 2.0 });
        // 6 edges - 9 nodes + 2 * 3 components
        assert_eq!(m.cyclomatic_complexity, 3);
    }

    #[test]
    fn unbalanced_roots() {
        let nodes = vec![
            Node::new("a", "A", "").with_depth(0),
            Node::new("a1", "A1", "").with_parent("a").with_depth(1),
            Node::new("a2", "A2", "").with_parent("a1").with_depth(2),
            Node::new("a3", "A3", "").with_parent("a2").with_depth(3),
            Node::new("a4", "A4", "").with_parent("a3").with_depth(4),
            Node::new("b", "B", "").with_depth(0),
            Node::new("b1", "B1", "").with_parent("b").with_depth(1),
        ];
        let m = calculate_metrics(&nodes, &[]);
        assert_eq!(m.max_depth, 4);
        assert!((m.balance_factor - 0.25).abs() < 1e-9);
    }

    #[test]
    fn parent_cycle_does_not_hang() {
        let nodes = vec![
            Node::new("root", "R", "").with_depth(0),
            Node::new("x", "X", "").with_parent("y").with_depth(1),
            Node::new("y", "Y", "").with_parent("x").with_depth(2),
        ];
        let m = calculate_metrics(&nodes, &[]);
        assert_eq!(m.root_nodes, 1);
        assert_eq!(m.balance_factor, 1.0);
    }

    #[test]
    fn distributions_are_zero_initialised() {
        let nodes = vec![
            Node::new("a", "A", "").with_altitude(Altitude::Meta).with_scope(Scope::Global),
            Node::new("b", "B", "").with_altitude(Altitude::Meta),
            Node::new("c", "C", ""),
        ];
        let m = calculate_metrics(&nodes, &[]);
        assert_eq!(m.altitude_distribution[&Altitude::Meta], 2);
        assert_eq!(m.altitude_distribution[&Altitude::Implementation], 0);
        assert_eq!(m.scope_distribution[&Scope::Global], 1);
        assert_eq!(m.scope_distribution[&Scope::Conditional], 0);
    }

    #[test]
    fn ranges_ignore_missing_and_zero_values() {
        let nodes = vec![
            Node::new("a", "A", "").with_specificity(0.2),
            Node::new("b", "B", "").with_specificity(0.8),
            Node::new("c", "C", "").with_specificity(0.0),
            Node::new("d", "D", ""),
        ];
        let m = calculate_metrics(&nodes, &[]);
        assert_eq!(m.specificity_range.min, 0.2);
        assert_eq!(m.specificity_range.max, 0.8);
        assert!((m.specificity_range.avg - 0.5).abs() < 1e-9);
        assert_eq!(m.flexibility_range, ValueRange::NEUTRAL);
    }

    #[test]
    fn budget_utilization_over_declared_budgets() {
        let nodes = vec![
            Node::new("a", "A", "").with_token_budget(100).with_estimated_tokens(50),
            Node::new("b", "B", "").with_token_budget(100).with_estimated_tokens(150),
            Node::new("c", "C", "").with_estimated_tokens(10_000),
        ];
        let m = calculate_metrics(&nodes, &[]);
        assert!((m.budget_utilization - 1.0).abs() < 1e-9);
    }

    #[test]
    fn coupling_and_orphans() {
        let nodes = vec![
            Node::new("a", "A", ""),
            Node::new("b", "B", ""),
            Node::new("c", "C", ""),
            Node::new("d", "D", ""),
        ];
        let edges = vec![edge("a", "b")];
        let m = calculate_metrics(&nodes, &edges);
        assert!((m.coupling_score - 1.0 / 6.0).abs() < 1e-9);
        assert_eq!(m.orphaned_nodes, 2);
        // 1 edge - 4 nodes + 2 * 3 components
        assert_eq!(m.cyclomatic_complexity, 3);
    }

    #[test]
    fn single_node_is_never_orphaned() {
        let nodes = vec![Node::new("solo", "Solo", "")];
        assert_eq!(calculate_metrics(&nodes, &[]).orphaned_nodes, 0);
    }

    #[test]
    fn cohesion_rewards_homogeneous_sets() {
        let same: Vec<Node> = (0..4)
            .map(|i| {
                Node::new(format!("n{i}"), "T", "")
                    .with_category(NodeCategory::Constraint)
                    .with_scope(Scope::Task)
            })
            .collect();
        let mixed = vec![
            Node::new("a", "A", "").with_category(NodeCategory::Role).with_scope(Scope::Global),
            Node::new("b", "B", "").with_category(NodeCategory::Example).with_scope(Scope::Local),
        ];
        let high = calculate_metrics(&same, &[]).cohesion_score;
        let low = calculate_metrics(&mixed, &[]).cohesion_score;
        assert!((high - 0.75).abs() < 1e-9);
        assert_eq!(low, 0.0);
    }

    #[test]
    fn redundancy_counts_near_duplicates() {
        let nodes = vec![
            Node::new("a", "A", "Always answer in formal English"),
            Node::new("b", "B", "always answer in formal english"),
            Node::new("c", "C", "Cite sources for every claim"),
        ];
        let m = calculate_metrics(&nodes, &[]);
        assert!((m.redundancy_score - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(redundant_pairs(&nodes, 0.7), vec![("a", "b")]);
    }

    #[test]
    fn similarity_of_empty_texts_is_zero() {
        assert_eq!(content_similarity("", ""), 0.0);
        assert_eq!(content_similarity("a b", "a b"), 1.0);
    }

    #[test]
    fn template_usage_fraction() {
        let nodes = vec![
            Node::new("a", "A", "").as_template(),
            Node::new("b", "B", ""),
        ];
        assert_eq!(calculate_metrics(&nodes, &[]).template_usage, 0.5);
    }

    #[test]
    fn later_duplicate_ids_are_not_counted() {
        let nodes = vec![
            Node::new("p", "P", "").with_children(["c"]),
            Node::new("c", "C first", "").with_parent("p").with_depth(1),
            Node::new("c", "C second", "").with_depth(7).as_template(),
        ];
        let edges = vec![edge("p", "c")];
        let m = calculate_metrics(&nodes, &edges);
        assert_eq!(m.total_nodes, 2);
        assert_eq!(m.root_nodes, 1);
        assert_eq!(m.max_depth, 1);
        assert_eq!(m.template_usage, 0.0);
        assert_eq!(m, calculate_metrics(&nodes[..2], &edges));
    }

    #[test]
    fn input_order_does_not_matter() {
        let (mut nodes, edges) = balanced_forest();
        let forward = calculate_metrics(&nodes, &edges);
        nodes.reverse();
        let backward = calculate_metrics(&nodes, &edges);
        assert_eq!(forward, backward);
    }
}
