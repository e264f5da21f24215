//! End-to-end tests for the promptgraph analysis engine.
//!
//! These exercise the library pipeline the CLI drives: snapshot ingestion,
//! metrics, conflict detection, analysis, budget allocation and compaction.

use std::sync::Arc;

use promptgraph_config::AppConfig;
use promptgraph_context::{
    allocate_budget, merge_allocations, Allocation, BudgetAllocator, BudgetSettings,
    CompactionTrigger, ContextManager, ContextWindow, Summarizer, WindowSettings,
};
use promptgraph_core::{
    Altitude, CompactionError, CompressionHint, Edge, GraphSnapshot, Node, RelationshipType, Scope,
};
use promptgraph_hierarchy::{
    analyze, calculate_metrics, detect_conflicts, detect_hierarchy_conflicts, token, ConflictType,
    FanoutStats, Severity, ValueRange,
};

// ── Fixtures ─────────────────────────────────────────────────────────────

/// A summarizer that counts calls and halves every node.
struct CountingSummarizer {
    calls: std::sync::Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Summarizer for CountingSummarizer {
    fn name(&self) -> &str {
        "counting"
    }

    async fn compact(&self, allocation: &Allocation) -> Result<usize, CompactionError> {
        self.calls.lock().unwrap().push(allocation.node_id.clone());
        Ok(allocation.used / 2)
    }
}

/// Parent chain `n0 <- n1 <- ... <- n{len-1} <- n0`, listed starting at
/// `start`.
fn cycle(len: usize, start: usize) -> Vec<Node> {
    (0..len)
        .map(|i| (i + start) % len)
        .map(|i| Node::new(format!("n{i}"), format!("Node {i}"), "").with_parent(format!("n{}", (i + 1) % len)))
        .collect()
}

/// A mixed graph with every altitude, some global nodes and priorities.
fn assorted(count: usize) -> Vec<Node> {
    (0..count)
        .map(|i| {
            let mut node = Node::new(format!("n{i}"), format!("Node {i}"), "text ".repeat(i + 1))
                .with_altitude(Altitude::ALL[i % Altitude::ALL.len()])
                .with_priority(((i * 37) % 101) as u32);
            if i % 3 == 0 {
                node = node.with_scope(Scope::Global);
            }
            node
        })
        .collect()
}

// ── Allocation ───────────────────────────────────────────────────────────

#[test]
fn e2e_each_pass_spends_at_most_its_reserve() {
    let allocator = BudgetAllocator::default();
    for count in [1, 2, 5, 13, 40] {
        let nodes = assorted(count);
        let refs: Vec<&Node> = nodes.iter().collect();
        for total in [10, 999, 8_192, 200_000] {
            let sum = |v: Vec<Allocation>| v.iter().map(|a| a.allocated).sum::<usize>();
            assert!(sum(allocator.scope_pass(&refs, total)) <= total * 3 / 10);
            assert!(sum(allocator.altitude_pass(&refs, total)) <= total * 4 / 10);
            assert!(sum(allocator.priority_pass(&refs, total)) <= total * 3 / 10);
        }
    }
}

#[test]
fn e2e_merge_is_idempotent() {
    let allocator = BudgetAllocator::default();
    let nodes = assorted(12);
    let refs: Vec<&Node> = nodes.iter().collect();
    let passes = vec![
        allocator.scope_pass(&refs, 50_000),
        allocator.altitude_pass(&refs, 50_000),
        allocator.priority_pass(&refs, 50_000),
    ];

    let once = merge_allocations(&passes);
    let twice = merge_allocations(&passes.iter().chain(passes.iter()).cloned().collect::<Vec<_>>());
    assert_eq!(once, twice);
    assert_eq!(merge_allocations(&[once.clone()]), once);
    assert_eq!(once.len(), 12);
}

#[test]
fn e2e_single_global_node_scenario() {
    let node = Node::new("g", "Global rules", "x".repeat(4000))
        .with_scope(Scope::Global)
        .with_token_budget(1000);

    let estimate = token::estimate_node_tokens(&node);
    assert!((1010..=1015).contains(&estimate));

    let allocations = allocate_budget(&[node], 200_000);
    assert_eq!(allocations.len(), 1);
    assert!(allocations[0].allocated >= 60_000);
}

// ── Conflicts ────────────────────────────────────────────────────────────

#[test]
fn e2e_cycle_detection_is_complete() {
    for len in 2..=6 {
        for start in 0..len {
            let nodes = cycle(len, start);
            let conflicts = detect_hierarchy_conflicts(&nodes);
            let cycles: Vec<_> = conflicts
                .iter()
                .filter(|c| c.conflict_type == ConflictType::CircularReference)
                .collect();
            assert_eq!(cycles.len(), 1, "len {len} start {start}");

            let mut named = cycles[0].node_ids.clone();
            named.sort();
            let mut expected: Vec<String> = (0..len).map(|i| format!("n{i}")).collect();
            expected.sort();
            assert_eq!(named, expected);
        }
    }
}

#[test]
fn e2e_altitude_boundary_every_pair() {
    for parent in Altitude::ALL {
        for child in Altitude::ALL {
            let nodes = vec![
                Node::new("p", "P", "").with_altitude(parent),
                Node::new("c", "C", "").with_parent("p").with_altitude(child),
            ];
            let conflicts = detect_hierarchy_conflicts(&nodes);
            if child.index() < parent.index() {
                assert_eq!(conflicts.len(), 1, "{parent} > {child}");
                assert_eq!(conflicts[0].severity, Severity::High);
            } else {
                assert!(conflicts.is_empty(), "{parent} -> {child}");
            }
        }
    }
}

#[test]
fn e2e_scope_boundary_every_pair() {
    for parent in Scope::ALL {
        for child in Scope::ALL {
            let nodes = vec![
                Node::new("p", "P", "").with_scope(parent),
                Node::new("c", "C", "").with_parent("p").with_scope(child),
            ];
            let conflicts = detect_hierarchy_conflicts(&nodes);
            if child.breadth() > parent.breadth() {
                assert_eq!(conflicts.len(), 1, "{parent} < {child}");
                assert_eq!(conflicts[0].severity, Severity::Medium);
            } else {
                assert!(conflicts.is_empty(), "{parent} -> {child}");
            }
        }
    }
}

#[test]
fn e2e_priority_inversion_scenario() {
    let nodes = vec![
        Node::new("parent", "Parent", "").with_priority(50),
        Node::new("child", "Child", "").with_parent("parent").with_priority(80),
    ];
    let conflicts = detect_conflicts(&nodes, &[]);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].conflict_type, ConflictType::PriorityMismatch);
    assert_eq!(conflicts[0].severity, Severity::Medium);
    assert!(conflicts[0].involves("parent"));
    assert!(conflicts[0].involves("child"));
}

#[test]
fn e2e_depth_drift_scenario() {
    let nodes = vec![
        Node::new("parent", "Parent", "").with_depth(1),
        Node::new("child", "Child", "").with_parent("parent").with_depth(5),
    ];
    let conflicts = detect_hierarchy_conflicts(&nodes);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].conflict_type, ConflictType::DepthInconsistency);
    assert_eq!(conflicts[0].severity, Severity::Low);
    assert!(conflicts[0].description.contains("expected depth 2"));
}

// ── Metrics & analysis ───────────────────────────────────────────────────

#[test]
fn e2e_degenerate_inputs() {
    let metrics = calculate_metrics(&[], &[]);
    assert_eq!(metrics.total_nodes, 0);
    assert_eq!(metrics.max_depth, 0);
    assert_eq!(metrics.avg_depth, 0.0);
    assert_eq!(metrics.balance_factor, 1.0);
    assert_eq!(metrics.fanout, FanoutStats::default());
    assert_eq!(metrics.specificity_range, ValueRange::NEUTRAL);
    assert_eq!(metrics.avg_tokens_per_node, 0.0);
    assert_eq!(metrics.template_usage, 0.0);
    assert!(metrics.altitude_distribution.values().all(|&v| v == 0));
    assert_eq!(metrics.altitude_distribution.len(), 5);

    assert!(detect_conflicts(&[], &[]).is_empty());
    let analysis = analyze(&[], &[]);
    assert!(analysis.issues.is_empty());
    assert!(analysis.hotspots.is_empty());
    assert!(allocate_budget(&[], 1000).is_empty());
}

#[test]
fn e2e_balanced_flat_graph_scenario() {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for r in 0..3 {
        let root = format!("r{r}");
        let kids = [format!("r{r}a"), format!("r{r}b")];
        nodes.push(Node::new(root.clone(), root.clone(), "").with_depth(1).with_children(kids.clone()));
        for kid in kids {
            edges.push(Edge::new(root.clone(), kid.clone(), RelationshipType::Refines));
            nodes.push(Node::new(kid.clone(), kid, "").with_parent(root.clone()).with_depth(1));
        }
    }

    let metrics = calculate_metrics(&nodes, &edges);
    assert_eq!(metrics.balance_factor, 1.0);
    assert_eq!(metrics.max_depth, 1);
    assert_eq!(metrics.orphaned_nodes, 0);
    assert_eq!(metrics.root_nodes, 3);
    assert_eq!(metrics.leaf_nodes, 6);
}

#[test]
fn e2e_snapshot_from_store_json() {
    let json = r#"{
        "nodes": [
            {"id": "sys", "title": "System", "content": "You are a careful reviewer.",
             "category": "role", "altitude": "META", "scope": "GLOBAL",
             "contextPriority": 95, "depth": 0, "childIds": ["fmt"]},
            {"id": "fmt", "title": "Format", "content": "Answer in markdown tables.",
             "category": "format", "parentId": "sys", "altitude": "OPERATIONAL",
             "scope": "TASK", "contextPriority": 99, "depth": 1,
             "compressionHint": "preserve"},
            {"id": "ex", "title": "Example", "content": "| a | b |",
             "category": "example", "altitude": "IMPLEMENTATION",
             "estimatedTokens": 7000, "tokenBudget": 500}
        ],
        "edges": [
            {"source": "sys", "target": "fmt", "type": "extends"},
            {"source": "fmt", "target": "ex", "type": "conflicts-with"}
        ]
    }"#;

    let snapshot = GraphSnapshot::from_json(json).unwrap();
    assert_eq!(snapshot.nodes.len(), 3);

    let conflicts = detect_conflicts(&snapshot.nodes, &snapshot.edges);
    let types: Vec<ConflictType> = conflicts.iter().map(|c| c.conflict_type).collect();
    assert_eq!(types, vec![ConflictType::ExplicitConflict, ConflictType::PriorityMismatch]);

    let analysis = analyze(&snapshot.nodes, &snapshot.edges);
    let hotspot = analysis.hotspots.iter().find(|h| h.node_id == "ex").unwrap();
    // over-allocation (medium) + more than 5000 tokens
    assert_eq!(hotspot.score, 40);

    let serialized = serde_json::to_value(&analysis).unwrap();
    assert!(serialized["metrics"]["altitudeDistribution"]["META"].is_number());
}

// ── Compaction ───────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_compaction_respects_preserve() {
    let nodes = vec![
        Node::new("hinted", "Hinted", "")
            .with_altitude(Altitude::Implementation)
            .with_priority(0)
            .with_compression_hint(CompressionHint::Preserve),
        Node::new("listed", "Listed", "")
            .with_altitude(Altitude::Implementation)
            .with_priority(1),
        Node::new("free", "Free", "")
            .with_altitude(Altitude::Operational)
            .with_priority(100),
    ];

    let summarizer = Arc::new(CountingSummarizer {
        calls: std::sync::Mutex::new(Vec::new()),
    });
    let mut manager = ContextManager::new(WindowSettings::default(), BudgetSettings::default())
        .with_summarizer(summarizer.clone());
    manager.allocate(&nodes);
    manager.preserve("listed");

    let result = manager.compact(usize::MAX).await;
    assert!(!result.success);
    assert_eq!(result.compacted_nodes, vec!["free"]);
    assert_eq!(*summarizer.calls.lock().unwrap(), vec!["free".to_string()]);
    assert_eq!(manager.window().compaction_history.len(), 1);
}

#[tokio::test]
async fn e2e_threshold_driven_compaction_and_export() {
    let nodes: Vec<Node> = (0..4)
        .map(|i| {
            Node::new(format!("op{i}"), format!("Op {i}"), "")
                .with_altitude(Altitude::Operational)
                .with_estimated_tokens(2_500)
        })
        .collect();

    let mut manager = ContextManager::new(
        WindowSettings {
            total_budget: 10_000,
            ..WindowSettings::default()
        },
        BudgetSettings::default(),
    );
    manager.allocate(&nodes);
    assert_eq!(manager.window().used, 10_000);
    assert!(manager.should_compact());

    let result = manager
        .compact_with_trigger(3_000, CompactionTrigger::Threshold)
        .await;
    assert!(result.success);
    assert_eq!(result.tokens_saved, 3_750);
    assert_eq!(manager.window().used, 6_250);
    assert!(!manager.should_compact());

    let restored = ContextWindow::from_json(&manager.export_json().unwrap()).unwrap();
    assert_eq!(&restored, manager.window());
    assert_eq!(restored.summary().tokens_saved, 3_750);
}

// ── Config ───────────────────────────────────────────────────────────────

#[test]
fn e2e_config_drives_allocation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[context]\ntotal_budget = 1000\nscope_reserve = 0.5\naltitude_reserve = 0.2\npriority_reserve = 0.3\n",
    )
    .unwrap();
    let config = AppConfig::load_from(&path).unwrap();

    let allocator = BudgetAllocator::new(BudgetSettings {
        scope_reserve: config.context.scope_reserve,
        altitude_reserve: config.context.altitude_reserve,
        priority_reserve: config.context.priority_reserve,
        default_used_ratio: config.context.default_used_ratio,
    });
    let nodes = vec![Node::new("g", "G", "").with_scope(Scope::Global)];
    let allocations = allocator.allocate(&nodes, config.context.total_budget);
    assert_eq!(allocations[0].allocated, 500);
    assert_eq!(allocations[0].used, 400);
}
