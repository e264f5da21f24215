//! `promptgraph conflicts`: hierarchy and relationship conflicts.

use promptgraph_core::GraphView;
use promptgraph_hierarchy::{detect_conflicts, Severity};
use std::path::Path;

pub async fn run(graph: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = super::load_graph(graph)?;
    let conflicts = detect_conflicts(&snapshot.nodes, &snapshot.edges);

    if json {
        return super::print_json(&conflicts);
    }

    let view = GraphView::new(&snapshot.nodes);
    if !view.duplicate_ids().is_empty() {
        println!(
            "⚠ Duplicate node ids (first occurrence used): {}",
            view.duplicate_ids().join(", ")
        );
        println!();
    }

    if conflicts.is_empty() {
        println!("✅ No conflicts in {} nodes", snapshot.nodes.len());
        return Ok(());
    }

    let count = |s: Severity| conflicts.iter().filter(|c| c.severity == s).count();
    println!(
        "⚔️  {} conflict(s): {} high, {} medium, {} low",
        conflicts.len(),
        count(Severity::High),
        count(Severity::Medium),
        count(Severity::Low)
    );
    println!("─────────────────────────────────────");

    for conflict in &conflicts {
        println!("  [{}] {}", conflict.severity, conflict.description);
        println!("        nodes: {}", conflict.node_ids.join(", "));
        if let Some(first) = conflict.suggestions.first() {
            println!("        fix:   {first}");
        }
    }

    Ok(())
}
