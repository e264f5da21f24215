//! `promptgraph budget`: allocate the context window across nodes.

use promptgraph_context::{ContextManager, ContextWindow};
use std::path::Path;

pub async fn run(
    graph: &Path,
    config: Option<&Path>,
    budget: Option<usize>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config)?;
    let snapshot = super::load_graph(graph)?;

    let mut manager = ContextManager::new(
        super::window_settings(&config, budget)?,
        super::budget_settings(&config),
    );
    manager.allocate(&snapshot.nodes);

    if json {
        println!("{}", manager.export_json()?);
        return Ok(());
    }

    print_window(manager.window());
    Ok(())
}

pub(crate) fn print_window(window: &ContextWindow) {
    let summary = window.summary();

    println!("🧮 Context Window");
    println!("─────────────────────────────────────");
    println!("  Budget:      {}", summary.total_budget);
    println!("  Used:        {} ({:.1}%)", summary.used, summary.utilization * 100.0);
    println!("  Remaining:   {}", summary.remaining);
    println!(
        "  Nodes:       {} ({} compressible, {} preserved)",
        summary.allocations, summary.compressible, summary.preserved
    );

    if !window.allocations.is_empty() {
        println!();
        println!(
            "  {:<24} {:>10} {:>10} {:>5}  {}",
            "Node", "Allocated", "Used", "Prio", "Flags"
        );
        for a in &window.allocations {
            let mut flags = Vec::new();
            if a.compressible {
                flags.push("compressible");
            }
            if window.is_preserved(&a.node_id) {
                flags.push("preserved");
            }
            println!(
                "  {:<24} {:>10} {:>10} {:>5}  {}",
                a.node_id,
                a.allocated,
                a.used,
                a.priority,
                flags.join(",")
            );
        }
    }

    if summary.should_compact {
        println!();
        println!(
            "⚠ Utilization is above the {:.0}% threshold. Consider `promptgraph compact`.",
            window.compaction_threshold * 100.0
        );
    }
}
