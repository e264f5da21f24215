//! `promptgraph compact`: allocate, then compact toward a target.

use promptgraph_context::{CompactionTrigger, ContextManager};
use std::path::Path;

pub async fn run(
    graph: &Path,
    config: Option<&Path>,
    target: usize,
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

    let trigger = if manager.should_compact() {
        CompactionTrigger::Threshold
    } else {
        CompactionTrigger::Manual
    };
    let result = manager.compact_with_trigger(target, trigger).await;

    if json {
        return super::print_json(&result);
    }

    if result.success {
        println!("✅ Saved {} tokens (target {})", result.tokens_saved, target);
    } else {
        println!(
            "⚠ Saved {} of {} tokens; no compressible candidates left",
            result.tokens_saved, target
        );
    }
    if !result.compacted_nodes.is_empty() {
        println!("   Compacted: {}", result.compacted_nodes.join(", "));
    }
    for error in &result.errors {
        println!("   ✗ {error}");
    }

    println!();
    super::budget::print_window(manager.window());
    Ok(())
}
