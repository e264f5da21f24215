//! `promptgraph estimate`: approximate token counts.

use promptgraph_hierarchy::token;
use std::path::Path;

pub async fn run(graph: Option<&Path>, text: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(text) = text {
        println!("{}", token::estimate_tokens(text));
        return Ok(());
    }

    let Some(graph) = graph else {
        return Err("Pass a graph file or --text".into());
    };
    let snapshot = super::load_graph(graph)?;

    println!("🔢 Token Estimates (≈4 chars per token)");
    println!("─────────────────────────────────────");
    for node in &snapshot.nodes {
        let estimated = token::estimate_node_tokens(node);
        match node.token_budget {
            Some(budget) if estimated > budget => {
                println!("  {:<24} {:>8}  ⚠ over budget {}", node.id, estimated, budget)
            }
            Some(budget) => println!("  {:<24} {:>8}  / {}", node.id, estimated, budget),
            None => println!("  {:<24} {:>8}", node.id, estimated),
        }
    }
    println!();
    println!("  Total: {}", token::estimate_total_tokens(&snapshot.nodes));

    Ok(())
}
