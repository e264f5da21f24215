//! `promptgraph analyze`: metrics, issues, recommendations and hotspots.

use promptgraph_core::Altitude;
use promptgraph_hierarchy::{HierarchyAnalysis, HierarchyAnalyzer, Severity};
use std::path::Path;

pub async fn run(
    graph: &Path,
    config: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config)?;
    let snapshot = super::load_graph(graph)?;

    let analyzer = HierarchyAnalyzer::new(super::analysis_thresholds(&config));
    let analysis = analyzer.analyze(&snapshot.nodes, &snapshot.edges);

    if json {
        return super::print_json(&analysis);
    }

    print_report(&analysis);
    Ok(())
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "🔴",
        Severity::Medium => "🟠",
        Severity::Low => "🟡",
    }
}

fn print_report(analysis: &HierarchyAnalysis) {
    let m = &analysis.metrics;

    println!("📐 Hierarchy Metrics");
    println!("─────────────────────────────────────");
    println!("  Nodes:          {} ({} roots, {} leaves)", m.total_nodes, m.root_nodes, m.leaf_nodes);
    println!("  Edges:          {}", m.total_edges);
    println!("  Depth:          max {}, avg {:.2}", m.max_depth, m.avg_depth);
    println!("  Balance:        {:.2}", m.balance_factor);
    println!(
        "  Fan-out:        min {}, max {}, avg {:.2}",
        m.fanout.min, m.fanout.max, m.fanout.avg
    );
    println!(
        "  Tokens:         {} total, {:.1} per node",
        m.total_tokens, m.avg_tokens_per_node
    );
    println!("  Budget use:     {:.1}%", m.budget_utilization * 100.0);
    println!("  Complexity:     {}", m.cyclomatic_complexity);
    println!(
        "  Coupling:       {:.2}   Cohesion: {:.2}",
        m.coupling_score, m.cohesion_score
    );
    println!(
        "  Orphans:        {}   Redundancy: {:.2}   Templates: {:.0}%",
        m.orphaned_nodes,
        m.redundancy_score,
        m.template_usage * 100.0
    );

    println!();
    println!("  Altitudes:");
    for altitude in Altitude::ALL {
        let count = m.altitude_distribution.get(&altitude).copied().unwrap_or(0);
        println!("    {:<16} {}", altitude.to_string(), count);
    }

    println!();
    if analysis.issues.is_empty() {
        println!("✅ No structural issues");
    } else {
        println!("⚠️  Issues ({})", analysis.issues.len());
        println!("─────────────────────────────────────");
        for issue in &analysis.issues {
            println!("  {} [{}] {}", severity_icon(issue.severity), issue.severity, issue.description);
        }
    }

    if !analysis.recommendations.is_empty() {
        println!();
        println!("💡 Recommendations");
        println!("─────────────────────────────────────");
        for rec in &analysis.recommendations {
            println!("  ({:>3}) {}", rec.priority, rec.title);
            println!("        {}", rec.description);
        }
    }

    if !analysis.hotspots.is_empty() {
        println!();
        println!("🔥 Hotspots");
        println!("─────────────────────────────────────");
        for hotspot in &analysis.hotspots {
            println!("  {:>3}  {} ({})", hotspot.score, hotspot.title, hotspot.node_id);
            for reason in &hotspot.reasons {
                println!("       • {reason}");
            }
            for action in &hotspot.suggested_actions {
                println!("       → {action}");
            }
        }
    }
}
