pub mod analyze;
pub mod budget;
pub mod compact;
pub mod conflicts;
pub mod estimate;
pub mod init;

use promptgraph_config::AppConfig;
use promptgraph_context::{BudgetSettings, WindowSettings};
use promptgraph_core::GraphSnapshot;
use promptgraph_hierarchy::AnalysisThresholds;
use std::path::Path;

/// Read a graph snapshot exported by the graph store.
pub fn load_graph(path: &Path) -> Result<GraphSnapshot, Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let snapshot = GraphSnapshot::from_json(&json)?;
    tracing::debug!(
        path = %path.display(),
        nodes = snapshot.nodes.len(),
        edges = snapshot.edges.len(),
        "Graph loaded"
    );
    Ok(snapshot)
}

/// Load config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_overrides(|key| std::env::var(key).ok())?;
            config.validate()?;
            config
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}

pub fn analysis_thresholds(config: &AppConfig) -> AnalysisThresholds {
    let a = &config.analysis;
    AnalysisThresholds {
        max_depth_warning: a.max_depth_warning,
        max_depth_critical: a.max_depth_critical,
        balance_threshold: a.balance_threshold,
        similarity_threshold: a.similarity_threshold,
        redundancy_threshold: a.redundancy_threshold,
        max_fanout: a.max_fanout,
        low_specificity: a.low_specificity,
        under_specified_ratio: a.under_specified_ratio,
    }
}

/// Window settings from config, with an optional budget override that is
/// held to the same validation as the config file.
pub fn window_settings(
    config: &AppConfig,
    budget_override: Option<usize>,
) -> Result<WindowSettings, Box<dyn std::error::Error>> {
    let mut checked = config.clone();
    if let Some(budget) = budget_override {
        checked.context.total_budget = budget;
        checked.validate()?;
    }
    let c = &checked.context;
    Ok(WindowSettings {
        total_budget: c.total_budget,
        compaction_enabled: c.compaction_enabled,
        compaction_threshold: c.compaction_threshold,
        compression_ratio: c.compression_ratio,
    })
}

pub fn budget_settings(config: &AppConfig) -> BudgetSettings {
    let c = &config.context;
    BudgetSettings {
        scope_reserve: c.scope_reserve,
        altitude_reserve: c.altitude_reserve,
        priority_reserve: c.priority_reserve,
        default_used_ratio: c.default_used_ratio,
    }
}

/// Print `value` as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
