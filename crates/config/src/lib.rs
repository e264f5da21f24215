//! Configuration loading, validation, and management for promptgraph.
//!
//! Loads configuration from `~/.promptgraph/config.toml` with environment
//! variable overrides. Validates all settings at load time. The engine
//! crates never read this directly; the CLI turns it into their settings
//! structs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.promptgraph/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Context window and compaction settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Thresholds used by hierarchy analysis
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Context window, allocation, and compaction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Total token budget of the window
    #[serde(default = "default_total_budget")]
    pub total_budget: usize,

    #[serde(default = "default_true")]
    pub compaction_enabled: bool,

    /// Utilization above which compaction is recommended
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: f64,

    /// Fraction of a node's used tokens removed by one simulated compaction
    #[serde(default = "default_compression_ratio")]
    pub compression_ratio: f64,

    /// Assumed used/allocated ratio for nodes without a size estimate
    #[serde(default = "default_used_ratio")]
    pub default_used_ratio: f64,

    /// Share of the budget split among GLOBAL-scope nodes
    #[serde(default = "default_scope_reserve")]
    pub scope_reserve: f64,

    /// Share of the budget split by altitude weights
    #[serde(default = "default_altitude_reserve")]
    pub altitude_reserve: f64,

    /// Share of the budget split by context priority
    #[serde(default = "default_priority_reserve")]
    pub priority_reserve: f64,
}

fn default_total_budget() -> usize {
    200_000
}
fn default_true() -> bool {
    true
}
fn default_compaction_threshold() -> f64 {
    0.8
}
fn default_compression_ratio() -> f64 {
    0.5
}
fn default_used_ratio() -> f64 {
    0.8
}
fn default_scope_reserve() -> f64 {
    0.3
}
fn default_altitude_reserve() -> f64 {
    0.4
}
fn default_priority_reserve() -> f64 {
    0.3
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            total_budget: default_total_budget(),
            compaction_enabled: true,
            compaction_threshold: default_compaction_threshold(),
            compression_ratio: default_compression_ratio(),
            default_used_ratio: default_used_ratio(),
            scope_reserve: default_scope_reserve(),
            altitude_reserve: default_altitude_reserve(),
            priority_reserve: default_priority_reserve(),
        }
    }
}

/// Thresholds for structural issues and recommendations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Depth above which a hierarchy is flagged as too deep
    #[serde(default = "default_max_depth_warning")]
    pub max_depth_warning: u32,

    /// Depth above which the depth issue becomes high severity
    #[serde(default = "default_max_depth_critical")]
    pub max_depth_critical: u32,

    #[serde(default = "default_balance_threshold")]
    pub balance_threshold: f64,

    /// Word-set Jaccard similarity above which two nodes count as redundant
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Redundancy score above which merging is recommended
    #[serde(default = "default_redundancy_threshold")]
    pub redundancy_threshold: f64,

    #[serde(default = "default_max_fanout")]
    pub max_fanout: usize,

    #[serde(default = "default_low_specificity")]
    pub low_specificity: f64,

    /// Share of low-specificity nodes that triggers an issue
    #[serde(default = "default_under_specified_ratio")]
    pub under_specified_ratio: f64,
}

fn default_max_depth_warning() -> u32 {
    5
}
fn default_max_depth_critical() -> u32 {
    7
}
fn default_balance_threshold() -> f64 {
    0.5
}
fn default_similarity_threshold() -> f64 {
    0.7
}
fn default_redundancy_threshold() -> f64 {
    0.3
}
fn default_max_fanout() -> usize {
    10
}
fn default_low_specificity() -> f64 {
    0.3
}
fn default_under_specified_ratio() -> f64 {
    0.3
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_depth_warning: default_max_depth_warning(),
            max_depth_critical: default_max_depth_critical(),
            balance_threshold: default_balance_threshold(),
            similarity_threshold: default_similarity_threshold(),
            redundancy_threshold: default_redundancy_threshold(),
            max_fanout: default_max_fanout(),
            low_specificity: default_low_specificity(),
            under_specified_ratio: default_under_specified_ratio(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.promptgraph/config.toml).
    ///
    /// Environment overrides, applied after the file:
    /// - `PROMPTGRAPH_TOTAL_BUDGET`
    /// - `PROMPTGRAPH_COMPACTION_THRESHOLD`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// [`AppConfig::load`]).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("PROMPTGRAPH_TOTAL_BUDGET") {
            self.context.total_budget = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "PROMPTGRAPH_TOTAL_BUDGET must be a positive integer, got '{raw}'"
                ))
            })?;
        }

        if let Some(raw) = lookup("PROMPTGRAPH_COMPACTION_THRESHOLD") {
            self.context.compaction_threshold = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "PROMPTGRAPH_COMPACTION_THRESHOLD must be a number, got '{raw}'"
                ))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".promptgraph")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ctx = &self.context;

        if ctx.total_budget == 0 {
            return Err(ConfigError::ValidationError(
                "context.total_budget must be > 0".into(),
            ));
        }

        for (name, value) in [
            ("context.compaction_threshold", ctx.compaction_threshold),
            ("context.compression_ratio", ctx.compression_ratio),
            ("context.default_used_ratio", ctx.default_used_ratio),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be in (0.0, 1.0], got {value}"
                )));
            }
        }

        for (name, value) in [
            ("context.scope_reserve", ctx.scope_reserve),
            ("context.altitude_reserve", ctx.altitude_reserve),
            ("context.priority_reserve", ctx.priority_reserve),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be in [0.0, 1.0], got {value}"
                )));
            }
        }

        let reserves = ctx.scope_reserve + ctx.altitude_reserve + ctx.priority_reserve;
        if reserves > 1.0 + 1e-9 {
            return Err(ConfigError::ValidationError(format!(
                "scope + altitude + priority reserves must not exceed 1.0, got {reserves}"
            )));
        }

        let analysis = &self.analysis;
        if analysis.max_depth_critical < analysis.max_depth_warning {
            return Err(ConfigError::ValidationError(
                "analysis.max_depth_critical must be >= analysis.max_depth_warning".into(),
            ));
        }

        for (name, value) in [
            ("analysis.balance_threshold", analysis.balance_threshold),
            ("analysis.similarity_threshold", analysis.similarity_threshold),
            ("analysis.redundancy_threshold", analysis.redundancy_threshold),
            ("analysis.low_specificity", analysis.low_specificity),
            ("analysis.under_specified_ratio", analysis.under_specified_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be in [0.0, 1.0], got {value}"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
