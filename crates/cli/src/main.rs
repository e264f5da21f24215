//! promptgraph CLI entry point.
//!
//! Commands:
//! - `analyze`: Metrics, issues, recommendations and hotspots
//! - `conflicts`: Hierarchy and relationship conflicts
//! - `budget`: Allocate the token budget across nodes
//! - `compact`: Allocate, then compact toward a token target
//! - `estimate`: Token estimates for a graph or a piece of text
//! - `init`: Write the default config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "promptgraph",
    about = "promptgraph: hierarchy analysis and context budgeting for prompt graphs",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.promptgraph/config.toml
    #[arg(short, long, global = true, env = "PROMPTGRAPH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze hierarchy structure
    Analyze {
        /// Graph snapshot (JSON with `nodes` and `edges`)
        graph: PathBuf,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Detect hierarchy and relationship conflicts
    Conflicts {
        graph: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Allocate the context budget
    Budget {
        graph: PathBuf,

        /// Override the total token budget
        #[arg(short, long, value_parser = positive_budget())]
        budget: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Compact the context window toward a token reduction target
    Compact {
        graph: PathBuf,

        /// Tokens to free
        #[arg(short, long)]
        target: usize,

        /// Override the total token budget
        #[arg(short, long, value_parser = positive_budget())]
        budget: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Estimate token counts
    Estimate {
        /// Graph snapshot to estimate per node
        graph: Option<PathBuf>,

        /// Estimate a piece of text instead
        #[arg(long, conflicts_with = "graph")]
        text: Option<String>,
    },

    /// Write the default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

fn positive_budget() -> clap::builder::RangedU64ValueParser<usize> {
    clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Analyze { graph, json } => commands::analyze::run(&graph, config, json).await?,
        Commands::Conflicts { graph, json } => commands::conflicts::run(&graph, json).await?,
        Commands::Budget {
            graph,
            budget,
            json,
        } => commands::budget::run(&graph, config, budget, json).await?,
        Commands::Compact {
            graph,
            target,
            budget,
            json,
        } => commands::compact::run(&graph, config, target, budget, json).await?,
        Commands::Estimate { graph, text } => {
            commands::estimate::run(graph.as_deref(), text.as_deref()).await?
        }
        Commands::Init { force } => commands::init::run(config, force).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_flag_is_rejected() {
        let parsed = Cli::try_parse_from(["promptgraph", "budget", "g.json", "--budget", "0"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn positive_budget_flag_parses() {
        let cli = Cli::try_parse_from(["promptgraph", "compact", "g.json", "-t", "100", "-b", "500"])
            .unwrap();
        match cli.command {
            Commands::Compact { budget, target, .. } => {
                assert_eq!(budget, Some(500));
                assert_eq!(target, 100);
            }
            _ => panic!("expected compact"),
        }
    }
}
