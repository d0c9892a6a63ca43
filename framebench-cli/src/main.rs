// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Framebench CLI
//!
//! Discovers server targets, verifies each against the HTTP contract,
//! load-tests the survivors and writes a ranked leaderboard.

use clap::{Args, Parser, Subcommand};

mod commands;

/// Framebench - HTTP framework benchmark orchestrator
#[derive(Parser)]
#[command(name = "framebench")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Configuration file path (defaults apply when it does not exist)
    #[arg(short, long, default_value = "framebench.yaml", global = true)]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Load shape and target selection for a benchmark run.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Targets to benchmark as runtime/framework; replaces discovery
    pub targets: Vec<String>,

    /// Seconds per load-generator invocation
    #[arg(long)]
    pub time: Option<u64>,

    /// Concurrent connections
    #[arg(long)]
    pub connections: Option<u32>,

    /// Runs per endpoint, reduced to their median
    #[arg(long)]
    pub runs: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Benchmark targets (the default when no command is given)
    Run(RunArgs),

    /// Print discovered targets as a JSON array
    List,

    /// Merge shard results into one ranked table
    Aggregate {
        /// Directory holding one subdirectory per shard
        #[arg(long)]
        artifacts: Option<String>,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // Dispatch to command handlers
    match cli.command {
        None => commands::run::execute(&cli.config, cli.run).await,
        Some(Commands::Run(args)) => commands::run::execute(&cli.config, args).await,
        Some(Commands::List) => commands::list::execute(&cli.config).await,
        Some(Commands::Aggregate { artifacts }) => {
            commands::aggregate::execute(&cli.config, artifacts.as_deref()).await
        }
        Some(Commands::Validate { file }) => commands::validate::execute(&file).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_targets_run() {
        let cli = Cli::try_parse_from(["framebench", "bun/elysia", "node/koa", "--runs", "3"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.targets, vec!["bun/elysia", "node/koa"]);
        assert_eq!(cli.run.runs, Some(3));
    }

    #[test]
    fn test_subcommands() {
        let cli = Cli::try_parse_from(["framebench", "list"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::List)));

        let cli = Cli::try_parse_from(["framebench", "-c", "bench.yaml", "run", "--time=5", "deno/oak"]).unwrap();
        assert_eq!(cli.config, "bench.yaml");
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.time, Some(5));
                assert_eq!(args.targets, vec!["deno/oak"]);
            }
            _ => panic!("expected run"),
        }
    }
}
