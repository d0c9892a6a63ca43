// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `framebench aggregate` command - Merge shard results.

use std::path::PathBuf;

use framebench_bench::{Aggregator, TableError};
use framebench_core::ConfigLoader;

pub async fn execute(
    config_path: &str,
    artifacts: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(config_path)?;
    let artifacts_dir = artifacts
        .map(PathBuf::from)
        .unwrap_or_else(|| config.paths.artifacts_dir.clone());

    match Aggregator::new(&artifacts_dir, &config.paths.results_dir).run() {
        Ok((table, summary)) => {
            println!("Found {} shard(s)", summary.shards);
            println!("Copied {} result file(s)", summary.files_copied);
            if summary.collisions > 0 {
                println!("  {} file(s) overwritten by a later shard", summary.collisions);
            }
            println!("Collected {} results", table.len());
            println!();
            println!("✓ Results aggregated successfully!");
            println!();
            println!("{}", table.render());
            Ok(())
        }
        Err(e @ TableError::ArtifactsNotFound { .. }) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
