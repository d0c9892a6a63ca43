// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `framebench list` command - Print discovered targets.
//!
//! Output is a single JSON array (`runtime/framework`, with `/index` for
//! directory frameworks), suitable for building a CI matrix.

use framebench_core::{ConfigLoader, TargetEnumerator};

pub async fn execute(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(config_path)?;

    let targets = TargetEnumerator::new(&config.paths.source_dir, &config.deny, &[]).enumerate()?;
    tracing::debug!(count = targets.len(), source = %config.paths.source_dir.display(), "Targets discovered");

    let listings: Vec<String> = targets.iter().map(|t| t.listing()).collect();
    println!("{}", serde_json::to_string(&listings)?);

    Ok(())
}
