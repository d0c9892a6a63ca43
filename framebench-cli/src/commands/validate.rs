// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `framebench validate` command - Validate configuration file.

use framebench_core::ConfigLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Load Shape:");
            println!("  Duration:       {}s", config.load.time_secs);
            println!("  Connections:    {}", config.load.connections);
            println!("  Runs:           {}", config.load.runs);
            println!("  Load Generator: {}", config.load_generator);
            println!("  Server:         {}", config.base_url());
            println!("  Validation:     {}", if config.validation { "probe" } else { "off" });
            println!();
            println!("Readiness:");
            println!("  Strategy:       {:?}", config.readiness.strategy);
            println!("  Timeout:        {}ms", config.readiness.timeout.as_millis());
            println!();
            println!("Runtimes ({}):", config.runtimes.len());
            for (name, runtime) in &config.runtimes {
                println!("  - {} ({})", name, runtime.launcher.join(" "));
            }
            if !config.deny.is_empty() {
                println!();
                println!("Denied targets ({}):", config.deny.len());
                for target in &config.deny {
                    println!("  - {}", target);
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
