// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `framebench run` command - Verify and benchmark every target.
//!
//! Two sequential passes over the target list, one live server at a time:
//! the correctness pass drops failing targets, the benchmark pass appends one
//! row per survivor. The table is ranked at the end even after Ctrl-C, and
//! ranking failures never change the exit status.

use std::collections::BTreeMap;

use framebench_bench::loadgen::{write_payloads, PAYLOAD_DIR};
use framebench_bench::metrics::{estimate_secs, format_duration};
use framebench_bench::store::{rank_file, TABLE_FILE};
use framebench_bench::{
    BenchmarkRunner, Bombardier, EndpointCommand, JsonReporter, ResultsStore, RunReport, ENDPOINTS,
};
use framebench_core::{
    release_port, BenchConfig, Capabilities, ConfigLoader, CorrectnessSuite, ManifestVersions,
    Overrides, RetryClient, RetryPolicy, ServerProcess, Target, TargetEnumerator, VersionResolver,
};

use crate::RunArgs;

/// Environment variables carrying runtime versions for display names.
const RUNTIME_VERSION_VARS: [(&str, &str); 3] = [
    ("bun", "BUN_VERSION"),
    ("deno", "DENO_VERSION"),
    ("node", "NODE_VERSION"),
];

/// Comma-separated target override.
const TARGETS_VAR: &str = "FRAMEWORKS";

pub async fn execute(config_path: &str, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path, args)?;
    tracing::info!(
        time_secs = config.load.time_secs,
        connections = config.load.connections,
        runs = config.load.runs,
        "Configuration loaded"
    );

    let mut report = RunReport::new(config.load, config.load_generator.clone());

    tokio::select! {
        result = pipeline(&config, &mut report) => result?,
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("Interrupted, stopping...");
            tracing::warn!("Benchmark interrupted");
        }
    }

    match JsonReporter::new(&config.paths.results_dir).and_then(|r| r.save(&report)) {
        Ok(path) => tracing::info!(path = %path.display(), "Report saved"),
        Err(e) => tracing::warn!(error = %e, "Failed to save report"),
    }

    arrange(&config);
    release_port(&config.host, config.port).await;
    Ok(())
}

/// Defaults or file, then CLI and environment overrides, merged once.
fn load_config(config_path: &str, args: RunArgs) -> Result<BenchConfig, Box<dyn std::error::Error>> {
    let env_targets = std::env::var(TARGETS_VAR).ok();
    let runtime_versions: BTreeMap<String, String> = RUNTIME_VERSION_VARS
        .iter()
        .filter_map(|(runtime, var)| {
            let version = std::env::var(var).ok()?;
            Some((runtime.to_string(), version))
        })
        .collect();

    let overrides = Overrides {
        time_secs: args.time,
        connections: args.connections,
        runs: args.runs,
        targets: Overrides::select_targets(args.targets, env_targets.as_deref()),
        runtime_versions,
    };

    Ok(ConfigLoader::load_or_default(config_path)?.apply(overrides)?)
}

async fn pipeline(
    config: &BenchConfig,
    report: &mut RunReport,
) -> Result<(), Box<dyn std::error::Error>> {
    let banner = "=".repeat(60);
    println!("{}", banner);
    println!("BENCHMARK STARTING");
    println!("{}", banner);

    release_port(&config.host, config.port).await;

    let mut store = ResultsStore::create(&config.paths.results_dir)?;

    let targets = TargetEnumerator::new(&config.paths.source_dir, &config.deny, &config.allow)
        .enumerate()?;
    print_targets(&targets);

    let client = RetryClient::new(RetryPolicy::default())?;

    println!();
    println!("Test:");
    let mut verified = Vec::with_capacity(targets.len());
    for target in targets {
        if let Some(capabilities) = verify(config, &client, &target).await {
            verified.push((target, capabilities));
        }
    }

    let estimate = estimate_secs(verified.len(), ENDPOINTS.len(), &config.load);
    println!();
    print_targets(&verified.iter().map(|(t, _)| t.clone()).collect::<Vec<_>>());
    println!();
    println!("Estimate time: {} min", format_duration(estimate));
    println!();

    let payload_dir = config.paths.results_dir.join(PAYLOAD_DIR);
    write_payloads(&payload_dir)?;

    let runner = BenchmarkRunner::new(
        Bombardier::new(config.load_generator.clone()),
        EndpointCommand::plan(config, &payload_dir),
        config.load.runs,
        &config.paths.results_dir,
    );
    let versions = ManifestVersions::load(config);

    for (target, capabilities) in &verified {
        let mut server = match ServerProcess::start(config, target, &client).await {
            Ok(server) => server,
            Err(e) => {
                println!("✗ {} ({}): {}", target.framework(), target.runtime(), e);
                tracing::error!(target_id = %target, error = %e, "Failed to start server for benchmark");
                continue;
            }
        };

        let outcome = runner
            .run(target, &versions.display_name(target), *capabilities)
            .await;
        server.stop().await;

        match outcome {
            Ok(outcome) => {
                store.append(&outcome.row())?;
                report.add_target(outcome.report());
            }
            Err(e) => tracing::error!(target_id = %target, error = %e, "Benchmark failed"),
        }
    }

    println!();
    println!("Benchmark complete! ({} rows)", store.rows());
    Ok(())
}

/// Correctness pass for one target. `None` drops it from the run.
async fn verify(config: &BenchConfig, client: &RetryClient, target: &Target) -> Option<Capabilities> {
    let name = format!("{} ({})", target.framework(), target.runtime());

    let mut server = match ServerProcess::start(config, target, client).await {
        Ok(server) => server,
        Err(e) => {
            println!("✗ {}", name);
            println!("   {}", e);
            tracing::error!(target_id = %target, error = %e, "Failed to start server");
            return None;
        }
    };

    let suite = CorrectnessSuite::new(client, config.base_url());
    let result = suite.run(config.validation).await;
    server.stop().await;

    match result {
        Ok(capabilities) => {
            let extra = if capabilities.validation { " [validation]" } else { "" };
            println!("✓ {}{}", name, extra);
            Some(capabilities)
        }
        Err(e) => {
            println!("✗ {}", name);
            println!("   {}", e);
            tracing::warn!(target_id = %target, error = %e, "Correctness check failed");
            None
        }
    }
}

fn print_targets(targets: &[Target]) {
    println!("{} frameworks", targets.len());
    for target in targets {
        println!("- {}", target.listing());
    }
}

/// Rank the table in place. Failures are reported, never returned.
fn arrange(config: &BenchConfig) {
    println!();
    println!("Arranging results...");

    let path = config.paths.results_dir.join(TABLE_FILE);
    match rank_file(&path) {
        Ok(table) => {
            println!("Parsed {} valid results", table.len());
            println!();
            println!("{}", table.render());
        }
        Err(e) => {
            eprintln!("✗ Could not arrange results: {}", e);
            tracing::warn!(error = %e, "Skipping arrange step");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_applies_cli_overrides() {
        let args = RunArgs {
            targets: vec!["bun/hono".to_string()],
            time: Some(3),
            connections: Some(16),
            runs: Some(5),
        };
        let config = load_config("framebench-missing-config.yaml", args).unwrap();
        assert_eq!(config.load.time_secs, 3);
        assert_eq!(config.load.connections, 16);
        assert_eq!(config.load.runs, 5);
        assert_eq!(config.allow, vec![Target::new("bun", "hono").unwrap()]);
    }

    #[test]
    fn test_load_config_rejects_zero_runs() {
        let args = RunArgs {
            runs: Some(0),
            ..RunArgs::default()
        };
        assert!(load_config("framebench-missing-config.yaml", args).is_err());
    }
}
