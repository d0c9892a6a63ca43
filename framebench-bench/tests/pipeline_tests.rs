// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Measurement pipeline tests: a shell script stands in for bombardier.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use framebench_bench::loadgen::{write_payloads, PAYLOAD_DIR};
use framebench_bench::store::{rank_file, TABLE_FILE};
use framebench_bench::{
    Aggregator, BenchmarkRunner, Bombardier, Cell, EndpointCommand, JsonReporter, ResultTable,
    ResultsStore, RunReport,
};
use framebench_core::{Capabilities, ConfigLoader, Target};

/// Fake load generator printing a fixed throughput per URL suffix.
fn fake_bombardier(dir: &Path) -> PathBuf {
    let script = dir.join("fake-bombardier");
    fs::write(
        &script,
        r#"#!/bin/sh
for last; do :; done
case "$last" in
  */json) echo "  Reqs/sec     30000.00    10.00   31000.00" ;;
  *name=bun) echo "  Reqs/sec     20000.50    10.00   21000.00" ;;
  */) echo "  Reqs/sec     10000.25    10.00   11000.00" ;;
  *) echo "connection refused" ;;
esac
"#,
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script
}

#[tokio::test]
async fn test_run_append_rank_report() {
    let dir = TempDir::new().unwrap();
    let results = dir.path().join("results");
    let config = ConfigLoader::load_string("bench:\n  time_secs: 1\n  runs: 3\n").unwrap();

    let payloads = results.join("payloads");
    write_payloads(&payloads).unwrap();

    let generator = Bombardier::new(fake_bombardier(dir.path()).to_string_lossy());
    let runner = BenchmarkRunner::new(
        generator,
        EndpointCommand::plan(&config, &payloads),
        config.load.runs,
        &results,
    );

    let mut store = ResultsStore::create(&results).unwrap();
    let mut report = RunReport::new(config.load, "fake-bombardier");

    let plain = Target::new("bun", "plain").unwrap();
    let outcome = runner.run(&plain, "plain", Capabilities::default()).await.unwrap();
    store.append(&outcome.row()).unwrap();
    report.add_target(outcome.report());

    let capable = Target::new("node", "capable").unwrap();
    let outcome = runner
        .run(&capable, "capable@1.0.0", Capabilities { validation: true })
        .await
        .unwrap();
    let row = outcome.row();
    // Validation endpoints answer with no figure.
    assert_eq!(row.cells[3], Cell::Missing);
    store.append(&row).unwrap();
    report.add_target(outcome.report());

    let ranked = rank_file(store.path()).unwrap();
    assert_eq!(ranked.len(), 2);
    assert!((ranked.rows()[0].average - 20000.25).abs() < 0.01);

    let content = fs::read_to_string(results.join(TABLE_FILE)).unwrap();
    assert!(content.contains("| plain | bun | 20,000.25 | 10,000.25 | 20,000.5 | 30,000 | N/A | N/A | N/A |"));
    assert!(content.contains("| capable@1.0.0 | node | 20,000.25 | 10,000.25 | 20,000.5 | 30,000 | - | - | - |"));

    let raw = fs::read_to_string(results.join("bun").join("plain.txt")).unwrap();
    assert_eq!(raw.matches("--fasthttp").count(), 9);

    let path = JsonReporter::new(&results).unwrap().save(&report).unwrap();
    let loaded = JsonReporter::load(path).unwrap();
    assert_eq!(loaded.targets[0].endpoints[0].samples.len(), 3);
}

#[tokio::test]
async fn test_shard_results_aggregate() {
    let dir = TempDir::new().unwrap();
    let config = ConfigLoader::load_string("bench:\n  time_secs: 1\n").unwrap();
    let generator_path = fake_bombardier(dir.path());

    for (shard, runtime) in [("shard-bun", "bun"), ("shard-node", "node")] {
        let results = dir.path().join("artifacts").join(shard).join("results");
        let payloads = results.join(PAYLOAD_DIR);
        write_payloads(&payloads).unwrap();

        let runner = BenchmarkRunner::new(
            Bombardier::new(generator_path.to_string_lossy()),
            EndpointCommand::plan(&config, &payloads),
            1,
            &results,
        );
        let mut store = ResultsStore::create(&results).unwrap();
        let target = Target::new(runtime, "hono").unwrap();
        let outcome = runner.run(&target, "hono", Capabilities::default()).await.unwrap();
        store.append(&outcome.row()).unwrap();
    }

    let merged_dir = dir.path().join("results");
    let (table, summary) = Aggregator::new(dir.path().join("artifacts"), &merged_dir)
        .run()
        .unwrap();
    assert_eq!(summary.shards, 2);
    assert_eq!(summary.collisions, 0);
    assert_eq!(summary.files_copied, 2);
    assert_eq!(table.len(), 2);
    assert!(!merged_dir.join(PAYLOAD_DIR).exists());
    assert!(merged_dir.join("bun").join("hono.txt").is_file());
    assert!(merged_dir.join("node").join("hono.txt").is_file());

    let reparsed = ResultTable::parse(&fs::read_to_string(merged_dir.join(TABLE_FILE)).unwrap());
    assert_eq!(reparsed.len(), 2);
}
