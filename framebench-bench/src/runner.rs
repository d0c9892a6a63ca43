// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark runner for one verified target.
//!
//! Mandatory endpoints are invoked `runs` times and reduced to their median.
//! Optional endpoints are skipped and recorded as N/A when the target lacks
//! the validation capability. A run that produces no throughput figure is
//! dropped from the median; it never fails the target.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use framebench_core::{Capabilities, Target};

use crate::error::RunnerError;
use crate::loadgen::{parse_reqs_per_sec, Endpoint, EndpointCommand, LoadGenerator};
use crate::metrics::{median, EndpointReport, TargetReport};
use crate::table::{Cell, ResultRow};

/// Measurements for one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointOutcome {
    pub endpoint: Endpoint,
    pub samples: Vec<f64>,
    pub skipped: bool,
}

impl EndpointOutcome {
    pub fn median(&self) -> Option<f64> {
        median(&self.samples)
    }

    pub fn cell(&self) -> Cell {
        if self.skipped {
            return Cell::NotApplicable;
        }
        match self.median() {
            Some(v) => Cell::Value(v),
            None => Cell::Missing,
        }
    }
}

/// Everything measured for one target.
#[derive(Debug, Clone)]
pub struct TargetOutcome {
    pub target: Target,
    pub display_name: String,
    pub capabilities: Capabilities,
    pub endpoints: Vec<EndpointOutcome>,
}

impl TargetOutcome {
    pub fn row(&self) -> ResultRow {
        ResultRow::new(
            self.display_name.clone(),
            self.target.runtime(),
            self.endpoints.iter().map(EndpointOutcome::cell).collect(),
        )
    }

    pub fn report(&self) -> TargetReport {
        TargetReport {
            target: self.target.id(),
            display_name: self.display_name.clone(),
            runtime: self.target.runtime().to_string(),
            validation: self.capabilities.validation,
            average: self.row().average(),
            endpoints: self
                .endpoints
                .iter()
                .map(|e| EndpointReport {
                    column: e.endpoint.column.to_string(),
                    path: e.endpoint.path.to_string(),
                    samples: e.samples.clone(),
                    median: e.median(),
                    skipped: e.skipped,
                })
                .collect(),
        }
    }
}

/// Drives a [`LoadGenerator`] over the planned endpoint commands.
pub struct BenchmarkRunner<G> {
    generator: G,
    commands: Vec<EndpointCommand>,
    runs: u32,
    results_dir: PathBuf,
}

impl<G: LoadGenerator> BenchmarkRunner<G> {
    pub fn new(generator: G, commands: Vec<EndpointCommand>, runs: u32, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            generator,
            commands,
            runs: runs.max(1),
            results_dir: results_dir.into(),
        }
    }

    /// Raw-output file for a target: `<results>/<runtime>/<framework>.txt`.
    pub fn raw_output_path(&self, target: &Target) -> PathBuf {
        raw_output_path(&self.results_dir, target)
    }

    /// Benchmark one target. The server must already be ready.
    ///
    /// Only failing to write the raw-output file is an error.
    pub async fn run(
        &self,
        target: &Target,
        display_name: &str,
        capabilities: Capabilities,
    ) -> Result<TargetOutcome, RunnerError> {
        let path = self.raw_output_path(target);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(RunnerError::io("creating raw output directory", dir))?;
        }
        let file = File::create(&path).map_err(RunnerError::io("creating raw output file", &path))?;
        let mut raw = BufWriter::new(file);

        let mut endpoints = Vec::with_capacity(self.commands.len());
        for command in &self.commands {
            let endpoint = command.endpoint;
            if !endpoint.is_mandatory() && !capabilities.validation {
                tracing::debug!(target_id = %target, endpoint = endpoint.column, "Skipping unsupported endpoint");
                endpoints.push(EndpointOutcome {
                    endpoint,
                    samples: Vec::new(),
                    skipped: true,
                });
                continue;
            }

            let samples = self.measure(target, command, &mut raw, &path).await?;
            endpoints.push(EndpointOutcome {
                endpoint,
                samples,
                skipped: false,
            });
        }

        raw.flush().map_err(RunnerError::io("flushing raw output file", &path))?;

        Ok(TargetOutcome {
            target: target.clone(),
            display_name: display_name.to_string(),
            capabilities,
            endpoints,
        })
    }

    async fn measure(
        &self,
        target: &Target,
        command: &EndpointCommand,
        raw: &mut BufWriter<File>,
        path: &Path,
    ) -> Result<Vec<f64>, RunnerError> {
        let command_line = command.command_line(self.generator.program());
        let mut samples = Vec::with_capacity(self.runs as usize);

        for run in 1..=self.runs {
            println!("{}", command_line);
            writeln!(raw, "{}", command_line).map_err(RunnerError::io("writing raw output", path))?;

            let output = match self.generator.invoke(command).await {
                Ok(output) => output,
                Err(e) => {
                    tracing::warn!(target_id = %target, endpoint = command.endpoint.column, run, error = %e, "Load generator run failed");
                    continue;
                }
            };
            println!("{}", output);
            writeln!(raw, "{}", output).map_err(RunnerError::io("writing raw output", path))?;

            match parse_reqs_per_sec(&output) {
                Some(value) => samples.push(value),
                None => tracing::warn!(
                    target_id = %target,
                    endpoint = command.endpoint.column,
                    run,
                    "No throughput figure in load generator output"
                ),
            }
        }

        tracing::debug!(target_id = %target, endpoint = command.endpoint.column, samples = ?samples, "Endpoint measured");
        Ok(samples)
    }
}

pub fn raw_output_path(results_dir: &Path, target: &Target) -> PathBuf {
    results_dir
        .join(target.runtime())
        .join(format!("{}.txt", target.framework()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::Mutex;

    use framebench_core::ConfigLoader;
    use tempfile::TempDir;

    /// Replays canned outputs per endpoint path, in order.
    struct ScriptedGenerator {
        outputs: Mutex<HashMap<&'static str, Vec<Option<String>>>>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedGenerator {
        fn new(script: &[(&'static str, &[Option<f64>])]) -> Self {
            let outputs = script
                .iter()
                .map(|(path, runs)| {
                    let runs = runs
                        .iter()
                        .map(|r| r.map(|v| format!("Statistics  Avg\n  Reqs/sec   {:.2}   1.00\n", v)))
                        .collect();
                    (*path, runs)
                })
                .collect();
            Self {
                outputs: Mutex::new(outputs),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl LoadGenerator for ScriptedGenerator {
        fn program(&self) -> &str {
            "scripted"
        }

        fn invoke(&self, command: &EndpointCommand) -> impl Future<Output = Result<String, RunnerError>> + Send {
            let path = command.endpoint.path;
            self.calls.lock().unwrap().push(path);
            let next = self
                .outputs
                .lock()
                .unwrap()
                .get_mut(path)
                .and_then(|runs| if runs.is_empty() { None } else { Some(runs.remove(0)) })
                .flatten();
            async move { Ok(next.unwrap_or_else(|| "socket: connection reset".to_string())) }
        }
    }

    fn runner(generator: ScriptedGenerator, runs: u32, dir: &TempDir) -> BenchmarkRunner<ScriptedGenerator> {
        let config = ConfigLoader::defaults().unwrap();
        let commands = EndpointCommand::plan(&config, &dir.path().join("payloads"));
        BenchmarkRunner::new(generator, commands, runs, dir.path())
    }

    #[tokio::test]
    async fn test_median_of_runs_and_skipped_optionals() {
        let dir = TempDir::new().unwrap();
        let generator = ScriptedGenerator::new(&[
            ("/", &[Some(5.0), Some(1.0), Some(3.0)]),
            ("/id/1?name=bun", &[Some(20.0), Some(20.0), Some(20.0)]),
            ("/json", &[Some(40.0), None, Some(30.0)]),
        ]);
        let runner = runner(generator, 3, &dir);
        let target = Target::new("bun", "elysia").unwrap();

        let outcome = runner
            .run(&target, "elysia@1.2.0", Capabilities { validation: false })
            .await
            .unwrap();

        let cells: Vec<Cell> = outcome.endpoints.iter().map(EndpointOutcome::cell).collect();
        assert_eq!(
            cells,
            vec![
                Cell::Value(3.0),
                Cell::Value(20.0),
                // [40, 30] sorted -> index 1
                Cell::Value(40.0),
                Cell::NotApplicable,
                Cell::NotApplicable,
                Cell::NotApplicable,
            ]
        );
        assert_eq!(outcome.row().average(), 21.0);

        // Optional endpoints were never invoked.
        let calls = runner.generator.calls();
        assert_eq!(calls.len(), 9);
        assert!(calls.iter().all(|p| !p.starts_with("/validate")));

        let raw = std::fs::read_to_string(dir.path().join("bun").join("elysia.txt")).unwrap();
        assert!(raw.contains("scripted --fasthttp -c 100 -d 10s http://127.0.0.1:3000/"));
        assert!(raw.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_capable_target_runs_every_endpoint() {
        let dir = TempDir::new().unwrap();
        let generator = ScriptedGenerator::new(&[
            ("/", &[Some(10.0)]),
            ("/id/1?name=bun", &[Some(20.0)]),
            ("/json", &[Some(30.0)]),
            ("/validate-zod", &[Some(1.0)]),
            ("/validate-valibot", &[Some(2.0)]),
            ("/validate-arktype", &[None]),
        ]);
        let runner = runner(generator, 1, &dir);
        let target = Target::new("node", "hono").unwrap();

        let outcome = runner
            .run(&target, "hono", Capabilities { validation: true })
            .await
            .unwrap();

        let row = outcome.row();
        assert_eq!(row.cells[3], Cell::Value(1.0));
        assert_eq!(row.cells[5], Cell::Missing);
        assert_eq!(row.average(), 20.0);
        assert_eq!(runner.generator.calls().len(), 6);

        let report = outcome.report();
        assert_eq!(report.target, "node/hono");
        assert!(report.validation);
        assert_eq!(report.endpoints[5].median, None);
    }

    #[tokio::test]
    async fn test_no_numbers_at_all() {
        let dir = TempDir::new().unwrap();
        let runner = runner(ScriptedGenerator::new(&[]), 2, &dir);
        let target = Target::new("deno", "oak").unwrap();

        let outcome = runner
            .run(&target, "oak", Capabilities::default())
            .await
            .unwrap();
        let row = outcome.row();
        assert!(row.cells[..3].iter().all(|c| *c == Cell::Missing));
        assert_eq!(row.average(), 0.0);
    }
}
