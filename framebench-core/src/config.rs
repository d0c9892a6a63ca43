// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! Every field is optional; an absent file yields the stock benchmark setup
//! (bombardier, 10s per endpoint, 100 connections, port 3000). Command-line
//! and environment overrides are merged once at entry via [`Overrides`], and
//! the resulting [`BenchConfig`] is passed down explicitly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult, HardValidationError};
use crate::types::{Port, Target};

/// Raw load-shape section as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawBenchSection {
    time_secs: u64,
    connections: u32,
    runs: u32,
    host: String,
    port: u16,
    load_generator: String,
    validation: bool,
}

impl Default for RawBenchSection {
    fn default() -> Self {
        Self {
            time_secs: 10,
            connections: 100,
            runs: 1,
            host: "127.0.0.1".to_string(),
            port: 3000,
            load_generator: "bombardier".to_string(),
            validation: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawPaths {
    source_dir: String,
    results_dir: String,
    artifacts_dir: String,
    manifest_dir: String,
}

impl Default for RawPaths {
    fn default() -> Self {
        Self {
            source_dir: "src".to_string(),
            results_dir: "results".to_string(),
            artifacts_dir: "artifacts".to_string(),
            manifest_dir: ".".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawReadiness {
    strategy: ReadinessStrategy,
    timeout_ms: u64,
    poll_interval_ms: u64,
    poll_attempts: u32,
    phrases: Vec<String>,
}

fn default_phrases() -> Vec<String> {
    ["Listening on", "listening on", "Server running"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl Default for RawReadiness {
    fn default() -> Self {
        Self {
            strategy: ReadinessStrategy::Output,
            timeout_ms: 30_000, // 30 seconds
            poll_interval_ms: 300,
            poll_attempts: 100,
            phrases: default_phrases(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRuntimeConfig {
    launcher: Vec<String>,
    #[serde(default)]
    readiness: Option<ReadinessStrategy>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    bench: RawBenchSection,
    paths: RawPaths,
    readiness: RawReadiness,
    runtimes: BTreeMap<String, RawRuntimeConfig>,
    deny: Vec<String>,
    packages: BTreeMap<String, String>,
}

/// How a freshly spawned server is judged ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStrategy {
    /// Match a "listening" phrase in the server's standard output.
    Output,
    /// Poll the health endpoint until it answers.
    Poll,
}

/// Load shape handed to the load generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadShape {
    pub time_secs: u64,
    pub connections: u32,
    pub runs: u32,
}

/// Validated readiness settings.
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    pub strategy: ReadinessStrategy,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    pub phrases: Vec<String>,
}

/// Validated launcher for one runtime variant.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub launcher: Vec<String>,
    pub readiness: Option<ReadinessStrategy>,
    pub env: BTreeMap<String, String>,
}

/// Filesystem layout of a run.
#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub source_dir: PathBuf,
    pub results_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub manifest_dir: PathBuf,
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub load: LoadShape,
    pub host: String,
    pub port: Port,
    pub load_generator: String,
    pub validation: bool,
    pub paths: PathsConfig,
    pub readiness: ReadinessConfig,
    pub runtimes: BTreeMap<String, RuntimeConfig>,
    pub deny: Vec<Target>,
    /// Explicit target override. When non-empty it replaces discovery.
    pub allow: Vec<Target>,
    pub packages: BTreeMap<String, String>,
    /// Runtime versions captured from the environment at entry.
    pub runtime_versions: BTreeMap<String, String>,
}

impl BenchConfig {
    /// Base URL of the server under test.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Absolute URL for a path on the server under test.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Readiness strategy for a runtime, honoring per-runtime overrides.
    pub fn readiness_for(&self, runtime: &str) -> ReadinessStrategy {
        self.runtimes
            .get(runtime)
            .and_then(|r| r.readiness)
            .unwrap_or(self.readiness.strategy)
    }

    /// Merge command-line and environment overrides, validating them.
    pub fn apply(mut self, overrides: Overrides) -> BenchResult<Self> {
        if let Some(time_secs) = overrides.time_secs {
            self.load.time_secs = time_secs;
        }
        if let Some(connections) = overrides.connections {
            self.load.connections = connections;
        }
        if let Some(runs) = overrides.runs {
            self.load.runs = runs;
        }
        ConfigLoader::validate_load(&self.load)?;

        if !overrides.targets.is_empty() {
            self.allow = overrides
                .targets
                .iter()
                .map(|t| Target::parse(t))
                .collect::<Result<Vec<_>, _>>()?;
        }

        self.runtime_versions.extend(overrides.runtime_versions);
        Ok(self)
    }
}

/// Overrides collected at process entry from CLI arguments and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub time_secs: Option<u64>,
    pub connections: Option<u32>,
    pub runs: Option<u32>,
    /// Explicit targets; CLI positionals win over the environment list.
    pub targets: Vec<String>,
    pub runtime_versions: BTreeMap<String, String>,
}

impl Overrides {
    /// Pick CLI targets when present, otherwise a comma-separated env list.
    pub fn select_targets(cli: Vec<String>, env: Option<&str>) -> Vec<String> {
        if !cli.is_empty() {
            return cli;
        }
        env.map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
    }
}

/// Stock launchers for the runtimes shipped with the benchmark.
fn default_runtimes() -> BTreeMap<String, RuntimeConfig> {
    let stock: [(&str, &[&str]); 3] = [
        ("bun", &["bun"]),
        ("deno", &["deno", "run", "--allow-net", "--allow-env"]),
        ("node", &["node"]),
    ];

    stock
        .iter()
        .map(|(name, argv)| {
            (
                name.to_string(),
                RuntimeConfig {
                    launcher: argv.iter().map(|a| a.to_string()).collect(),
                    readiness: None,
                    env: BTreeMap::new(),
                },
            )
        })
        .collect()
}

/// Package names behind the stock targets, used for display versions.
fn default_packages() -> BTreeMap<String, String> {
    let stock = [
        ("bun/bun", "bun"),
        ("bun/bun-web-standard", "bun"),
        ("bun/elysia", "elysia"),
        ("bun/express", "express"),
        ("bun/hono", "hono"),
        ("bun/kori", "@korix/kori"),
        ("bun/nbit", "@nbit/bun"),
        ("bun/wobe", "wobe"),
        ("deno/deno", "deno"),
        ("deno/deno-web-standard", "deno"),
        ("deno/hono", "hono"),
        ("deno/kori", "@korix/kori"),
        ("deno/oak", "@oak/oak"),
        ("node/node", "node"),
        ("node/node-web-standard", "node"),
        ("node/express", "express"),
        ("node/fastify", "fastify"),
        ("node/h3", "h3"),
        ("node/hono", "hono"),
        ("node/koa", "koa"),
        ("node/uws", "uWebSockets.js"),
    ];

    stock
        .iter()
        .map(|(target, package)| (target.to_string(), package.to_string()))
        .collect()
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> BenchResult<BenchConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BenchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| BenchError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load the file when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> BenchResult<BenchConfig> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_file(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::defaults()
        }
    }

    /// Validated stock configuration.
    pub fn defaults() -> BenchResult<BenchConfig> {
        Self::validate(RawConfig::default())
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> BenchResult<BenchConfig> {
        if content.trim().is_empty() {
            return Self::defaults();
        }

        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| BenchError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    /// Validate raw configuration and convert to validated types.
    fn validate(raw: RawConfig) -> BenchResult<BenchConfig> {
        let load = LoadShape {
            time_secs: raw.bench.time_secs,
            connections: raw.bench.connections,
            runs: raw.bench.runs,
        };
        Self::validate_load(&load)?;

        let port = Port::new(raw.bench.port)?;

        if raw.bench.host.trim().is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "bench.host",
                value: raw.bench.host,
                reason: "Host cannot be empty".to_string(),
            }
            .into());
        }

        if raw.bench.load_generator.trim().is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "bench.load_generator",
                value: raw.bench.load_generator,
                reason: "Load generator command cannot be empty".to_string(),
            }
            .into());
        }

        let readiness = Self::validate_readiness(raw.readiness)?;

        let mut runtimes = default_runtimes();
        for (name, runtime) in raw.runtimes {
            runtimes.insert(name.clone(), Self::validate_runtime(&name, runtime)?);
        }

        let mut packages = default_packages();
        packages.extend(raw.packages);

        let deny = raw
            .deny
            .iter()
            .map(|entry| Target::parse(entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BenchConfig {
            load,
            host: raw.bench.host,
            port,
            load_generator: raw.bench.load_generator,
            validation: raw.bench.validation,
            paths: PathsConfig {
                source_dir: PathBuf::from(raw.paths.source_dir),
                results_dir: PathBuf::from(raw.paths.results_dir),
                artifacts_dir: PathBuf::from(raw.paths.artifacts_dir),
                manifest_dir: PathBuf::from(raw.paths.manifest_dir),
            },
            readiness,
            runtimes,
            deny,
            allow: Vec::new(),
            packages,
            runtime_versions: BTreeMap::new(),
        })
    }

    fn validate_load(load: &LoadShape) -> Result<(), HardValidationError> {
        if load.time_secs == 0 || load.time_secs > 3600 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "time_secs",
                value: load.time_secs.to_string(),
                reason: "Must be between 1 and 3600 seconds".to_string(),
            });
        }

        if load.connections == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "connections",
                value: "0".to_string(),
                reason: "At least one connection is required".to_string(),
            });
        }

        if load.runs == 0 || load.runs > 100 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "runs",
                value: load.runs.to_string(),
                reason: "Must be between 1 and 100".to_string(),
            });
        }

        Ok(())
    }

    fn validate_readiness(raw: RawReadiness) -> Result<ReadinessConfig, HardValidationError> {
        if raw.timeout_ms == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "readiness.timeout_ms",
                value: "0".to_string(),
                reason: "Timeout must be greater than 0".to_string(),
            });
        }

        if raw.poll_attempts == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "readiness.poll_attempts",
                value: "0".to_string(),
                reason: "At least one poll attempt is required".to_string(),
            });
        }

        if raw.strategy == ReadinessStrategy::Output && raw.phrases.is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "phrases",
                context: "readiness with output strategy".to_string(),
            });
        }

        Ok(ReadinessConfig {
            strategy: raw.strategy,
            timeout: Duration::from_millis(raw.timeout_ms),
            poll_interval: Duration::from_millis(raw.poll_interval_ms),
            poll_attempts: raw.poll_attempts,
            phrases: raw.phrases,
        })
    }

    fn validate_runtime(
        name: &str,
        raw: RawRuntimeConfig,
    ) -> Result<RuntimeConfig, HardValidationError> {
        if raw.launcher.is_empty() || raw.launcher[0].trim().is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "launcher",
                context: format!("runtime '{}'", name),
            });
        }

        for key in raw.env.keys() {
            if key.is_empty() {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "env",
                    value: format!("empty key in runtime '{}'", name),
                    reason: "Environment variable names cannot be empty".to_string(),
                });
            }
        }

        Ok(RuntimeConfig {
            launcher: raw.launcher,
            readiness: raw.readiness,
            env: raw.env,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CONFIG: &str = r#"
bench:
  time_secs: 30
  connections: 128
  runs: 3
  port: 3000

readiness:
  strategy: poll
  poll_attempts: 50

runtimes:
  deno:
    launcher: ["deno", "run", "-A"]
    readiness: output
  workerd:
    launcher: ["workerd", "serve"]
    env:
      WORKERD_LOG: "info"

deny:
  - node/koa

packages:
  bun/elysia: elysia
"#;

    #[test]
    fn test_valid_config() {
        let config = ConfigLoader::load_string(VALID_CONFIG).unwrap();
        assert_eq!(config.load.time_secs, 30);
        assert_eq!(config.load.connections, 128);
        assert_eq!(config.load.runs, 3);
        assert_eq!(config.readiness.strategy, ReadinessStrategy::Poll);
        assert_eq!(config.readiness.poll_attempts, 50);
        assert_eq!(config.deny, vec![Target::parse("node/koa").unwrap()]);
        assert_eq!(config.packages.get("bun/elysia").unwrap(), "elysia");
    }

    #[test]
    fn test_runtime_overrides_merge_with_stock() {
        let config = ConfigLoader::load_string(VALID_CONFIG).unwrap();
        assert_eq!(config.runtimes["deno"].launcher, vec!["deno", "run", "-A"]);
        assert_eq!(config.runtimes["bun"].launcher, vec!["bun"]);
        assert!(config.runtimes.contains_key("workerd"));
        assert_eq!(config.readiness_for("deno"), ReadinessStrategy::Output);
        assert_eq!(config.readiness_for("bun"), ReadinessStrategy::Poll);
    }

    #[test]
    fn test_defaults_applied() {
        let config = ConfigLoader::load_string("").unwrap();
        assert_eq!(config.load.time_secs, 10);
        assert_eq!(config.load.connections, 100);
        assert_eq!(config.load.runs, 1);
        assert_eq!(config.port.value(), 3000);
        assert_eq!(config.readiness.timeout, Duration::from_secs(30));
        assert_eq!(config.base_url(), "http://127.0.0.1:3000");
        assert!(config.deny.is_empty());
        assert!(config.allow.is_empty());
        assert_eq!(config.packages["deno/oak"], "@oak/oak");
        assert_eq!(
            config.runtimes["deno"].launcher,
            vec!["deno", "run", "--allow-net", "--allow-env"]
        );
    }

    #[test]
    fn test_invalid_port_zero() {
        let yaml = r#"
bench:
  port: 0
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_zero_runs_rejected() {
        let yaml = r#"
bench:
  runs: 0
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_empty_launcher_rejected() {
        let yaml = r#"
runtimes:
  bun:
    launcher: []
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_malformed_deny_entry_rejected() {
        let yaml = r#"
deny:
  - elysia
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_overrides_replace_load_shape_and_targets() {
        let config = ConfigLoader::defaults().unwrap();
        let config = config
            .apply(Overrides {
                time_secs: Some(5),
                connections: Some(64),
                runs: Some(3),
                targets: vec!["bun/elysia".to_string(), "node/uws/index".to_string()],
                runtime_versions: BTreeMap::new(),
            })
            .unwrap();

        assert_eq!(config.load.time_secs, 5);
        assert_eq!(config.load.connections, 64);
        assert_eq!(config.load.runs, 3);
        assert_eq!(config.allow.len(), 2);
        assert!(config.allow[1].is_index());
    }

    #[test]
    fn test_invalid_override_rejected() {
        let config = ConfigLoader::defaults().unwrap();
        let result = config.apply(Overrides {
            runs: Some(0),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_select_targets_prefers_cli() {
        let cli = vec!["bun/elysia".to_string()];
        assert_eq!(
            Overrides::select_targets(cli, Some("node/hono")),
            vec!["bun/elysia"]
        );
        assert_eq!(
            Overrides::select_targets(Vec::new(), Some("node/hono, ,deno/oak")),
            vec!["node/hono", "deno/oak"]
        );
        assert!(Overrides::select_targets(Vec::new(), None).is_empty());
    }
}
