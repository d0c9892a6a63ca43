// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Endpoint commands and the external load generator.
//!
//! The fixed endpoint list is crossed with the configured load shape once,
//! producing one immutable [`EndpointCommand`] per endpoint. The generator
//! itself sits behind [`LoadGenerator`] so the runner can be exercised
//! without bombardier installed.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use lazy_static::lazy_static;
use regex::Regex;
use tokio::process::Command;

use framebench_core::correctness::{JSON_PAYLOAD, VALIDATION_PAYLOAD};
use framebench_core::{BenchConfig, LoadShape};

use crate::error::RunnerError;
use crate::metrics::parse_number;

lazy_static! {
    /// Throughput line in bombardier's report, e.g. `Reqs/sec     51234.56`.
    static ref REQS_PER_SEC: Regex = Regex::new(r"Reqs/sec\s+(\d+[.|,]\d+)").expect("valid regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Whether an endpoint counts toward the row average.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Mandatory,
    /// Gated on the target's validation capability.
    Optional,
}

/// Request body sent by a POST endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Json,
    Validation,
}

impl Payload {
    pub const fn file_name(&self) -> &'static str {
        match self {
            Self::Json => "body.json",
            Self::Validation => "validation.json",
        }
    }

    pub const fn content(&self) -> &'static str {
        match self {
            Self::Json => JSON_PAYLOAD,
            Self::Validation => VALIDATION_PAYLOAD,
        }
    }
}

/// One benchmarked endpoint, and one column of the results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub column: &'static str,
    pub method: HttpMethod,
    pub path: &'static str,
    pub payload: Option<Payload>,
    pub kind: EndpointKind,
}

impl Endpoint {
    pub fn is_mandatory(&self) -> bool {
        self.kind == EndpointKind::Mandatory
    }
}

/// Endpoints in column order.
pub const ENDPOINTS: [Endpoint; 6] = [
    Endpoint {
        column: "Ping",
        method: HttpMethod::Get,
        path: "/",
        payload: None,
        kind: EndpointKind::Mandatory,
    },
    Endpoint {
        column: "Query",
        method: HttpMethod::Get,
        path: "/id/1?name=bun",
        payload: None,
        kind: EndpointKind::Mandatory,
    },
    Endpoint {
        column: "Body",
        method: HttpMethod::Post,
        path: "/json",
        payload: Some(Payload::Json),
        kind: EndpointKind::Mandatory,
    },
    Endpoint {
        column: "Zod",
        method: HttpMethod::Post,
        path: "/validate-zod",
        payload: Some(Payload::Validation),
        kind: EndpointKind::Optional,
    },
    Endpoint {
        column: "Valibot",
        method: HttpMethod::Post,
        path: "/validate-valibot",
        payload: Some(Payload::Validation),
        kind: EndpointKind::Optional,
    },
    Endpoint {
        column: "ArkType",
        method: HttpMethod::Post,
        path: "/validate-arktype",
        payload: Some(Payload::Validation),
        kind: EndpointKind::Optional,
    },
];

/// Directory inside a results root holding the request bodies.
pub const PAYLOAD_DIR: &str = ".payloads";

/// Write every request body under `dir`, so the load generator sends the
/// same bytes the correctness suite checked.
pub fn write_payloads(dir: &Path) -> Result<(), RunnerError> {
    std::fs::create_dir_all(dir).map_err(RunnerError::io("creating payload directory", dir))?;
    for payload in [Payload::Json, Payload::Validation] {
        let path = dir.join(payload.file_name());
        std::fs::write(&path, payload.content()).map_err(RunnerError::io("writing payload", &path))?;
    }
    Ok(())
}

/// One load-generator invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointCommand {
    pub endpoint: Endpoint,
    pub url: String,
    pub body_file: Option<PathBuf>,
    pub shape: LoadShape,
}

impl EndpointCommand {
    /// Cross the load shape with [`ENDPOINTS`].
    pub fn plan(config: &BenchConfig, payload_dir: &Path) -> Vec<Self> {
        ENDPOINTS
            .iter()
            .map(|endpoint| Self {
                endpoint: *endpoint,
                url: config.url(endpoint.path),
                body_file: endpoint.payload.map(|p| payload_dir.join(p.file_name())),
                shape: config.load,
            })
            .collect()
    }

    /// bombardier arguments for this invocation.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--fasthttp".to_string(),
            "-c".to_string(),
            self.shape.connections.to_string(),
            "-d".to_string(),
            format!("{}s", self.shape.time_secs),
        ];

        if self.endpoint.method == HttpMethod::Post {
            args.extend([
                "-m".to_string(),
                self.endpoint.method.as_str().to_string(),
                "-H".to_string(),
                "Content-Type:application/json".to_string(),
            ]);
            if let Some(file) = &self.body_file {
                args.push("-f".to_string());
                args.push(file.to_string_lossy().to_string());
            }
        }

        args.push(self.url.clone());
        args
    }

    /// Full command line, for the console and the raw-output files.
    pub fn command_line(&self, program: &str) -> String {
        std::iter::once(program.to_string())
            .chain(self.args())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// External tool that puts load on the server and reports throughput.
pub trait LoadGenerator: Send + Sync {
    /// Program name shown in command lines.
    fn program(&self) -> &str;

    /// Run one invocation and return its standard output.
    fn invoke(
        &self,
        command: &EndpointCommand,
    ) -> impl Future<Output = Result<String, RunnerError>> + Send;
}

/// bombardier run as a subprocess.
#[derive(Debug, Clone)]
pub struct Bombardier {
    program: String,
}

impl Bombardier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Bombardier {
    fn default() -> Self {
        Self::new("bombardier")
    }
}

impl LoadGenerator for Bombardier {
    fn program(&self) -> &str {
        &self.program
    }

    fn invoke(
        &self,
        command: &EndpointCommand,
    ) -> impl Future<Output = Result<String, RunnerError>> + Send {
        let program = self.program.clone();
        let args = command.args();

        async move {
            let output = Command::new(&program)
                .args(&args)
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|source| RunnerError::LoadGenerator {
                    program: program.clone(),
                    source,
                })?;

            if !output.status.success() {
                tracing::warn!(
                    program = %program,
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "Load generator exited unsuccessfully"
                );
            }

            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        }
    }
}

/// Extract the requests-per-second figure from load-generator output.
pub fn parse_reqs_per_sec(output: &str) -> Option<f64> {
    REQS_PER_SEC
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_number(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use framebench_core::ConfigLoader;

    const SAMPLE_OUTPUT: &str = "\
Bombarding http://127.0.0.1:3000/ for 10s using 100 connection(s)
Done!
Statistics        Avg      Stdev        Max
  Reqs/sec     51234.56    4123.12   60123.00
  Latency        1.95ms   312.45us    25.10ms
  HTTP codes:
    1xx - 0, 2xx - 512345, 3xx - 0, 4xx - 0, 5xx - 0
  Throughput:     7.53MB/s
";

    #[test]
    fn test_parse_reqs_per_sec() {
        assert_eq!(parse_reqs_per_sec(SAMPLE_OUTPUT), Some(51234.56));
        assert_eq!(parse_reqs_per_sec("connection refused"), None);
        assert_eq!(parse_reqs_per_sec(""), None);
    }

    #[test]
    fn test_parse_reqs_per_sec_comma_decimal() {
        assert_eq!(parse_reqs_per_sec("Reqs/sec  1234,5"), Some(12345.0));
    }

    #[test]
    fn test_endpoint_table() {
        let mandatory: Vec<_> = ENDPOINTS.iter().filter(|e| e.is_mandatory()).map(|e| e.column).collect();
        assert_eq!(mandatory, vec!["Ping", "Query", "Body"]);
        assert!(ENDPOINTS
            .iter()
            .filter(|e| e.method == HttpMethod::Post)
            .all(|e| e.payload.is_some()));
    }

    #[test]
    fn test_plan_and_args() {
        let config = ConfigLoader::load_string("bench:\n  time_secs: 5\n  connections: 64\n").unwrap();
        let commands = EndpointCommand::plan(&config, Path::new("results/payloads"));
        assert_eq!(commands.len(), ENDPOINTS.len());

        assert_eq!(
            commands[0].command_line("bombardier"),
            "bombardier --fasthttp -c 64 -d 5s http://127.0.0.1:3000/"
        );
        assert_eq!(
            commands[2].command_line("bombardier"),
            "bombardier --fasthttp -c 64 -d 5s -m POST -H Content-Type:application/json \
             -f results/payloads/body.json http://127.0.0.1:3000/json"
        );
        assert_eq!(
            commands[3].body_file.as_deref(),
            Some(Path::new("results/payloads/validation.json"))
        );
    }

    #[test]
    fn test_write_payloads() {
        let dir = tempfile::TempDir::new().unwrap();
        write_payloads(dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("body.json")).unwrap(), JSON_PAYLOAD);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("validation.json")).unwrap(),
            VALIDATION_PAYLOAD
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let config = ConfigLoader::defaults().unwrap();
        let commands = EndpointCommand::plan(&config, Path::new("payloads"));
        let generator = Bombardier::new("framebench-no-such-load-generator");
        assert!(matches!(
            generator.invoke(&commands[0]).await,
            Err(RunnerError::LoadGenerator { .. })
        ));
    }
}
