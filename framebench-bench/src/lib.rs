// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Framebench measurement pipeline
//!
//! Drives the external load generator against a verified target, reduces
//! repeated runs to a median, and keeps the ranked results table.
//!
//! # Data Output
//!
//! - `results/results.md`: the ranked leaderboard
//! - `results/<runtime>/<framework>.txt`: raw load-generator output per target
//! - `results/report.json`: machine-readable run report

pub mod aggregate;
pub mod error;
pub mod loadgen;
pub mod metrics;
pub mod reporter;
pub mod runner;
pub mod store;
pub mod table;

pub use aggregate::{AggregateSummary, Aggregator};
pub use error::{RunnerError, TableError};
pub use loadgen::{Bombardier, Endpoint, EndpointCommand, EndpointKind, LoadGenerator, ENDPOINTS};
pub use metrics::{median, RunReport, SystemInfo, TargetReport};
pub use reporter::{JsonReporter, ReporterError};
pub use runner::{BenchmarkRunner, TargetOutcome};
pub use store::ResultsStore;
pub use table::{Cell, RankedRow, ResultRow, ResultTable};
