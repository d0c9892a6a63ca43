// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Framebench Core Library
//!
//! Orchestration primitives for the framebench HTTP framework benchmark.
//! Provides target enumeration, configuration parsing, the server process
//! lifecycle, a bounded-retry HTTP client and the correctness suite.

pub mod config;
pub mod correctness;
pub mod discovery;
pub mod error;
pub mod process;
pub mod retry;
pub mod state;
pub mod types;
pub mod versions;

// Re-export commonly used types
pub use config::{
    BenchConfig, ConfigLoader, LoadShape, Overrides, PathsConfig, ReadinessConfig,
    ReadinessStrategy, RuntimeConfig,
};
pub use correctness::{Capabilities, CorrectnessSuite};
pub use discovery::TargetEnumerator;
pub use error::{
    BenchError, BenchResult, CorrectnessError, HardValidationError, ProcessError, RequestError,
};
pub use process::{release_port, LaunchSpec, ReadySource, ServerProcess};
pub use retry::{HttpResponse, RetryClient, RetryPolicy};
pub use state::{ProcessState, ProcessStateMachine};
pub use types::{Port, Target};
pub use versions::{ManifestVersions, VersionResolver};
