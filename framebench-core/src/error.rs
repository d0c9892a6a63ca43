// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for framebench.
//!
//! Explicit enum error types per concern. No `Box<dyn Error>` in the
//! library crates - every failure the pipeline can observe has a variant.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Target;

/// Top-level error type for the framebench orchestrator.
#[derive(Debug, Error)]
pub enum BenchError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Pipeline Errors
    // =========================================================================
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(#[from] StateTransitionError),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Correctness check failed: {0}")]
    Correctness(#[from] CorrectnessError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors prevent the run from starting.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid port: {port} - {reason}")]
    InvalidPort { port: u16, reason: String },

    #[error("Invalid target '{value}': {reason}")]
    InvalidTarget { value: String, reason: String },
}

/// State transition errors for the server process state machine.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Cannot transition from {from} to {to} for target {target}")]
    InvalidTransition {
        target: Target,
        from: &'static str,
        to: &'static str,
    },
}

/// Failures while resolving or launching a target's server.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("No launcher configured for runtime '{runtime}'")]
    UnknownRuntime { runtime: String },

    #[error("Entry file not found for {target} (looked for {candidates:?})")]
    EntryNotFound {
        target: Target,
        candidates: Vec<PathBuf>,
    },

    #[error("Failed to spawn server for {target}: {reason}")]
    SpawnFailed { target: Target, reason: String },

    #[error("Server state error: {0}")]
    State(#[from] StateTransitionError),

    #[error("Server for {target} exposes no {stream} pipe")]
    MissingPipe {
        target: Target,
        stream: &'static str,
    },
}

/// Retry client failures. Network errors and timeouts are both retryable.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<RequestError>,
    },
}

impl RequestError {
    /// Unwrap an `Exhausted` error down to the failure of the final attempt.
    pub fn last_failure(&self) -> &RequestError {
        match self {
            Self::Exhausted { last, .. } => last.last_failure(),
            other => other,
        }
    }
}

/// Correctness mismatches. Each one drops the target from the run.
#[derive(Debug, Error)]
pub enum CorrectnessError {
    #[error("{check}: result not match (expected {expected:?}, got {actual:?})")]
    BodyMismatch {
        check: &'static str,
        expected: String,
        actual: String,
    },

    #[error("{check}: header '{header}' not match (expected to contain {expected:?}, got {actual:?})")]
    HeaderMismatch {
        check: &'static str,
        header: &'static str,
        expected: &'static str,
        actual: Option<String>,
    },

    #[error("{check}: unexpected status {status}")]
    Status { check: &'static str, status: u16 },

    #[error("{check}: {source}")]
    Request {
        check: &'static str,
        #[source]
        source: RequestError,
    },
}

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;
