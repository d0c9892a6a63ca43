// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Error types for the measurement pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Results table read/write failures.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Artifacts directory not found: {}", path.display())]
    ArtifactsNotFound { path: PathBuf },

    #[error("I/O error while {context} '{}': {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TableError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            context,
            path,
            source,
        }
    }
}

/// Benchmark runner failures.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Load generator '{program}' could not be run: {source}")]
    LoadGenerator {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while {context} '{}': {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Table(#[from] TableError),
}

impl RunnerError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            context,
            path,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_path() {
        let err = TableError::io("reading table", "results/results.md")(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let msg = err.to_string();
        assert!(msg.contains("reading table"));
        assert!(msg.contains("results/results.md"));
    }

    #[test]
    fn test_table_error_converts() {
        let err: RunnerError = TableError::io("writing row", "x.md")(std::io::Error::other("boom")).into();
        assert!(matches!(err, RunnerError::Table(_)));
    }
}
