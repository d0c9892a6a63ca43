// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Results store: the leaderboard file written during a run.
//!
//! Rows are appended in benchmark order and flushed one by one, so an
//! interrupted run still leaves every completed target on disk. Ranking
//! re-reads the file and rewrites it once at the end.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::TableError;
use crate::loadgen::ENDPOINTS;
use crate::table::{render_header, ResultRow, ResultTable};

/// File name of the leaderboard inside a results directory.
pub const TABLE_FILE: &str = "results.md";

/// Append-only writer over `results/results.md`.
pub struct ResultsStore {
    path: PathBuf,
    file: File,
    rows: usize,
}

impl ResultsStore {
    /// Truncate the table and write its header.
    pub fn create(results_dir: &Path) -> Result<Self, TableError> {
        fs::create_dir_all(results_dir)
            .map_err(TableError::io("creating results directory", results_dir))?;

        let path = results_dir.join(TABLE_FILE);
        let mut file = File::create(&path).map_err(TableError::io("creating table", &path))?;
        writeln!(file, "{}", render_header(&ENDPOINTS))
            .and_then(|_| file.flush())
            .map_err(TableError::io("writing table header", &path))?;

        Ok(Self {
            path,
            file,
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Append one row and flush it to disk.
    pub fn append(&mut self, row: &ResultRow) -> Result<(), TableError> {
        writeln!(self.file, "{}", row.render())
            .and_then(|_| self.file.flush())
            .map_err(TableError::io("appending row", &self.path))?;
        self.rows += 1;
        tracing::debug!(path = %self.path.display(), name = %row.name, "Result row appended");
        Ok(())
    }
}

/// Read a table file as text.
///
/// Invalid UTF-8 (a row cut mid-character by a crash) is replaced rather
/// than rejected; the damaged row then fails the column-count gate.
pub(crate) fn read_table(path: &Path, action: &'static str) -> Result<String, TableError> {
    let bytes = fs::read(path).map_err(TableError::io(action, path))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Re-parse a table file and rewrite it sorted by descending average.
///
/// Returns the ranked table. Rows that fail the column-count gate are
/// dropped from the rewritten file.
pub fn rank_file(path: &Path) -> Result<ResultTable, TableError> {
    let content = read_table(path, "reading table")?;

    let mut table = ResultTable::parse(&content);
    table.rank();

    fs::write(path, table.render()).map_err(TableError::io("writing ranked table", path))?;
    tracing::info!(path = %path.display(), rows = table.len(), "Results ranked");
    Ok(table)
}
