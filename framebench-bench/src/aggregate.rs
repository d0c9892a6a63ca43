// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Merge result bundles produced by independent shards.
//!
//! Layout consumed: `<artifacts>/<shard>/results/results.md` plus
//! `<artifacts>/<shard>/results/<runtime>/*`. A shard whose bundle sits
//! directly under `<shard>/` is accepted as well. The request bodies a run
//! leaves in its payload directory are not results and are never copied.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TableError;
use crate::loadgen::PAYLOAD_DIR;
use crate::store::{read_table, TABLE_FILE};
use crate::table::ResultTable;

/// What a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    /// Shards whose table was merged
    pub shards: usize,
    /// Raw-output files copied into the results tree
    pub files_copied: usize,
    /// Copies that overwrote a file from an earlier shard
    pub collisions: usize,
    /// Rows in the final table
    pub rows: usize,
}

/// Shard collector writing one ranked table into the results directory.
pub struct Aggregator {
    artifacts_dir: PathBuf,
    results_dir: PathBuf,
}

impl Aggregator {
    pub fn new(artifacts_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
            results_dir: results_dir.into(),
        }
    }

    /// Copy every shard's raw outputs, merge and rank all rows, write the
    /// final table. Returns the ranked table alongside the summary.
    pub fn run(&self) -> Result<(ResultTable, AggregateSummary), TableError> {
        if !self.artifacts_dir.is_dir() {
            return Err(TableError::ArtifactsNotFound {
                path: self.artifacts_dir.clone(),
            });
        }
        fs::create_dir_all(&self.results_dir)
            .map_err(TableError::io("creating results directory", &self.results_dir))?;

        let shards = subdirectories(&self.artifacts_dir)?;
        tracing::info!(shards = shards.len(), dir = %self.artifacts_dir.display(), "Found artifact directories");

        let mut summary = AggregateSummary::default();
        let mut written = HashSet::new();
        let mut merged = ResultTable::new();

        for shard in &shards {
            let Some(bundle) = bundle_root(shard) else {
                tracing::warn!(shard = %shard.display(), "No {} found in shard", TABLE_FILE);
                continue;
            };

            self.copy_raw_outputs(&bundle, &mut written, &mut summary)?;

            let table_path = bundle.join(TABLE_FILE);
            let content = read_table(&table_path, "reading shard table")?;
            let table = ResultTable::parse(&content);
            tracing::debug!(shard = %shard.display(), rows = table.len(), "Shard table parsed");

            merged.merge(table);
            summary.shards += 1;
        }

        merged.rank();
        summary.rows = merged.len();

        let out = self.results_dir.join(TABLE_FILE);
        fs::write(&out, merged.render()).map_err(TableError::io("writing merged table", &out))?;
        tracing::info!(rows = summary.rows, path = %out.display(), "Results aggregated");

        Ok((merged, summary))
    }

    fn copy_raw_outputs(
        &self,
        bundle: &Path,
        written: &mut HashSet<PathBuf>,
        summary: &mut AggregateSummary,
    ) -> Result<(), TableError> {
        for runtime_dir in subdirectories(bundle)? {
            let Some(runtime) = runtime_dir.file_name() else {
                continue;
            };
            if runtime == PAYLOAD_DIR {
                continue;
            }
            let target_dir = self.results_dir.join(runtime);
            fs::create_dir_all(&target_dir).map_err(TableError::io("creating runtime directory", &target_dir))?;

            let entries = fs::read_dir(&runtime_dir).map_err(TableError::io("listing runtime directory", &runtime_dir))?;
            for entry in entries.flatten() {
                let source = entry.path();
                if !source.is_file() {
                    continue;
                }
                let dest = target_dir.join(entry.file_name());

                if !written.insert(dest.clone()) {
                    tracing::warn!(file = %dest.display(), from = %source.display(), "Result file collision, last shard wins");
                    summary.collisions += 1;
                }

                match fs::copy(&source, &dest) {
                    Ok(_) => summary.files_copied += 1,
                    Err(e) => tracing::warn!(from = %source.display(), error = %e, "Failed to copy result file"),
                }
            }
        }
        Ok(())
    }
}

/// Directory of a shard holding its table, if any.
fn bundle_root(shard: &Path) -> Option<PathBuf> {
    [shard.join("results"), shard.to_path_buf()]
        .into_iter()
        .find(|dir| dir.join(TABLE_FILE).is_file())
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, TableError> {
    let entries = fs::read_dir(dir).map_err(TableError::io("listing directory", dir))?;
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}
