// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Target enumeration.
//!
//! Scans `<source_dir>/<runtime>/` for single-file frameworks (`.ts`/`.js`)
//! and directory frameworks (entry `index.ts`/`index.js`), applies the
//! deny-list, then the allow-list override, and returns a sorted,
//! deduplicated list.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BenchError, BenchResult, ProcessError};
use crate::types::Target;

/// Recognised entry-file extensions, in lookup order.
pub const SOURCE_EXTENSIONS: [&str; 2] = ["ts", "js"];

/// Enumerates benchmark targets from a source tree.
pub struct TargetEnumerator<'a> {
    source_dir: &'a Path,
    deny: &'a [Target],
    allow: &'a [Target],
}

impl<'a> TargetEnumerator<'a> {
    pub fn new(source_dir: &'a Path, deny: &'a [Target], allow: &'a [Target]) -> Self {
        Self {
            source_dir,
            deny,
            allow,
        }
    }

    /// Produce the ordered target list for this run.
    ///
    /// A non-empty allow-list replaces the discovered set entirely, so the
    /// source tree is not even read in that case.
    pub fn enumerate(&self) -> BenchResult<Vec<Target>> {
        let mut targets = if self.allow.is_empty() {
            self.discover()?
                .into_iter()
                .filter(|t| !self.deny.contains(t))
                .collect()
        } else {
            self.allow.to_vec()
        };

        targets.sort();
        targets.dedup();
        Ok(targets)
    }

    /// Scan the source tree without applying any filters.
    pub fn discover(&self) -> BenchResult<Vec<Target>> {
        let mut targets = Vec::new();

        for runtime_dir in read_dir_sorted(self.source_dir)? {
            if !runtime_dir.is_dir() {
                continue;
            }
            let Some(runtime) = file_name(&runtime_dir) else {
                continue;
            };

            for entry in read_dir_sorted(&runtime_dir)? {
                let Some(name) = file_name(&entry) else {
                    continue;
                };

                let target = if entry.is_dir() && !name.contains('.') {
                    Target::new(&runtime, &name).map(|t| t.with_index(true))
                } else if let Some(stem) = source_stem(&name) {
                    Target::new(&runtime, stem)
                } else {
                    continue;
                };

                match target {
                    Ok(target) => targets.push(target),
                    Err(e) => {
                        tracing::warn!(path = %entry.display(), error = %e, "Skipping entry")
                    }
                }
            }
        }

        Ok(targets)
    }
}

/// Resolve the entry file for a target: `<fw>.ts`, `<fw>.js`, then
/// `<fw>/index.ts`, `<fw>/index.js`.
pub fn resolve_entry(source_dir: &Path, target: &Target) -> Result<PathBuf, ProcessError> {
    let runtime_dir = source_dir.join(target.runtime());
    let mut candidates = Vec::with_capacity(4);

    let file_candidates = SOURCE_EXTENSIONS
        .iter()
        .map(|ext| runtime_dir.join(format!("{}.{}", target.framework(), ext)));
    let index_candidates = SOURCE_EXTENSIONS
        .iter()
        .map(|ext| runtime_dir.join(target.framework()).join(format!("index.{}", ext)));

    // Directory layout first when the target says so.
    let ordered: Vec<PathBuf> = if target.is_index() {
        index_candidates.chain(file_candidates).collect()
    } else {
        file_candidates.chain(index_candidates).collect()
    };

    for candidate in ordered {
        if candidate.is_file() {
            return Ok(candidate);
        }
        candidates.push(candidate);
    }

    Err(ProcessError::EntryNotFound {
        target: target.clone(),
        candidates,
    })
}

fn source_stem(name: &str) -> Option<&str> {
    SOURCE_EXTENSIONS.iter().find_map(|ext| {
        name.strip_suffix(*ext)
            .and_then(|rest| rest.strip_suffix('.'))
            .filter(|stem| !stem.is_empty())
    })
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}

fn read_dir_sorted(dir: &Path) -> BenchResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| BenchError::Io {
        context: "reading source directory",
        source: e,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BenchError::Io {
            context: "reading source directory entry",
            source: e,
        })?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}
