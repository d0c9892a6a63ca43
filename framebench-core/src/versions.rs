// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Display-name version lookup.
//!
//! Maps a target to its package through the configured `packages` table,
//! then reads the version from the runtime versions captured at entry,
//! `package.json` dependencies, or `deno.json` imports.

use std::collections::BTreeMap;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::config::BenchConfig;
use crate::types::Target;

/// Packages that stand for the runtime itself.
const RUNTIME_PACKAGES: [&str; 3] = ["bun", "deno", "node"];

lazy_static! {
    /// Version inside an import specifier such as `jsr:@oak/oak@^16.1.0`.
    static ref IMPORT_VERSION: Regex = Regex::new(r"@[\^~]?([0-9][0-9.]*)").expect("valid regex");
}

/// Resolves versions for display names.
pub trait VersionResolver {
    /// Version string for the target, if known.
    fn version(&self, target: &Target) -> Option<String>;

    /// `framework@version`, or the bare framework name.
    fn display_name(&self, target: &Target) -> String {
        match self.version(target) {
            Some(version) if !version.is_empty() => {
                format!("{}@{}", target.framework(), version)
            }
            _ => target.framework().to_string(),
        }
    }
}

/// Reads versions from `package.json` / `deno.json` manifests.
#[derive(Debug, Clone, Default)]
pub struct ManifestVersions {
    packages: BTreeMap<String, String>,
    runtime_versions: BTreeMap<String, String>,
    package_json: Option<Value>,
    deno_json: Option<Value>,
}

impl ManifestVersions {
    /// Load manifests from the configured manifest directory.
    ///
    /// Missing or malformed manifests are logged and treated as empty.
    pub fn load(config: &BenchConfig) -> Self {
        let dir = &config.paths.manifest_dir;
        Self::new(
            config.packages.clone(),
            config.runtime_versions.clone(),
            read_manifest(&dir.join("package.json")),
            read_manifest(&dir.join("deno.json")),
        )
    }

    pub fn new(
        packages: BTreeMap<String, String>,
        runtime_versions: BTreeMap<String, String>,
        package_json: Option<Value>,
        deno_json: Option<Value>,
    ) -> Self {
        Self {
            packages,
            runtime_versions,
            package_json,
            deno_json,
        }
    }

    fn npm_version(&self, package: &str) -> Option<String> {
        let manifest = self.package_json.as_ref()?;
        ["dependencies", "devDependencies"]
            .iter()
            .filter_map(|section| manifest.get(section)?.get(package)?.as_str())
            .next()
            .map(|spec| spec.trim_start_matches(['^', '~']).to_string())
    }

    fn deno_version(&self, package: &str) -> Option<String> {
        let imports = self.deno_json.as_ref()?.get("imports")?.as_object()?;

        let specifier = imports.get(package).or_else(|| {
            imports
                .iter()
                .find(|(key, _)| key.ends_with(&format!("/{}", package)))
                .map(|(_, value)| value)
        })?;

        IMPORT_VERSION
            .captures(specifier.as_str()?)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

impl VersionResolver for ManifestVersions {
    fn version(&self, target: &Target) -> Option<String> {
        let package = self.packages.get(&target.id())?;

        if RUNTIME_PACKAGES.contains(&package.as_str()) {
            return self
                .runtime_versions
                .get(package)
                .map(|v| v.trim_start_matches('v').to_string())
                .filter(|v| !v.is_empty());
        }

        self.npm_version(package).or_else(|| {
            if target.runtime() == "deno" {
                self.deno_version(package)
            } else {
                None
            }
        })
    }
}

fn read_manifest(path: &Path) -> Option<Value> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed manifest");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver() -> ManifestVersions {
        let packages = [
            ("bun/elysia", "elysia"),
            ("bun/bun", "bun"),
            ("deno/oak", "@oak/oak"),
            ("node/hono", "hono"),
        ]
        .iter()
        .map(|(t, p)| (t.to_string(), p.to_string()))
        .collect();

        let mut runtime_versions = BTreeMap::new();
        runtime_versions.insert("bun".to_string(), "1.3.1".to_string());

        ManifestVersions::new(
            packages,
            runtime_versions,
            Some(json!({
                "dependencies": { "elysia": "^1.4.12" },
                "devDependencies": { "hono": "~4.10.2" }
            })),
            Some(json!({ "imports": { "@oak/oak": "jsr:@oak/oak@^16.1.0" } })),
        )
    }

    fn target(id: &str) -> Target {
        Target::parse(id).unwrap()
    }

    #[test]
    fn test_npm_versions_strip_range_prefix() {
        let r = resolver();
        assert_eq!(r.display_name(&target("bun/elysia")), "elysia@1.4.12");
        assert_eq!(r.display_name(&target("node/hono")), "hono@4.10.2");
    }

    #[test]
    fn test_runtime_version_from_environment() {
        assert_eq!(resolver().display_name(&target("bun/bun")), "bun@1.3.1");
    }

    #[test]
    fn test_deno_import_version() {
        assert_eq!(resolver().display_name(&target("deno/oak")), "oak@16.1.0");
    }

    #[test]
    fn test_unknown_target_uses_bare_name() {
        let r = resolver();
        assert_eq!(r.display_name(&target("node/koa")), "koa");
        assert_eq!(ManifestVersions::default().display_name(&target("bun/elysia")), "elysia");
    }
}
