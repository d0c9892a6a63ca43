// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! All types validate their invariants at creation time.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::HardValidationError;

/// Suffix marking a framework that lives in a directory with an `index` entry.
const INDEX_SUFFIX: &str = "index";

/// One benchmarkable runtime/framework combination.
///
/// Equality, hashing and ordering only consider `runtime/framework`; the index
/// flag is a hint about where the entry file lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target {
    runtime: String,
    framework: String,
    index: bool,
}

impl Target {
    /// Create a new Target with validation.
    pub fn new(
        runtime: impl Into<String>,
        framework: impl Into<String>,
    ) -> Result<Self, HardValidationError> {
        let runtime = runtime.into();
        let framework = framework.into();

        for (part, value) in [("runtime", &runtime), ("framework", &framework)] {
            if value.is_empty() {
                return Err(HardValidationError::InvalidTarget {
                    value: format!("{}/{}", runtime, framework),
                    reason: format!("{} cannot be empty", part),
                });
            }
            if value == "." || value == ".." {
                return Err(HardValidationError::InvalidTarget {
                    value: format!("{}/{}", runtime, framework),
                    reason: format!("{} cannot be a relative path component", part),
                });
            }
            if value.chars().any(|c| c == '/' || c == '\\' || c.is_whitespace()) {
                return Err(HardValidationError::InvalidTarget {
                    value: format!("{}/{}", runtime, framework),
                    reason: format!("{} must not contain separators or whitespace", part),
                });
            }
        }

        Ok(Self {
            runtime,
            framework,
            index: false,
        })
    }

    /// Mark the target as a directory framework with an `index` entry file.
    pub fn with_index(mut self, index: bool) -> Self {
        self.index = index;
        self
    }

    /// Parse `runtime/framework` or `runtime/framework/index`.
    pub fn parse(value: &str) -> Result<Self, HardValidationError> {
        let parts: Vec<&str> = value.trim().split('/').collect();
        match parts.as_slice() {
            [runtime, framework] => Self::new(*runtime, *framework),
            [runtime, framework, suffix] if *suffix == INDEX_SUFFIX => {
                Ok(Self::new(*runtime, *framework)?.with_index(true))
            }
            _ => Err(HardValidationError::InvalidTarget {
                value: value.to_string(),
                reason: "expected runtime/framework or runtime/framework/index".to_string(),
            }),
        }
    }

    /// Runtime variant name (e.g. `bun`).
    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    /// Framework name (e.g. `elysia`).
    pub fn framework(&self) -> &str {
        &self.framework
    }

    /// Whether the framework is a directory with an `index` entry file.
    pub fn is_index(&self) -> bool {
        self.index
    }

    /// Structural identity: `runtime/framework`.
    pub fn id(&self) -> String {
        format!("{}/{}", self.runtime, self.framework)
    }

    /// Listing form, which keeps the `/index` suffix for directory frameworks.
    pub fn listing(&self) -> String {
        if self.index {
            format!("{}/{}/{}", self.runtime, self.framework, INDEX_SUFFIX)
        } else {
            self.id()
        }
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.runtime == other.runtime && self.framework == other.framework
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.runtime.hash(state);
        self.framework.hash(state);
    }
}

impl PartialOrd for Target {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Target {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(&other.id())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.runtime, self.framework)
    }
}

impl TryFrom<String> for Target {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.listing()
    }
}

/// Validated network port.
/// Must be in range 1-65535 (0 is reserved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Create a new Port with validation.
    pub fn new(port: u16) -> Result<Self, HardValidationError> {
        if port == 0 {
            return Err(HardValidationError::InvalidPort {
                port,
                reason: "Port 0 is reserved and cannot be used".to_string(),
            });
        }
        Ok(Self(port))
    }

    /// Get the inner port value.
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = HardValidationError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parse() {
        let target = Target::parse("bun/elysia").unwrap();
        assert_eq!(target.runtime(), "bun");
        assert_eq!(target.framework(), "elysia");
        assert!(!target.is_index());

        let indexed = Target::parse("node/uws/index").unwrap();
        assert!(indexed.is_index());
        assert_eq!(indexed.listing(), "node/uws/index");
        assert_eq!(indexed.to_string(), "node/uws");
    }

    #[test]
    fn test_target_invalid() {
        assert!(Target::parse("").is_err());
        assert!(Target::parse("bun").is_err());
        assert!(Target::parse("bun/").is_err());
        assert!(Target::parse("bun/elysia/main").is_err());
        assert!(Target::parse("bun/../etc").is_err());
        assert!(Target::new("bun", "my framework").is_err());
    }

    #[test]
    fn test_target_equality_ignores_index_flag() {
        let plain = Target::parse("node/uws").unwrap();
        let indexed = Target::parse("node/uws/index").unwrap();
        assert_eq!(plain, indexed);
    }

    #[test]
    fn test_target_ordering_is_lexicographic_by_id() {
        let mut targets = vec![
            Target::parse("node/hono").unwrap(),
            Target::parse("bun/hono").unwrap(),
            Target::parse("bun/elysia").unwrap(),
        ];
        targets.sort();
        let ids: Vec<String> = targets.iter().map(Target::id).collect();
        assert_eq!(ids, vec!["bun/elysia", "bun/hono", "node/hono"]);
    }

    #[test]
    fn test_port_valid() {
        assert!(Port::new(3000).is_ok());
        assert!(Port::new(65535).is_ok());
    }

    #[test]
    fn test_port_invalid() {
        assert!(Port::new(0).is_err());
    }
}
