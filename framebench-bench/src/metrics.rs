// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Sample reduction, number formatting and the run report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::System;

use framebench_core::LoadShape;

/// Representative value of repeated runs.
///
/// Sorts ascending and takes index `(n - 1) / 2`, so an even count yields
/// the lower of the two middle samples. `None` for an empty set.
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(sorted[(sorted.len() - 1) / 2])
}

/// Mean of the values, `0` for an empty set.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// en-US rendering: grouped thousands, at most three fraction digits.
///
/// `51234.5678` renders as `51,234.568`, `20.0` as `20`.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let fixed = format!("{:.3}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let negative = value < 0.0 && (int_part != "0" || !frac_part.is_empty());
    let sign = if negative { "-" } else { "" };

    if frac_part.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac_part)
    }
}

/// Inverse of [`format_number`]: grouping commas are dropped.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Upper bound on the benchmark phase, in seconds.
pub fn estimate_secs(targets: usize, endpoints: usize, shape: &LoadShape) -> u64 {
    let per_target = endpoints as u64 * shape.time_secs * shape.runs as u64 + 1;
    targets as u64 * per_target
}

/// `m:ss`
pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// System information captured at benchmark time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system name
    pub os: String,
    /// OS version
    pub os_version: String,
    /// Kernel version (Linux)
    pub kernel_version: Option<String>,
    /// CPU model name
    pub cpu_model: String,
    /// Number of CPU cores
    pub cpu_cores: usize,
    /// Total system memory in bytes
    pub memory_bytes: u64,
    /// Hostname
    pub hostname: String,
}

impl SystemInfo {
    /// Collect current system information.
    pub fn collect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        Self {
            os: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version(),
            cpu_model: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: sys.cpus().len(),
            memory_bytes: sys.total_memory(),
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// Measurements for one endpoint of one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointReport {
    pub column: String,
    pub path: String,
    /// Requests per second, one per successful run
    pub samples: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    /// Not invoked because the target lacks the capability
    #[serde(default)]
    pub skipped: bool,
}

/// Everything measured for one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetReport {
    pub target: String,
    pub display_name: String,
    pub runtime: String,
    pub validation: bool,
    pub average: f64,
    pub endpoints: Vec<EndpointReport>,
}

/// Complete run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Suite identifier
    pub benchmark_suite: String,
    /// Orchestrator version
    pub version: String,
    /// Timestamp when the run started
    pub timestamp: DateTime<Utc>,
    /// System information
    pub system_info: SystemInfo,
    pub load: LoadShape,
    pub load_generator: String,
    /// Targets in benchmark order
    pub targets: Vec<TargetReport>,
}

impl RunReport {
    pub fn new(load: LoadShape, load_generator: impl Into<String>) -> Self {
        Self {
            benchmark_suite: "framebench".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            system_info: SystemInfo::collect(),
            load,
            load_generator: load_generator.into(),
            targets: Vec::new(),
        }
    }

    pub fn add_target(&mut self, target: TargetReport) {
        self.targets.push(target);
    }
}
