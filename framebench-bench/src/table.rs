// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Markdown results table.
//!
//! Layout: `| Framework | Runtime | Average | <one column per endpoint> |`.
//! A line is a row only when it splits into exactly `endpoints + 3`
//! non-empty cells and its average parses as a number; anything else
//! (header, divider, blank, corrupt or legacy rows) is skipped.

use std::fmt;

use crate::loadgen::{Endpoint, ENDPOINTS};
use crate::metrics::{format_number, mean, parse_number};

/// Leading columns before the per-endpoint figures.
const FIXED_COLUMNS: [&str; 3] = ["Framework", "Runtime", "Average"];

/// One per-endpoint figure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    /// Median requests per second.
    Value(f64),
    /// Optional endpoint the target does not support.
    NotApplicable,
    /// No run produced a number.
    Missing,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}", format_number(*v)),
            Self::NotApplicable => write!(f, "N/A"),
            Self::Missing => write!(f, "-"),
        }
    }
}

/// A freshly measured row, cells aligned with [`ENDPOINTS`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub name: String,
    pub runtime: String,
    pub cells: Vec<Cell>,
}

impl ResultRow {
    pub fn new(name: impl Into<String>, runtime: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            runtime: runtime.into(),
            cells,
        }
    }

    /// Mean over the mandatory endpoints that produced a value.
    ///
    /// Optional columns never count, even when measured.
    pub fn average(&self) -> f64 {
        let values: Vec<f64> = ENDPOINTS
            .iter()
            .zip(&self.cells)
            .filter(|(endpoint, _)| endpoint.is_mandatory())
            .filter_map(|(_, cell)| match cell {
                Cell::Value(v) => Some(*v),
                _ => None,
            })
            .collect();
        mean(&values)
    }

    pub fn render(&self) -> String {
        let mut line = format!(
            "| {} | {} | {} ",
            self.name,
            self.runtime,
            format_number(self.average())
        );
        for cell in &self.cells {
            line.push_str(&format!("| {} ", cell));
        }
        line.push('|');
        line
    }
}

/// Header and divider lines for `endpoints`.
pub fn render_header(endpoints: &[Endpoint]) -> String {
    let columns: Vec<&str> = FIXED_COLUMNS
        .iter()
        .copied()
        .chain(endpoints.iter().map(|e| e.column))
        .collect();

    let title = format!("| {} |", columns.join(" | "));
    let divider = format!(
        "| {} |",
        columns.iter().map(|c| "-".repeat(c.len().max(3))).collect::<Vec<_>>().join(" | ")
    );
    format!("{}\n{}", title, divider)
}

/// A row recovered from a rendered table, kept verbatim for rewriting.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow {
    pub name: String,
    pub runtime: String,
    pub average: f64,
    pub line: String,
}

impl RankedRow {
    /// `None` for anything that is not a well-formed row.
    pub fn parse(line: &str, endpoint_count: usize) -> Option<Self> {
        let compact = line.replace(' ', "");
        let cells: Vec<&str> = compact.split('|').filter(|c| !c.is_empty()).collect();
        if cells.len() != endpoint_count + FIXED_COLUMNS.len() {
            return None;
        }

        Some(Self {
            name: cells[0].to_string(),
            runtime: cells[1].to_string(),
            average: parse_number(cells[2])?,
            line: line.trim_end().to_string(),
        })
    }
}

impl From<&ResultRow> for RankedRow {
    fn from(row: &ResultRow) -> Self {
        Self {
            name: row.name.clone(),
            runtime: row.runtime.clone(),
            average: row.average(),
            line: row.render(),
        }
    }
}

/// Ordered rows under one shared header.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    rows: Vec<RankedRow>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse against the stock endpoint list.
    pub fn parse(content: &str) -> Self {
        Self::parse_with(content, ENDPOINTS.len())
    }

    pub fn parse_with(content: &str, endpoint_count: usize) -> Self {
        let rows = content
            .lines()
            .filter_map(|line| RankedRow::parse(line, endpoint_count))
            .collect();
        Self { rows }
    }

    pub fn push(&mut self, row: RankedRow) {
        self.rows.push(row);
    }

    /// Append another table's rows after this one's.
    pub fn merge(&mut self, other: ResultTable) {
        self.rows.extend(other.rows);
    }

    /// Stable sort by descending average.
    pub fn rank(&mut self) {
        self.rows.sort_by(|a, b| b.average.total_cmp(&a.average));
    }

    pub fn rows(&self) -> &[RankedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header, divider, then one line per row.
    pub fn render(&self) -> String {
        let mut out = render_header(&ENDPOINTS);
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.line);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, runtime: &str, values: [f64; 3]) -> ResultRow {
        let mut cells: Vec<Cell> = values.iter().map(|v| Cell::Value(*v)).collect();
        cells.extend([Cell::NotApplicable; 3]);
        ResultRow::new(name, runtime, cells)
    }

    #[test]
    fn test_average_ignores_not_applicable() {
        let r = row("hono", "bun", [10.0, 20.0, 30.0]);
        assert_eq!(r.average(), 20.0);
    }

    #[test]
    fn test_average_ignores_measured_optional_columns() {
        let mut r = row("hono", "bun", [10.0, 20.0, 30.0]);
        r.cells[3] = Cell::Value(1_000_000.0);
        assert_eq!(r.average(), 20.0);
    }

    #[test]
    fn test_average_with_missing_and_empty() {
        let mut r = row("koa", "node", [10.0, 20.0, 30.0]);
        r.cells[2] = Cell::Missing;
        assert_eq!(r.average(), 15.0);

        let empty = ResultRow::new("dead", "node", vec![Cell::Missing; 6]);
        assert_eq!(empty.average(), 0.0);
    }

    #[test]
    fn test_render_row() {
        let r = row("elysia@1.2.0", "bun", [51234.5, 40000.0, 30000.25]);
        assert_eq!(
            r.render(),
            "| elysia@1.2.0 | bun | 40,411.583 | 51,234.5 | 40,000 | 30,000.25 | N/A | N/A | N/A |"
        );
    }

    #[test]
    fn test_header_and_divider_are_not_rows() {
        let table = ResultTable::parse(&render_header(&ENDPOINTS));
        assert!(table.is_empty());
    }

    #[test]
    fn test_rendered_row_parses_back() {
        let r = row("hono@4.6.0", "deno", [100.0, 200.0, 300.0]);
        let parsed = RankedRow::parse(&r.render(), ENDPOINTS.len()).unwrap();
        assert_eq!(parsed.name, "hono@4.6.0");
        assert_eq!(parsed.runtime, "deno");
        assert_eq!(parsed.average, 200.0);
    }

    #[test]
    fn test_malformed_rows_are_dropped() {
        let content = format!(
            "{}\n{}\n| short | bun | 10 | 1 | 2 | 3 |\n| bad | bun | fast | 1 | 2 | 3 | 4 | 5 | 6 |\n\n",
            render_header(&ENDPOINTS),
            row("ok", "bun", [1.0, 2.0, 3.0]).render(),
        );
        let table = ResultTable::parse(&content);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].name, "ok");
    }

    #[test]
    fn test_rank_descending_and_stable() {
        let mut table = ResultTable::new();
        for (name, avg) in [("a", 15.0), ("b", 42.0), ("c", 8.0), ("d", 15.0)] {
            table.push(RankedRow::from(&row(name, "bun", [avg, avg, avg])));
        }
        table.rank();

        let names: Vec<&str> = table.rows().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "d", "c"]);
    }

    #[test]
    fn test_render_keeps_single_header() {
        let mut table = ResultTable::new();
        table.push(RankedRow::from(&row("a", "bun", [1.0, 1.0, 1.0])));
        let rendered = table.render();
        assert_eq!(rendered.matches("Framework").count(), 1);
        assert_eq!(ResultTable::parse(&rendered).len(), 1);
    }
}
