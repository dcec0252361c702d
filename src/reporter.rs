//! Reporters observe mismatches. They can't change the verdict.
//!
//! - PlainTextReporter: logs a line diff at warn level.
//! - CollectingReporter: keeps every report in memory (tests, custom rendering).

use std::sync::{Mutex, PoisonError};

use std::collections::BTreeMap;

use anyhow::Result;
use log::warn;

use crate::strategy::StrategyContext;

pub trait SnapshotReporter: Send + Sync {
    /// Whether this reporter can render output of the given serializer format.
    fn supports_format(&self, format: &str) -> bool;

    fn report(&self, key: &str, previous: &str, current: &str) -> Result<()>;

    /// Header-aware entry point; `Expect` calls this one.
    fn report_in(&self, ctx: &StrategyContext, previous: &str, current: &str) -> Result<()> {
        self.report(&ctx.key, previous, current)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextReporter;

impl SnapshotReporter for PlainTextReporter {
    fn supports_format(&self, _format: &str) -> bool {
        true
    }

    fn report(&self, key: &str, previous: &str, current: &str) -> Result<()> {
        warn!(
            "snapshot mismatch for {}:\n{}",
            key,
            render_line_diff(previous, current)
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchReport {
    pub key: String,
    pub previous: String,
    pub current: String,
    /// Headers of the test that produced the mismatch.
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct CollectingReporter {
    reports: Mutex<Vec<MismatchReport>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<MismatchReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, report: MismatchReport) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report);
    }
}

impl SnapshotReporter for CollectingReporter {
    fn supports_format(&self, _format: &str) -> bool {
        true
    }

    fn report(&self, key: &str, previous: &str, current: &str) -> Result<()> {
        self.report_in(&StrategyContext::new(key), previous, current)
    }

    fn report_in(&self, ctx: &StrategyContext, previous: &str, current: &str) -> Result<()> {
        self.push(MismatchReport {
            key: ctx.key.clone(),
            previous: previous.to_string(),
            current: current.to_string(),
            headers: ctx.headers.clone(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLine<'a> {
    Same(&'a str),
    Removed(&'a str),
    Added(&'a str),
}

/// Line diff via longest common subsequence. Snapshot bodies are small, O(n*m) is fine.
pub fn diff_lines<'a>(previous: &'a str, current: &'a str) -> Vec<DiffLine<'a>> {
    let a: Vec<&str> = previous.lines().collect();
    let b: Vec<&str> = current.lines().collect();
    let (n, m) = (a.len(), b.len());

    // lcs[i][j] = LCS length of a[i..] and b[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            out.push(DiffLine::Same(a[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            out.push(DiffLine::Removed(a[i]));
            i += 1;
        } else {
            out.push(DiffLine::Added(b[j]));
            j += 1;
        }
    }
    out.extend(a[i..].iter().copied().map(DiffLine::Removed));
    out.extend(b[j..].iter().copied().map(DiffLine::Added));
    out
}

/// `-`/`+`/` ` prefixed rendering of `diff_lines`.
pub fn render_line_diff(previous: &str, current: &str) -> String {
    let mut out = String::new();
    for line in diff_lines(previous, current) {
        let (sign, text) = match line {
            DiffLine::Same(t) => (' ', t),
            DiffLine::Removed(t) => ('-', t),
            DiffLine::Added(t) => ('+', t),
        };
        out.push(sign);
        out.push(' ');
        out.push_str(text);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_marks_changed_line() {
        let d = diff_lines("a\nb\nc", "a\nx\nc");
        assert_eq!(
            d,
            vec![
                DiffLine::Same("a"),
                DiffLine::Removed("b"),
                DiffLine::Added("x"),
                DiffLine::Same("c"),
            ]
        );
    }

    #[test]
    fn render_handles_appended_lines() {
        assert_eq!(render_line_diff("a", "a\nb"), "  a\n+ b\n");
    }

    #[test]
    fn collecting_reporter_keeps_reports() {
        let r = CollectingReporter::new();
        r.report("k", "old", "new").unwrap();
        assert_eq!(r.reports().len(), 1);
        assert_eq!(r.reports()[0].previous, "old");
    }
}
