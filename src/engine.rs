//! Matching engine: one key + freshly serialized text -> RunRecord.
//!
//! Algorithm:
//! 1. serialization failed, or the text can't be stored in the file format
//!    (contains the "\n\n\n" entry separator, starts with a blank line pair)
//!                          => FailedIo (key still marked visited, nothing stored)
//! 2. lookup(key) absent    => New; put right away (CI mode flags it as failing)
//! 3. comparator says equal => Match; record_visit, no mutation
//! 4. otherwise             => Mismatch; update mode replaces the entry (put),
//!                             verify mode only records the visit
//!
//! The raw outcome stays Mismatch in update mode; `updated` tells the aggregator
//! that it doesn't count as a failure.

use std::fmt;
use std::path::PathBuf;

use log::debug;

use crate::codec::{body_problem, normalize_body};
use crate::comparator::SnapshotComparator;
use crate::store::SnapshotFile;
use crate::strategy::StrategyContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    New,
    Match,
    Mismatch,
    FailedIo,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::New => "NEW",
            Outcome::Match => "MATCH",
            Outcome::Mismatch => "MISMATCH",
            Outcome::FailedIo => "FAILED_IO",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub key: String,
    pub path: PathBuf,
    pub outcome: Outcome,
    /// Fresh text (New / Mismatch).
    pub current: Option<String>,
    /// Stored text (Mismatch).
    pub previous: Option<String>,
    /// Why serialization failed (FailedIo).
    pub failure: Option<String>,
    /// Mismatch applied to the store in update mode.
    pub updated: bool,
    /// New snapshot created while running in CI mode.
    pub ci_rejected: bool,
}

impl RunRecord {
    fn new(key: &str, path: PathBuf, outcome: Outcome) -> Self {
        Self {
            key: key.to_string(),
            path,
            outcome,
            current: None,
            previous: None,
            failure: None,
            updated: false,
            ci_rejected: false,
        }
    }

    /// Does this record fail the run?
    pub fn is_failure(&self) -> bool {
        match self.outcome {
            Outcome::FailedIo => true,
            Outcome::Mismatch => !self.updated,
            Outcome::New => self.ci_rejected,
            Outcome::Match => false,
        }
    }
}

/// Everything one match needs.
pub struct MatchRequest<'a> {
    pub file: &'a SnapshotFile,
    /// Key and headers; handed to the comparator.
    pub ctx: &'a StrategyContext,
    /// Serializer output, or the reason it failed.
    pub serialized: Result<String, String>,
    pub comparator: &'a dyn SnapshotComparator,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchEngine {
    update_mode: bool,
    ci: bool,
}

impl MatchEngine {
    pub fn new(update_mode: bool, ci: bool) -> Self {
        Self { update_mode, ci }
    }

    pub fn update_mode(&self) -> bool {
        self.update_mode
    }

    pub fn check(&self, req: MatchRequest<'_>) -> RunRecord {
        let file = req.file;
        let key = req.ctx.key.as_str();
        let path = file.path().to_path_buf();

        let fresh = req
            .serialized
            .map(|text| normalize_body(&text))
            .and_then(|text| match body_problem(&text) {
                None => Ok(text),
                Some(problem) => Err(format!("snapshot text can't be stored: {problem}")),
            });
        let fresh = match fresh {
            Ok(text) => text,
            Err(reason) => {
                file.record_visit(key);
                let mut rec = RunRecord::new(key, path, Outcome::FailedIo);
                rec.failure = Some(reason);
                return rec;
            }
        };

        let stored = match file.lookup(key) {
            Some(s) => s,
            None => {
                file.put(key, &fresh);
                debug!("new snapshot {} in {}", key, file.path().display());
                let mut rec = RunRecord::new(key, path, Outcome::New);
                rec.current = Some(fresh);
                rec.ci_rejected = self.ci;
                return rec;
            }
        };

        if req.comparator.matches_in(&stored, &fresh, req.ctx) {
            file.record_visit(key);
            return RunRecord::new(key, path, Outcome::Match);
        }

        let mut rec = RunRecord::new(key, path, Outcome::Mismatch);
        if self.update_mode {
            file.put(key, &fresh);
            rec.updated = true;
        } else {
            file.record_visit(key);
        }
        rec.previous = Some(stored);
        rec.current = Some(fresh);
        rec
    }
}
