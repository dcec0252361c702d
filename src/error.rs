//! Error taxonomy for QuiverSnap.
//!
//! - SnapshotError: everything a single call can fail with (per-test or per-file).
//! - RunError: what `SnapshotRun::finish` returns when the run as a whole fails.
//!
//! Per-test variants (Mismatch, AmbiguousSnapshot, DuplicateKey, Serialization, MissingInCi)
//! fail only the offending test. MalformedFile and Io raised by flush are run-level and
//! surface through RunError::Store, separately from assertion failures.

use std::path::PathBuf;

use thiserror::Error;

use crate::run::RunSummary;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed snapshot file {}: line {line}: {message}", .path.display())]
    MalformedFile {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("snapshot key '{key}' was already used in this run with the same scenario")]
    DuplicateKey { key: String },

    #[error(
        "snapshot '{key}' was already taken in this run; \
         call .scenario(..) to give each invocation a unique name"
    )]
    AmbiguousSnapshot { key: String },

    #[error("snapshot '{key}' does not match the stored snapshot")]
    Mismatch {
        key: String,
        previous: String,
        current: String,
    },

    #[error("failed to serialize value for snapshot '{key}': {reason}")]
    Serialization { key: String, reason: String },

    #[error("snapshot '{key}' does not exist and new snapshots are not allowed in CI mode")]
    MissingInCi { key: String },

    #[error("invalid scenario '{scenario}': {reason}")]
    InvalidScenario { scenario: String, reason: String },

    #[error("invalid snapshot name '{name}': {reason}")]
    InvalidSnapshotName { name: String, reason: String },

    #[error("unknown {kind} strategy '{name}'")]
    UnknownStrategy { kind: &'static str, name: String },

    #[error("run state: {0}")]
    RunState(&'static str),

    #[error("snapshot file {} was already flushed in this run", .0.display())]
    AlreadyFlushed(PathBuf),

    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SnapshotError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that mean the store itself can't be trusted (corruption, I/O).
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::MalformedFile { .. } | Self::Io { .. })
    }
}

/// Outcome of a failed `SnapshotRun::finish`.
#[derive(Debug, Error)]
pub enum RunError {
    /// Some tests mismatched/failed or orphans were pruned outside update mode.
    #[error("snapshot verification failed:\n{}", .0.report())]
    Failed(Box<RunSummary>),

    /// Snapshot files could not be read or written; results may not be durable.
    #[error("snapshot store failure ({} error(s)): {}", .0.len(), join_errors(.0))]
    Store(Vec<SnapshotError>),
}

impl RunError {
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            RunError::Failed(s) => Some(s),
            RunError::Store(_) => None,
        }
    }
}

fn join_errors(errs: &[SnapshotError]) -> String {
    errs.iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type SnapResult<T> = std::result::Result<T, SnapshotError>;
