//! Per-run counters.
//!
//! Thread-safe atomic counters owned by one SnapshotRun (no process globals):
//! - outcomes: new / match / mismatch / failed_io (+ how many mismatches were applied in update mode)
//! - orphans: found / pruned
//! - files: written / removed / unchanged

use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::Outcome;
use crate::store::FlushOutcome;

#[derive(Debug, Default)]
pub struct RunMetrics {
    new: AtomicU64,
    matched: AtomicU64,
    mismatched: AtomicU64,
    updated: AtomicU64,
    failed_io: AtomicU64,

    orphans_found: AtomicU64,
    orphans_pruned: AtomicU64,

    files_written: AtomicU64,
    files_removed: AtomicU64,
    files_unchanged: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub new: u64,
    pub matched: u64,
    pub mismatched: u64,
    pub updated: u64,
    pub failed_io: u64,

    pub orphans_found: u64,
    pub orphans_pruned: u64,

    pub files_written: u64,
    pub files_removed: u64,
    pub files_unchanged: u64,
}

impl MetricsSnapshot {
    pub fn total_checks(&self) -> u64 {
        self.new + self.matched + self.mismatched + self.failed_io
    }
}

impl RunMetrics {
    pub fn record_outcome(&self, outcome: Outcome, updated: bool) {
        let c = match outcome {
            Outcome::New => &self.new,
            Outcome::Match => &self.matched,
            Outcome::Mismatch => &self.mismatched,
            Outcome::FailedIo => &self.failed_io,
        };
        c.fetch_add(1, Ordering::Relaxed);
        if updated {
            self.updated.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_orphans(&self, found: usize, pruned: usize) {
        self.orphans_found.fetch_add(found as u64, Ordering::Relaxed);
        self.orphans_pruned.fetch_add(pruned as u64, Ordering::Relaxed);
    }

    pub fn record_flush(&self, outcome: FlushOutcome) {
        let c = match outcome {
            FlushOutcome::Written(_) => &self.files_written,
            FlushOutcome::Removed => &self.files_removed,
            FlushOutcome::Unchanged => &self.files_unchanged,
        };
        c.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            new: self.new.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            mismatched: self.mismatched.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            failed_io: self.failed_io.load(Ordering::Relaxed),

            orphans_found: self.orphans_found.load(Ordering::Relaxed),
            orphans_pruned: self.orphans_pruned.load(Ordering::Relaxed),

            files_written: self.files_written.load(Ordering::Relaxed),
            files_removed: self.files_removed.load(Ordering::Relaxed),
            files_unchanged: self.files_unchanged.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.new.store(0, Ordering::Relaxed);
        self.matched.store(0, Ordering::Relaxed);
        self.mismatched.store(0, Ordering::Relaxed);
        self.updated.store(0, Ordering::Relaxed);
        self.failed_io.store(0, Ordering::Relaxed);

        self.orphans_found.store(0, Ordering::Relaxed);
        self.orphans_pruned.store(0, Ordering::Relaxed);

        self.files_written.store(0, Ordering::Relaxed);
        self.files_removed.store(0, Ordering::Relaxed);
        self.files_unchanged.store(0, Ordering::Relaxed);
    }
}
