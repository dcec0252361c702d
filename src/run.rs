//! SnapshotRun: explicit, process-wide state of one test run.
//!
//! Lifecycle: start() -> new_context(..) per test (from any thread) -> finish().
//!
//! finish():
//! - for every loaded file: compute orphans, prune them unless pruning is disabled;
//! - flush each file exactly once (flush errors are collected, other files still flush);
//! - Store errors (failed flush, malformed file seen by a test) => RunError::Store;
//! - failing records, or pruned orphans outside update mode => RunError::Failed(summary).
//!
//! The run can be started again after finish(); every start gets a fresh store.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{info, warn};

use crate::config::SnapshotConfig;
use crate::context::Expect;
use crate::engine::{MatchEngine, Outcome, RunRecord};
use crate::error::{RunError, SnapResult, SnapshotError};
use crate::key::TestId;
use crate::metrics::{MetricsSnapshot, RunMetrics};
use crate::store::{FlushOutcome, SnapshotFile, SnapshotStore};
use crate::strategy::StrategyRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    Idle,
    Started,
}

/// Malformed file seen during the run: (path, line, message).
type Corruption = (PathBuf, usize, String);

pub(crate) struct RunShared {
    pub(crate) config: SnapshotConfig,
    pub(crate) registry: StrategyRegistry,
    pub(crate) engine: MatchEngine,
    store: SnapshotStore,
    records: Mutex<Vec<RunRecord>>,
    corrupt: Mutex<Vec<Corruption>>,
    metrics: RunMetrics,
    phase: Mutex<RunPhase>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RunShared {
    pub(crate) fn load_file(&self, path: &Path) -> SnapResult<Arc<SnapshotFile>> {
        match self.store.load(path) {
            Ok(f) => Ok(f),
            Err(SnapshotError::MalformedFile {
                path,
                line,
                message,
            }) => {
                let mut corrupt = lock(&self.corrupt);
                if !corrupt.iter().any(|(p, _, _)| *p == path) {
                    corrupt.push((path.clone(), line, message.clone()));
                }
                Err(SnapshotError::MalformedFile {
                    path,
                    line,
                    message,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) fn push_record(&self, record: RunRecord) {
        self.metrics.record_outcome(record.outcome, record.updated);
        lock(&self.records).push(record);
    }
}

/// Pruned (or, with pruning disabled, merely detected) orphans of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanReport {
    pub path: PathBuf,
    pub keys: Vec<String>,
    pub pruned: bool,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub update_mode: bool,
    pub metrics: MetricsSnapshot,
    /// Every record of the run, ordered by (file, key).
    pub records: Vec<RunRecord>,
    pub orphans: Vec<OrphanReport>,
    pub files: Vec<(PathBuf, FlushOutcome)>,
}

impl RunSummary {
    pub fn failures(&self) -> impl Iterator<Item = &RunRecord> {
        self.records.iter().filter(|r| r.is_failure())
    }

    pub fn pruned_orphans(&self) -> usize {
        self.orphans
            .iter()
            .filter(|o| o.pruned)
            .map(|o| o.keys.len())
            .sum()
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none() && (self.update_mode || self.pruned_orphans() == 0)
    }

    /// Human-readable report: every failing record with old/new text, every orphan key.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let m = &self.metrics;
        let _ = writeln!(
            out,
            "snapshots: {} checked, {} new, {} matched, {} mismatched ({} updated), {} failed",
            m.total_checks(),
            m.new,
            m.matched,
            m.mismatched,
            m.updated,
            m.failed_io
        );

        for r in self.failures() {
            match r.outcome {
                Outcome::Mismatch => {
                    let _ = writeln!(out, "\n[MISMATCH] {} ({})", r.key, r.path.display());
                    let _ = writeln!(out, "--- previous");
                    let _ = writeln!(out, "{}", r.previous.as_deref().unwrap_or(""));
                    let _ = writeln!(out, "+++ current");
                    let _ = writeln!(out, "{}", r.current.as_deref().unwrap_or(""));
                }
                Outcome::FailedIo => {
                    let _ = writeln!(
                        out,
                        "\n[FAILED_IO] {} ({}): {}",
                        r.key,
                        r.path.display(),
                        r.failure.as_deref().unwrap_or("unknown error")
                    );
                }
                Outcome::New => {
                    let _ = writeln!(
                        out,
                        "\n[NEW in CI] {} ({}): snapshot did not exist",
                        r.key,
                        r.path.display()
                    );
                }
                Outcome::Match => {}
            }
        }

        for o in &self.orphans {
            let verb = if o.pruned { "pruned" } else { "kept" };
            let _ = writeln!(
                out,
                "\n[ORPHANS {}] {} ({} key(s))",
                verb,
                o.path.display(),
                o.keys.len()
            );
            for k in &o.keys {
                let _ = writeln!(out, "  - {}", k);
            }
        }
        out
    }
}

/// Handle to a run. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SnapshotRun {
    inner: Arc<RunShared>,
}

impl SnapshotRun {
    pub fn new(config: SnapshotConfig) -> Self {
        Self::with_registry(config, StrategyRegistry::default())
    }

    pub fn with_registry(config: SnapshotConfig, registry: StrategyRegistry) -> Self {
        let engine = MatchEngine::new(config.update_snapshots, config.ci);
        Self {
            inner: Arc::new(RunShared {
                config,
                registry,
                engine,
                store: SnapshotStore::new(),
                records: Mutex::new(Vec::new()),
                corrupt: Mutex::new(Vec::new()),
                metrics: RunMetrics::default(),
                phase: Mutex::new(RunPhase::Idle),
            }),
        }
    }

    /// Run configured from SNAPSHOT_* environment variables.
    pub fn from_env() -> Self {
        Self::new(SnapshotConfig::from_env())
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.inner.store
    }

    pub fn is_started(&self) -> bool {
        *lock(&self.inner.phase) == RunPhase::Started
    }

    pub fn start(&self) -> SnapResult<()> {
        let mut phase = lock(&self.inner.phase);
        if *phase == RunPhase::Started {
            return Err(SnapshotError::RunState("start() called on a run that is already started"));
        }
        self.inner.store.clear();
        lock(&self.inner.records).clear();
        lock(&self.inner.corrupt).clear();
        self.inner.metrics.reset();
        *phase = RunPhase::Started;
        info!("snapshot run started ({})", self.inner.config);
        Ok(())
    }

    /// Context for one test invocation.
    pub fn new_context(&self, test: TestId) -> SnapResult<Expect> {
        if !self.is_started() {
            return Err(SnapshotError::RunState("new_context() called before start()"));
        }
        Ok(Expect::new(self.inner.clone(), test))
    }

    /// Snapshot file holding `test`'s snapshots (loaded if needed).
    pub fn file_for(&self, test: &TestId) -> SnapResult<Arc<SnapshotFile>> {
        let path = self.inner.config.file_path_for(test);
        self.inner.load_file(&path)
    }

    pub fn records(&self) -> Vec<RunRecord> {
        lock(&self.inner.records).clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn finish(&self) -> Result<RunSummary, RunError> {
        {
            let mut phase = lock(&self.inner.phase);
            if *phase != RunPhase::Started {
                return Err(RunError::Store(vec![SnapshotError::RunState(
                    "finish() called on a run that was not started",
                )]));
            }
            *phase = RunPhase::Idle;
        }

        let cfg = &self.inner.config;
        let mut errors = Vec::new();
        let mut orphans = Vec::new();
        let mut files = Vec::new();

        for file in self.inner.store.files() {
            let found = file.orphans();
            if !found.is_empty() {
                let pruned = if cfg.prune_orphans {
                    let removed = file.prune_unvisited();
                    warn!(
                        "pruned {} orphan snapshot(s) from {}: {}",
                        removed.len(),
                        file.path().display(),
                        removed.join(", ")
                    );
                    true
                } else {
                    warn!(
                        "{} orphan snapshot(s) kept in {} (pruning disabled): {}",
                        found.len(),
                        file.path().display(),
                        found.join(", ")
                    );
                    false
                };
                self.inner
                    .metrics
                    .record_orphans(found.len(), if pruned { found.len() } else { 0 });
                orphans.push(OrphanReport {
                    path: file.path().to_path_buf(),
                    keys: found,
                    pruned,
                });
            }

            match file.flush() {
                Ok(outcome) => {
                    if let FlushOutcome::Written(n) = outcome {
                        info!("wrote {} snapshot(s) to {}", n, file.path().display());
                    }
                    self.inner.metrics.record_flush(outcome);
                    files.push((file.path().to_path_buf(), outcome));
                }
                Err(e) => {
                    warn!("flush failed: {}", e);
                    errors.push(e);
                }
            }
        }

        for (path, line, message) in lock(&self.inner.corrupt).drain(..) {
            errors.push(SnapshotError::MalformedFile {
                path,
                line,
                message,
            });
        }
        if !errors.is_empty() {
            return Err(RunError::Store(errors));
        }

        let mut records = lock(&self.inner.records).clone();
        records.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.key.cmp(&b.key)));

        let summary = RunSummary {
            update_mode: self.inner.engine.update_mode(),
            metrics: self.inner.metrics.snapshot(),
            records,
            orphans,
            files,
        };

        if summary.is_success() {
            info!(
                "snapshot run passed: {} checked, {} new, {} updated, {} orphan(s) pruned",
                summary.metrics.total_checks(),
                summary.metrics.new,
                summary.metrics.updated,
                summary.pruned_orphans()
            );
            Ok(summary)
        } else {
            warn!("snapshot run failed:\n{}", summary.report());
            Err(RunError::Failed(Box::new(summary)))
        }
    }
}
