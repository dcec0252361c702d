//! Centralized configuration and builder for QuiverSnap.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - SnapshotConfig::from_env() reads the SNAPSHOT_* variables (and CI).
//! - SnapshotConfigBuilder for code that wants to pin values regardless of env.
//!
//! Defaults:
//! - snapshot_dir = "__snapshots__", file_extension = "snap"
//! - update_snapshots = false (verify mode)
//! - prune_orphans = true (unvisited entries are removed at finish and reported)
//! - ci = false (when true, NEW snapshots fail the test)
//! - serializer = "json", comparator = "text", reporters = "text"

use std::fmt;
use std::path::PathBuf;

use crate::key::TestId;

/// Top-level configuration of a snapshot run.
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    /// Directory that holds snapshot files.
    /// Env: SNAPSHOT_DIR (default "__snapshots__")
    pub snapshot_dir: PathBuf,

    /// Extension of snapshot files, without the dot.
    /// Env: SNAPSHOT_EXT (default "snap")
    pub file_extension: String,

    /// Update mode: mismatches and orphan removals are written and don't fail the run.
    /// Env: SNAPSHOT_UPDATE = 0|1 (default 0)
    pub update_snapshots: bool,

    /// Remove unvisited entries at finish.
    /// Env: SNAPSHOT_PRUNE_ORPHANS = 0|1 (default 1)
    pub prune_orphans: bool,

    /// CI mode: a missing snapshot is recorded but fails the test.
    /// Env: SNAPSHOT_CI, falling back to CI (default 0)
    pub ci: bool,

    /// Default serializer name (see StrategyRegistry).
    /// Env: SNAPSHOT_SERIALIZER (default "json")
    pub serializer: String,

    /// Default comparator name.
    /// Env: SNAPSHOT_COMPARATOR (default "text")
    pub comparator: String,

    /// Default reporter set name.
    /// Env: SNAPSHOT_REPORTERS (default "text")
    pub reporters: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("__snapshots__"),
            file_extension: "snap".to_string(),
            update_snapshots: false,
            prune_orphans: true,
            ci: false,
            serializer: "json".to_string(),
            comparator: "text".to_string(),
            reporters: "text".to_string(),
        }
    }
}

fn parse_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SnapshotConfig {
    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_string("SNAPSHOT_DIR") {
            cfg.snapshot_dir = PathBuf::from(v);
        }
        if let Some(v) = env_string("SNAPSHOT_EXT") {
            cfg.file_extension = v.trim_start_matches('.').to_string();
        }
        if let Ok(v) = std::env::var("SNAPSHOT_UPDATE") {
            cfg.update_snapshots = parse_flag(&v);
        }
        if let Ok(v) = std::env::var("SNAPSHOT_PRUNE_ORPHANS") {
            cfg.prune_orphans = parse_flag(&v);
        }
        match std::env::var("SNAPSHOT_CI") {
            Ok(v) => cfg.ci = parse_flag(&v),
            Err(_) => {
                if let Ok(v) = std::env::var("CI") {
                    cfg.ci = parse_flag(&v);
                }
            }
        }
        if let Some(v) = env_string("SNAPSHOT_SERIALIZER") {
            cfg.serializer = v;
        }
        if let Some(v) = env_string("SNAPSHOT_COMPARATOR") {
            cfg.comparator = v;
        }
        if let Some(v) = env_string("SNAPSHOT_REPORTERS") {
            cfg.reporters = v;
        }

        cfg
    }

    /// Path of the snapshot file that holds `test`'s snapshots.
    /// `a::b::c` => <snapshot_dir>/a/b/c.<ext>
    pub fn file_path_for(&self, test: &TestId) -> PathBuf {
        let mut p = self.snapshot_dir.clone();
        let mut parts = test.class.split("::").filter(|s| !s.is_empty()).peekable();
        if parts.peek().is_none() {
            return p.join(format!("snapshots.{}", self.file_extension));
        }
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                p.push(part);
            } else {
                p.push(format!("{}.{}", part, self.file_extension));
            }
        }
        p
    }

    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = dir.into();
        self
    }

    pub fn with_file_extension(mut self, ext: impl Into<String>) -> Self {
        self.file_extension = ext.into();
        self
    }

    pub fn with_update_snapshots(mut self, on: bool) -> Self {
        self.update_snapshots = on;
        self
    }

    pub fn with_prune_orphans(mut self, on: bool) -> Self {
        self.prune_orphans = on;
        self
    }

    pub fn with_ci(mut self, on: bool) -> Self {
        self.ci = on;
        self
    }

    pub fn with_serializer(mut self, name: impl Into<String>) -> Self {
        self.serializer = name.into();
        self
    }

    pub fn with_comparator(mut self, name: impl Into<String>) -> Self {
        self.comparator = name.into();
        self
    }

    pub fn with_reporters(mut self, name: impl Into<String>) -> Self {
        self.reporters = name.into();
        self
    }
}

impl fmt::Display for SnapshotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SnapshotConfig {{ \
             snapshot_dir: {}, \
             file_extension: {}, \
             update_snapshots: {}, \
             prune_orphans: {}, \
             ci: {}, \
             serializer: {}, \
             comparator: {}, \
             reporters: {} \
             }}",
            self.snapshot_dir.display(),
            self.file_extension,
            self.update_snapshots,
            self.prune_orphans,
            self.ci,
            self.serializer,
            self.comparator,
            self.reporters,
        )
    }
}

/// Builder that produces a SnapshotConfig.
#[derive(Clone, Debug)]
pub struct SnapshotConfigBuilder {
    cfg: SnapshotConfig,
}

impl Default for SnapshotConfigBuilder {
    fn default() -> Self {
        // Start from env, then allow overrides.
        Self {
            cfg: SnapshotConfig::from_env(),
        }
    }
}

impl SnapshotConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: SnapshotConfig::default(),
        }
    }

    pub fn snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cfg.snapshot_dir = dir.into();
        self
    }

    pub fn update_snapshots(mut self, on: bool) -> Self {
        self.cfg.update_snapshots = on;
        self
    }

    pub fn prune_orphans(mut self, on: bool) -> Self {
        self.cfg.prune_orphans = on;
        self
    }

    pub fn ci(mut self, on: bool) -> Self {
        self.cfg.ci = on;
        self
    }

    pub fn serializer(mut self, name: impl Into<String>) -> Self {
        self.cfg.serializer = name.into();
        self
    }

    pub fn comparator(mut self, name: impl Into<String>) -> Self {
        self.cfg.comparator = name.into();
        self
    }

    pub fn reporters(mut self, name: impl Into<String>) -> Self {
        self.cfg.reporters = name.into();
        self
    }

    pub fn build(self) -> SnapshotConfig {
        self.cfg
    }
}
