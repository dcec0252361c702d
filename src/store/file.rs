//! SnapshotFile: in-memory state of one snapshot file for the current run.
//!
//! One RwLock per file guards everything (entries, visited keys, claimed keys, flags):
//! - lookup/orphans/len take it shared;
//! - claim/record_visit/put/prune/flush take it exclusively.
//! Every mutation is one critical section, so a test abandoned mid-match leaves
//! either a complete entry+visit or nothing.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use crate::codec;
use crate::error::{SnapResult, SnapshotError};
use crate::key::SnapshotKey;

use super::io::{remove_if_exists, write_atomic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing changed; the file on disk was left byte-for-byte as it was.
    Unchanged,
    /// File rewritten with this many entries.
    Written(usize),
    /// All entries gone; the file was deleted (or never created).
    Removed,
}

#[derive(Debug, Default)]
struct FileState {
    entries: BTreeMap<String, String>,
    visited: BTreeSet<String>,
    claimed: HashSet<String>,
    dirty: bool,
    flushed: bool,
}

#[derive(Debug)]
pub struct SnapshotFile {
    path: PathBuf,
    existed_on_disk: bool,
    state: RwLock<FileState>,
}

impl SnapshotFile {
    pub(crate) fn from_entries(
        path: PathBuf,
        entries: BTreeMap<String, String>,
        existed_on_disk: bool,
    ) -> Self {
        Self {
            path,
            existed_on_disk,
            state: RwLock::new(FileState {
                entries,
                ..FileState::default()
            }),
        }
    }

    /// Empty file that is not backed by anything on disk yet.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self::from_entries(path.into(), BTreeMap::new(), false)
    }

    fn read(&self) -> RwLockReadGuard<'_, FileState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FileState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn existed_on_disk(&self) -> bool {
        self.existed_on_disk
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_dirty(&self) -> bool {
        self.read().dirty
    }

    /// Sorted copy of all keys currently held.
    pub fn keys(&self) -> Vec<String> {
        self.read().entries.keys().cloned().collect()
    }

    /// Copy of the whole mapping.
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.read().entries.clone()
    }

    /// Read-only lookup. Does not mark the key visited.
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.read().entries.get(key).cloned()
    }

    /// Reserve `key` for one invocation in this run.
    ///
    /// A second claim fails: AmbiguousSnapshot when the key has no scenario,
    /// DuplicateKey when the same scenario was used twice.
    pub fn claim(&self, key: &SnapshotKey) -> SnapResult<()> {
        let mut st = self.write();
        if st.claimed.insert(key.as_str().to_string()) {
            return Ok(());
        }
        if key.has_scenario() {
            Err(SnapshotError::DuplicateKey {
                key: key.to_string(),
            })
        } else {
            Err(SnapshotError::AmbiguousSnapshot {
                key: key.to_string(),
            })
        }
    }

    /// Idempotent.
    pub fn record_visit(&self, key: &str) {
        let mut st = self.write();
        if st.visited.insert(key.to_string()) {
            debug!("visit {} in {}", key, self.path.display());
        }
    }

    pub fn is_visited(&self, key: &str) -> bool {
        self.read().visited.contains(key)
    }

    pub fn visited(&self) -> BTreeSet<String> {
        self.read().visited.clone()
    }

    /// Upsert and mark the key visited, in one exclusive section.
    pub fn put(&self, key: &str, body: &str) {
        let mut st = self.write();
        Self::upsert(&mut st, key, body);
        st.visited.insert(key.to_string());
    }

    fn upsert(st: &mut FileState, key: &str, body: &str) {
        let changed = st.entries.get(key).map(|b| b != body).unwrap_or(true);
        if changed {
            st.entries.insert(key.to_string(), body.to_string());
            st.dirty = true;
        }
    }

    /// Keys held but never visited in this run.
    pub fn orphans(&self) -> Vec<String> {
        let st = self.read();
        st.entries
            .keys()
            .filter(|k| !st.visited.contains(*k))
            .cloned()
            .collect()
    }

    /// Delete every key not in `visited`. Returns removed keys (sorted).
    pub fn remove_orphans(&self, visited: &BTreeSet<String>) -> Vec<String> {
        let mut st = self.write();
        let removed: Vec<String> = st
            .entries
            .keys()
            .filter(|k| !visited.contains(*k))
            .cloned()
            .collect();
        for k in &removed {
            st.entries.remove(k);
        }
        if !removed.is_empty() {
            st.dirty = true;
        }
        removed
    }

    /// remove_orphans against this file's own visited set.
    pub fn prune_unvisited(&self) -> Vec<String> {
        let visited = self.visited();
        self.remove_orphans(&visited)
    }

    /// Write the current mapping to disk (tmp + rename). At most once per run.
    pub fn flush(&self) -> SnapResult<FlushOutcome> {
        let mut st = self.write();
        if st.flushed {
            return Err(SnapshotError::AlreadyFlushed(self.path.clone()));
        }
        st.flushed = true;

        if !st.dirty {
            debug!("flush: {} unchanged, skip", self.path.display());
            return Ok(FlushOutcome::Unchanged);
        }

        if st.entries.is_empty() {
            remove_if_exists(&self.path)?;
            st.dirty = false;
            return Ok(FlushOutcome::Removed);
        }

        let text = codec::encode(&st.entries);
        write_atomic(&self.path, text.as_bytes())?;
        st.dirty = false;
        Ok(FlushOutcome::Written(st.entries.len()))
    }
}
