//! SnapshotStore: registry of loaded snapshot files, keyed by path.
//!
//! Map: path -> Arc<Slot>, where a slot is Mutex<Option<Loaded>>.
//! - the registry mutex is held only to find/create the slot (never during I/O);
//! - the slot mutex serializes loaders of the same path: the first one reads the file,
//!   everyone queued behind it gets the cached result. One physical read per path per run,
//!   whether the read succeeded or not;
//! - a failed load is cached as well and handed out again (rebuilt, since
//!   SnapshotError isn't Clone) to every later caller.

use std::collections::HashMap;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::codec;
use crate::error::{SnapResult, SnapshotError};

use super::file::SnapshotFile;
use super::io::read_snapshot_text;

/// Cached result of the one physical read of a path.
#[derive(Debug, Clone)]
enum Loaded {
    File(Arc<SnapshotFile>),
    Malformed { line: usize, message: String },
    Io { kind: ErrorKind, message: String },
}

impl Loaded {
    fn to_result(&self, path: &Path) -> SnapResult<Arc<SnapshotFile>> {
        match self {
            Loaded::File(f) => Ok(f.clone()),
            Loaded::Malformed { line, message } => Err(SnapshotError::MalformedFile {
                path: path.to_path_buf(),
                line: *line,
                message: message.clone(),
            }),
            Loaded::Io { kind, message } => Err(SnapshotError::io(
                path,
                io::Error::new(*kind, message.clone()),
            )),
        }
    }

    fn file(&self) -> Option<Arc<SnapshotFile>> {
        match self {
            Loaded::File(f) => Some(f.clone()),
            _ => None,
        }
    }
}

type Slot = Mutex<Option<Loaded>>;

#[derive(Debug, Default)]
pub struct SnapshotStore {
    slots: Mutex<HashMap<PathBuf, Arc<Slot>>>,
    physical_reads: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, path: &Path) -> Arc<Slot> {
        let mut slots = lock(&self.slots);
        slots
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Get (or load) the snapshot file at `path`. A missing file is an empty file.
    pub fn load(&self, path: &Path) -> SnapResult<Arc<SnapshotFile>> {
        let slot = self.slot(path);
        let mut guard = lock(&slot);
        if let Some(loaded) = guard.as_ref() {
            return loaded.to_result(path);
        }

        self.physical_reads.fetch_add(1, Ordering::Relaxed);
        let loaded = Self::read_file(path);
        let result = loaded.to_result(path);
        *guard = Some(loaded);
        result
    }

    fn read_file(path: &Path) -> Loaded {
        let text = match read_snapshot_text(path) {
            Ok(t) => t,
            Err(SnapshotError::Io { source, .. }) => {
                warn!("failed to read {}: {}", path.display(), source);
                return Loaded::Io {
                    kind: source.kind(),
                    message: source.to_string(),
                };
            }
            Err(e) => {
                return Loaded::Io {
                    kind: ErrorKind::Other,
                    message: e.to_string(),
                }
            }
        };

        match text {
            Some(text) => match codec::decode(&text) {
                Ok(entries) => {
                    debug!("loaded {} snapshot(s) from {}", entries.len(), path.display());
                    Loaded::File(Arc::new(SnapshotFile::from_entries(
                        path.to_path_buf(),
                        entries,
                        true,
                    )))
                }
                Err(e) => {
                    warn!("malformed snapshot file {}: {}", path.display(), e);
                    Loaded::Malformed {
                        line: e.line,
                        message: e.message,
                    }
                }
            },
            None => {
                debug!("no snapshot file at {}, starting empty", path.display());
                Loaded::File(Arc::new(SnapshotFile::empty(path)))
            }
        }
    }

    /// Already-loaded file, without touching the disk.
    pub fn get(&self, path: &Path) -> Option<Arc<SnapshotFile>> {
        let slot = lock(&self.slots).get(path).cloned()?;
        let guard = lock(&slot);
        guard.as_ref().and_then(Loaded::file)
    }

    /// All successfully loaded files, ordered by path.
    pub fn files(&self) -> Vec<Arc<SnapshotFile>> {
        let slots: Vec<Arc<Slot>> = lock(&self.slots).values().cloned().collect();
        let mut files: Vec<Arc<SnapshotFile>> = slots
            .iter()
            .filter_map(|s| lock(s).as_ref().and_then(Loaded::file))
            .collect();
        files.sort_by(|a, b| a.path().cmp(b.path()));
        files
    }

    /// Number of actual disk reads performed by `load`.
    pub fn physical_reads(&self) -> u64 {
        self.physical_reads.load(Ordering::Relaxed)
    }

    /// Forget every loaded file (used when a run restarts).
    pub fn clear(&self) {
        lock(&self.slots).clear();
        self.physical_reads.store(0, Ordering::Relaxed);
    }
}
