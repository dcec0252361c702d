//! Raw file I/O for snapshot files.
//!
//! - read_snapshot_text: missing file => Ok(None), not an error.
//! - write_atomic: <path>.tmp + sync_all + rename; parent dirs are created.
//! - remove_if_exists: used when a file ends up with no entries.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{SnapResult, SnapshotError};

pub(crate) fn read_snapshot_text(path: &Path) -> SnapResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SnapshotError::io(path, e)),
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> SnapResult<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| SnapshotError::io(dir, e))?;
        }
    }

    let tmp = tmp_path_for(path);
    let mut f = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp)
        .map_err(|e| SnapshotError::io(&tmp, e))?;
    f.write_all(data).map_err(|e| SnapshotError::io(&tmp, e))?;
    f.sync_all().map_err(|e| SnapshotError::io(&tmp, e))?;
    drop(f);

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        SnapshotError::io(path, e)
    })
}

pub(crate) fn remove_if_exists(path: &Path) -> SnapResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(SnapshotError::io(path, e)),
    }
}
