//! Snapshot store split into submodules:
//! - registry.rs: SnapshotStore (memoized per-path load, one physical read per path).
//! - file.rs: SnapshotFile (per-file lock, lookup/visit/put/prune/flush).
//! - io.rs: read, atomic tmp+rename write, remove.

mod file;
mod io;
mod registry;

pub use file::{FlushOutcome, SnapshotFile};
pub use registry::SnapshotStore;
pub(crate) use io::{read_snapshot_text, remove_if_exists, write_atomic};
