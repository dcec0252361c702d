use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use QuiverSnap::codec::decode;
use QuiverSnap::{FlushOutcome, SnapshotError, SnapshotStore};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir();
    base.join(format!("qsnaptest-store-{prefix}-{pid}-{t}-{id}"))
}

#[test]
fn concurrent_loads_read_the_file_once() -> Result<()> {
    let root = unique_root("once");
    fs::create_dir_all(&root)?;
    let path = root.join("A.snap");
    fs::write(&path, "A.one=\nfoo\n\n\nA.two=\nbar\n")?;

    let store = Arc::new(SnapshotStore::new());
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let store = store.clone();
            let barrier = barrier.clone();
            let path = path.clone();
            thread::spawn(move || {
                barrier.wait();
                store.load(&path)
            })
        })
        .collect();

    let mut files = Vec::new();
    for h in handles {
        let f = h.join().expect("loader thread panicked")?;
        files.push(f);
    }

    assert_eq!(store.physical_reads(), 1);
    for f in &files {
        assert!(Arc::ptr_eq(f, &files[0]), "all loaders must share one instance");
    }
    assert_eq!(files[0].len(), 2);
    assert!(files[0].existed_on_disk());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn missing_file_loads_as_empty_and_is_not_created_without_changes() -> Result<()> {
    let root = unique_root("missing");
    let path = root.join("nested").join("B.snap");

    let store = SnapshotStore::new();
    let file = store.load(&path)?;
    assert!(file.is_empty());
    assert!(!file.existed_on_disk());

    assert_eq!(file.flush()?, FlushOutcome::Unchanged);
    assert!(!path.exists());
    Ok(())
}

#[test]
fn concurrent_puts_on_distinct_keys_are_all_kept() -> Result<()> {
    let root = unique_root("puts");
    let path = root.join("C.snap");
    let store = SnapshotStore::new();
    let file = store.load(&path)?;

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let file = file.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    file.put(&format!("C.t{t}[{i}]"), &format!("body {t}/{i}"));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("writer thread panicked");
    }

    assert_eq!(file.len(), 200);
    assert!(file.orphans().is_empty());
    assert_eq!(file.flush()?, FlushOutcome::Written(200));

    let on_disk = decode(&fs::read_to_string(&path)?)?;
    assert_eq!(on_disk.len(), 200);
    assert_eq!(on_disk.get("C.t3[7]").map(String::as_str), Some("body 3/7"));
    assert!(!root.join("C.snap.tmp").exists());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn lookup_does_not_visit_and_orphans_are_pruned() -> Result<()> {
    let root = unique_root("orphans");
    fs::create_dir_all(&root)?;
    let path = root.join("D.snap");
    fs::write(&path, "D.keep=\n1\n\n\nD.old=\n2\n")?;

    let store = SnapshotStore::new();
    let file = store.load(&path)?;

    assert_eq!(file.lookup("D.old").as_deref(), Some("2"));
    assert!(!file.is_visited("D.old"));

    file.record_visit("D.keep");
    file.record_visit("D.keep");
    assert_eq!(file.orphans(), vec!["D.old".to_string()]);

    let removed = file.prune_unvisited();
    assert_eq!(removed, vec!["D.old".to_string()]);
    assert_eq!(file.flush()?, FlushOutcome::Written(1));
    assert_eq!(fs::read_to_string(&path)?, "D.keep=\n1\n");

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn emptied_file_is_removed_and_second_flush_is_rejected() -> Result<()> {
    let root = unique_root("remove");
    fs::create_dir_all(&root)?;
    let path = root.join("E.snap");
    fs::write(&path, "E.gone=\nx\n")?;

    let store = SnapshotStore::new();
    let file = store.load(&path)?;
    assert_eq!(file.prune_unvisited(), vec!["E.gone".to_string()]);
    assert_eq!(file.flush()?, FlushOutcome::Removed);
    assert!(!path.exists());

    match file.flush() {
        Err(SnapshotError::AlreadyFlushed(p)) => assert_eq!(p, path),
        other => panic!("expected AlreadyFlushed, got {other:?}"),
    }

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn malformed_file_is_read_once_per_run() -> Result<()> {
    let root = unique_root("malformed");
    fs::create_dir_all(&root)?;
    let path = root.join("F.snap");
    fs::write(&path, "F.ok=\n1\n\n\ngarbage without equals\n")?;

    let store = Arc::new(SnapshotStore::new());
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let store = store.clone();
            let barrier = barrier.clone();
            let path = path.clone();
            thread::spawn(move || {
                barrier.wait();
                match store.load(&path) {
                    Err(SnapshotError::MalformedFile { line, .. }) => line,
                    other => panic!("expected MalformedFile, got {other:?}"),
                }
            })
        })
        .collect();
    for h in handles {
        let line = h.join().expect("loader thread panicked");
        assert_eq!(line, 5);
    }
    assert_eq!(store.physical_reads(), 1);
    assert!(store.get(&path).is_none());
    assert!(store.files().is_empty());

    // fixing the file mid-run changes nothing: the failed read is remembered
    fs::write(&path, "F.ok=\n1\n")?;
    match store.load(&path) {
        Err(SnapshotError::MalformedFile { line, .. }) => assert_eq!(line, 5),
        other => panic!("expected cached MalformedFile, got {other:?}"),
    }
    assert_eq!(store.physical_reads(), 1);

    store.clear();
    let file = store.load(&path)?;
    assert_eq!(file.len(), 1);
    assert_eq!(store.physical_reads(), 1);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
