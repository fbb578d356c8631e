//! Integration tests for the watch tree on the real `notify` backend.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tempfile::TempDir;
use treewatch::{EventKind, WatchEvent, WatchOptions, WatchTree};

/// How long to wait for the OS to report something.
const DEADLINE: Duration = Duration::from_secs(10);

/// Temp dir with symlinks resolved, so backend paths match ours.
fn canonical_tmp() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    (tmp, root)
}

/// Pump notifications until an event of `kind` for `path` shows up.
fn wait_for(
    tree: &mut WatchTree,
    events: &Receiver<WatchEvent>,
    kind: EventKind,
    path: &Path,
) -> Vec<WatchEvent> {
    let start = Instant::now();
    let mut seen = Vec::new();

    while start.elapsed() < DEADLINE {
        tree.process_timeout(Duration::from_millis(50));
        seen.extend(events.try_iter());
        if seen.iter().any(|e| e.kind() == kind && e.path() == path) {
            // Let trailing raw events settle into the same batch.
            tree.process_timeout(Duration::from_millis(200));
            seen.extend(events.try_iter());
            return seen;
        }
    }

    panic!("no {kind} event for {} within {DEADLINE:?}, saw {seen:?}", path.display());
}

fn count(events: &[WatchEvent], kind: EventKind, path: &Path) -> usize {
    events
        .iter()
        .filter(|e| e.kind() == kind && e.path() == path)
        .count()
}

/// Test that the initial watch covers every existing node.
#[test]
fn test_watch_registers_whole_tree() {
    let (_tmp, root) = canonical_tmp();
    fs::create_dir_all(root.join("src/nested")).unwrap();
    fs::write(root.join("README.md"), "# readme").unwrap();
    fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
    fs::write(root.join("src/nested/mod.rs"), "").unwrap();

    let tree = treewatch::watch(&root, WatchOptions::default()).unwrap();

    let expected: Vec<PathBuf> = walkdir::WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .map(|e| e.path().to_path_buf())
        .collect();

    assert_eq!(tree.len(), expected.len());
    for path in &expected {
        assert!(tree.is_watched(path), "{} not watched", path.display());
    }
}

/// Test that a new file is reported once and then watched.
#[test]
fn test_detects_new_file() {
    let (_tmp, root) = canonical_tmp();
    let mut tree = WatchTree::new(WatchOptions::default()).unwrap();
    let events = tree.subscribe();
    tree.watch(&root).unwrap();

    let new_file = root.join("new file.txt");
    fs::write(&new_file, "hello").unwrap();

    let seen = wait_for(&mut tree, &events, EventKind::Create, &new_file);
    assert_eq!(count(&seen, EventKind::Create, &new_file), 1);
    assert!(tree.is_watched(&new_file));
}

/// Test that a change to a directly watched file is reported.
#[test]
fn test_detects_change_in_watched_file() {
    let (_tmp, root) = canonical_tmp();
    let file = root.join("subdir file.txt");
    fs::write(&file, "original").unwrap();
    // Make the next write carry a strictly newer mtime.
    fs::File::options()
        .write(true)
        .open(&file)
        .unwrap()
        .set_modified(std::time::SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000))
        .unwrap();

    let mut tree = WatchTree::new(WatchOptions::default()).unwrap();
    let events = tree.subscribe();
    tree.watch(&file).unwrap();

    fs::write(&file, "blah blah new data blah").unwrap();

    let seen = wait_for(&mut tree, &events, EventKind::Change, &file);
    assert_eq!(count(&seen, EventKind::Change, &file), 1);
}

/// Test that deleting a watched file is reported once and cleans up.
#[test]
fn test_detects_deletion() {
    let (_tmp, root) = canonical_tmp();
    let a = root.join("a.txt");
    let b = root.join("b.txt");
    fs::write(&a, "a").unwrap();
    fs::write(&b, "b").unwrap();

    let mut tree = WatchTree::new(WatchOptions::default()).unwrap();
    let events = tree.subscribe();
    tree.watch(&root).unwrap();

    fs::remove_file(&a).unwrap();

    let seen = wait_for(&mut tree, &events, EventKind::Delete, &a);
    assert_eq!(count(&seen, EventKind::Delete, &a), 1);
    assert!(!tree.is_watched(&a));
    assert!(tree.is_watched(&b));
}

/// Test that files inside a newly created directory are picked up.
#[test]
fn test_new_directory_is_watched_transitively() {
    let (_tmp, root) = canonical_tmp();
    let mut tree = WatchTree::new(WatchOptions::default()).unwrap();
    let events = tree.subscribe();
    tree.watch(&root).unwrap();

    let dir = root.join("fresh");
    fs::create_dir(&dir).unwrap();
    wait_for(&mut tree, &events, EventKind::Create, &dir);

    let inner = dir.join("inner.txt");
    fs::write(&inner, "inside").unwrap();
    wait_for(&mut tree, &events, EventKind::Create, &inner);
    assert!(tree.is_watched(&inner));
}

/// Test that clear releases every watch.
#[test]
fn test_clear_unwatches_everything() {
    let (_tmp, root) = canonical_tmp();
    fs::write(root.join("a.txt"), "a").unwrap();
    fs::write(root.join("b.txt"), "b").unwrap();

    let mut tree = WatchTree::new(WatchOptions::default()).unwrap();
    let events = tree.subscribe();
    tree.watch(&root).unwrap();
    let watched = tree.watched_paths();
    events.try_iter().for_each(drop);

    tree.clear();

    let unwatched: Vec<PathBuf> = events
        .try_iter()
        .filter(|e| e.kind() == EventKind::Unwatch)
        .map(|e| e.path().to_path_buf())
        .collect();
    assert_eq!(unwatched, watched);
    assert!(tree.is_empty());
}
