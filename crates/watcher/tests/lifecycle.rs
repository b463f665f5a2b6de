//! Watcher lifecycle: start, misuse, failure and abort

mod common;

use common::*;
use dirwatch::{NodeState, WatchError, WatchEvent, WatchOptions, Watcher};
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ready_after_initial_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "b.txt", "b");
    write(temp_dir.path(), "a.txt", "a");
    std::fs::create_dir(temp_dir.path().join("sub")).unwrap();

    let (watcher, mut events) = Watcher::open(temp_dir.path(), WatchOptions::default()).unwrap();
    let seen = until_ready(&mut events, "").await;

    assert_eq!(
        summarize(&seen),
        [
            ("add", "a.txt".to_string()),
            ("add", "b.txt".to_string()),
            ("add", "sub".to_string()),
        ]
    );
    assert_eq!(watcher.filenames(), ["a.txt", "b.txt", "sub"]);
    assert!(watcher.files()["sub"].is_dir());
    assert_eq!(watcher.state(), NodeState::Watching);
    assert_eq!(watcher.folder().as_deref(), Some(temp_dir.path()));
    assert_eq!(watcher.recursion_depth(), Some(0));
    assert!(watcher.child_offsets().is_empty());
}

#[tokio::test]
async fn test_watch_twice_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let watcher = Watcher::new();

    watcher.watch(temp_dir.path(), WatchOptions::default()).unwrap();
    let err = watcher
        .watch(temp_dir.path(), WatchOptions::default())
        .unwrap_err();
    assert!(matches!(err, WatchError::AlreadyWatching));
    assert!(err.is_misuse());
}

#[tokio::test]
async fn test_commands_before_watch() {
    let watcher = Watcher::new();

    assert_eq!(watcher.state(), NodeState::Created);
    assert!(watcher.folder().is_none());
    assert!(watcher.filenames().is_empty());
    assert!(matches!(watcher.rescan(), Err(WatchError::NotWatching)));
}

#[tokio::test]
async fn test_invalid_options_leave_watcher_unstarted() {
    let temp_dir = TempDir::new().unwrap();
    let watcher = Watcher::new();

    let options = WatchOptions {
        recursion_depth: -2,
        ..WatchOptions::default()
    };
    assert!(matches!(
        watcher.watch(temp_dir.path(), options),
        Err(WatchError::InvalidOptions(_))
    ));
    assert!(watcher.folder().is_none());

    watcher.watch(temp_dir.path(), WatchOptions::default()).unwrap();
}

#[test]
fn test_watch_requires_runtime() {
    let temp_dir = TempDir::new().unwrap();
    let watcher = Watcher::new();

    assert!(matches!(
        watcher.watch(temp_dir.path(), WatchOptions::default()),
        Err(WatchError::NoRuntime)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_folder_reports_error() {
    let temp_dir = TempDir::new().unwrap();
    let (watcher, mut events) =
        Watcher::open(temp_dir.path().join("missing"), WatchOptions::default()).unwrap();

    match next_event(&mut events).await {
        WatchEvent::Error(err) => assert!(matches!(*err, WatchError::Io { .. })),
        other => panic!("expected error, got {:?}", other),
    }
    expect_quiet(&mut events).await;
    assert_eq!(watcher.state(), NodeState::Created);
    assert!(watcher.filenames().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_is_not_a_folder() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "plain.txt", "");

    let (watcher, mut events) =
        Watcher::open(temp_dir.path().join("plain.txt"), WatchOptions::default()).unwrap();

    match next_event(&mut events).await {
        WatchEvent::Error(err) => assert!(matches!(*err, WatchError::NotADirectory(_))),
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(watcher.state(), NodeState::Created);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abort_is_final() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "a.txt", "a");
    let (watcher, mut events) = Watcher::open(temp_dir.path(), WatchOptions::default()).unwrap();
    until_ready(&mut events, "").await;

    watcher.abort();
    watcher.abort();
    assert!(watcher.is_aborted());
    assert_eq!(watcher.state(), NodeState::Aborted);

    write(temp_dir.path(), "b.txt", "b");
    write(temp_dir.path(), "a.txt", "changed");
    expect_quiet(&mut events).await;

    assert!(matches!(
        watcher.watch(temp_dir.path(), WatchOptions::default()),
        Err(WatchError::Aborted)
    ));
    assert!(matches!(watcher.rescan(), Err(WatchError::Aborted)));
}

#[tokio::test]
async fn test_abort_during_initial_listing() {
    let temp_dir = TempDir::new().unwrap();
    for i in 0..10 {
        write(temp_dir.path(), &format!("f{i}.txt"), "");
    }

    // Single-threaded runtime: nothing has run before the abort
    let (watcher, mut events) = Watcher::open(temp_dir.path(), WatchOptions::default()).unwrap();
    watcher.abort();

    expect_quiet(&mut events).await;
    assert_eq!(watcher.state(), NodeState::Aborted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abort_while_initial_adds_are_in_flight() {
    let temp_dir = TempDir::new().unwrap();
    for i in 0..2000 {
        write(temp_dir.path(), &format!("f{i:04}.txt"), "");
    }

    let (watcher, mut events) = Watcher::open(temp_dir.path(), WatchOptions::default()).unwrap();
    let first = next_event(&mut events).await;
    assert!(matches!(first, WatchEvent::Add { .. }), "got {:?}", first);
    watcher.abort();

    // Only adds already recorded before the abort may still be queued
    let tail = settle(&mut events).await;
    assert!(
        tail.iter().all(|e| matches!(e, WatchEvent::Add { .. })),
        "unexpected events after abort: {:?}",
        tail
    );
    let recorded = watcher.filenames().len();
    assert_eq!(recorded, 1 + tail.len());
    assert!(recorded < 2000);
    assert_eq!(watcher.state(), NodeState::Aborted);
}

#[tokio::test]
async fn test_abort_before_watch() {
    let temp_dir = TempDir::new().unwrap();
    let watcher = Watcher::new();

    watcher.abort();
    assert!(watcher.is_aborted());
    assert!(matches!(
        watcher.watch(temp_dir.path(), WatchOptions::default()),
        Err(WatchError::Aborted)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropping_watcher_stops_events() {
    let temp_dir = TempDir::new().unwrap();
    let (watcher, mut events) = Watcher::open(temp_dir.path(), WatchOptions::default()).unwrap();
    until_ready(&mut events, "").await;

    drop(watcher);
    write(temp_dir.path(), "late.txt", "");

    // The stream ends once the watcher and its nodes are gone
    let tail = tokio::time::timeout(Duration::from_secs(1), events.recv()).await;
    assert!(!matches!(tail, Ok(Some(_))), "unexpected event {:?}", tail);
}
