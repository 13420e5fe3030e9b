//! Tests for the top-level sync entry point

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use crate::event::{EventSink, RecordingSink, SyncEvent};
use crate::options::{DepthValue, OptionOverrides};

#[tokio::test]
async fn test_invalid_depth_reports_once_and_touches_nothing() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source");
    let target = temp.path().join("target");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("a.txt"), b"a").unwrap();

    let sink = Arc::new(RecordingSink::new());
    let overrides = OptionOverrides {
        depth: Some(DepthValue::Text("deep".into())),
        ..Default::default()
    };

    assert!(!crate::sync(&source, &target, overrides, sink.clone()).await);

    assert_eq!(
        sink.events(),
        vec![SyncEvent::error(
            "Expected valid number for option 'depth', got 'deep'",
            None
        )]
    );
    assert!(!target.exists());
}

#[tokio::test]
async fn test_invalid_pattern_reports_error() {
    let temp = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let overrides = OptionOverrides {
        exclude: Some(vec!["[".into()]),
        ..Default::default()
    };

    assert!(!crate::sync(temp.path(), temp.path().join("t"), overrides, sink.clone()).await);
    assert_eq!(sink.kinds(), vec!["error"]);
}

#[tokio::test]
async fn test_one_shot_sync_uses_defaults() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source");
    let target = temp.path().join("target");
    fs::create_dir_all(&source).unwrap();
    fs::create_dir_all(&target).unwrap();
    fs::write(source.join("a.txt"), b"a").unwrap();
    fs::write(target.join("extra.txt"), b"e").unwrap();

    let sink = Arc::new(RecordingSink::new());
    assert!(crate::sync(&source, &target, OptionOverrides::default(), sink.clone()).await);

    // delete defaults to off in the library
    assert_eq!(sink.kinds(), vec!["copy", "no-delete"]);
    assert!(target.join("a.txt").exists());
    assert!(target.join("extra.txt").exists());
}

#[tokio::test]
async fn test_failed_walk_does_not_start_watcher() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source");
    let target = temp.path().join("target");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("thing"), b"file").unwrap();
    fs::create_dir_all(target.join("thing")).unwrap();

    let sink = Arc::new(RecordingSink::new());
    let overrides = OptionOverrides {
        watch: Some(true),
        ..Default::default()
    };

    assert!(!crate::sync(&source, &target, overrides, sink.clone()).await);
    assert_eq!(sink.kinds(), vec!["error"]);
}

#[tokio::test]
async fn test_initial_walk_leaves_runtime_free() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source");
    let target = temp.path().join("target");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("a.txt"), b"a").unwrap();

    // the first copy blocks until another task on this runtime releases it
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let released = Arc::new(AtomicBool::new(false));
    let flag = released.clone();
    let sink: Arc<dyn EventSink> = Arc::new(move |event: SyncEvent| {
        if matches!(event, SyncEvent::Copy { .. }) {
            if let Ok(rx) = release_rx.lock() {
                if rx.recv_timeout(Duration::from_secs(5)).is_ok() {
                    flag.store(true, Ordering::SeqCst);
                }
            }
        }
    });

    let release = async move {
        tokio::task::yield_now().await;
        let _ = release_tx.send(());
    };
    let (ok, ()) = tokio::join!(
        crate::sync(&source, &target, OptionOverrides::default(), sink),
        release
    );

    assert!(ok);
    assert!(released.load(Ordering::SeqCst));
    assert!(target.join("a.txt").exists());
}
