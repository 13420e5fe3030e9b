//! Mirror Engine Library
//!
//! One-way mirroring of a source tree into a target tree:
//! - A sequential walker reconciling the target against the source
//! - A change watcher applying incremental copies and deletions
//! - Glob exclusions, a depth limit and copy-only mode
//! - Every action reported as a [`SyncEvent`] through an [`EventSink`]

pub mod error;
pub mod event;
pub mod exclude;
pub mod ops;
pub mod options;
pub mod walker;
pub mod watcher;

use std::path::Path;
use std::sync::Arc;

use tracing::info;

// Re-export main types and functions
pub use error::{ConflictDirection, MirrorError, Result};
pub use event::{EventSink, RecordingSink, SyncEvent};
pub use exclude::ExclusionSet;
pub use ops::{EntryKind, MirrorOps};
pub use options::{Depth, DepthValue, OptionOverrides, SyncOptions};
pub use walker::MirrorWalker;
pub use watcher::{
    Change, ChangeKind, ChangeStream, ChangeWatcher, NotifyBackend, WatchBackend, WatchOptions,
};

/// Run a single reconciliation pass of `source` into `target`.
///
/// Returns whether the whole tree was reconciled. `Err` is reserved for
/// invalid exclusion patterns and entries that cannot be mirrored at all.
pub fn mirror_once(
    source: impl AsRef<Path>,
    target: impl AsRef<Path>,
    options: &SyncOptions,
    sink: Arc<dyn EventSink>,
) -> Result<bool> {
    let ops = MirrorOps::new(
        source.as_ref(),
        target.as_ref(),
        options.clone(),
        sink,
    )?;
    MirrorWalker::new(&ops).run()
}

/// Mirror `source` into `target`, then keep watching if asked to.
///
/// Options are merged onto the defaults first; any configuration problem
/// is reported as an `error` event and nothing is touched. The initial
/// pass runs on the blocking pool, and the watcher is only attached once
/// it has fully succeeded. With `watch` set this returns only when the
/// watch stream ends.
pub async fn sync(
    source: impl AsRef<Path>,
    target: impl AsRef<Path>,
    overrides: OptionOverrides,
    sink: Arc<dyn EventSink>,
) -> bool {
    let options = match SyncOptions::resolve(overrides) {
        Ok(options) => options,
        Err(err) => {
            sink.emit(SyncEvent::from(&err));
            return false;
        }
    };

    let ops = match MirrorOps::new(source.as_ref(), target.as_ref(), options, sink.clone()) {
        Ok(ops) => ops,
        Err(err) => {
            sink.emit(SyncEvent::from(&err));
            return false;
        }
    };

    let walked = tokio::task::spawn_blocking(move || {
        let outcome = MirrorWalker::new(&ops).run();
        (ops, outcome)
    })
    .await;

    let ops = match walked {
        Ok((ops, Ok(true))) => ops,
        Ok((_, Ok(false))) => return false,
        Ok((ops, Err(err))) => {
            ops.report(&err);
            return false;
        }
        Err(join_err) => {
            sink.emit(SyncEvent::error(
                format!("Initial mirror did not finish: {}", join_err),
                None,
            ));
            return false;
        }
    };

    if !ops.options().watch {
        return true;
    }

    info!("Initial mirror complete, starting watcher");
    let watcher = ChangeWatcher::new(ops);
    match watcher.run(NotifyBackend::new()).await {
        Ok(()) => true,
        Err(err) => {
            watcher.ops().report(&err);
            false
        }
    }
}

#[cfg(test)]
mod path_property_tests;
#[cfg(test)]
mod sync_tests;
