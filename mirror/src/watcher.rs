//! Change watcher: keeps the target in sync from filesystem notifications

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::error::{MirrorError, Result};
use crate::event::SyncEvent;
use crate::exclude::ExclusionSet;
use crate::ops::MirrorOps;
use crate::options::Depth;

/// Buffered changes between the notification thread and the handler loop
const CHANGE_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

/// One change reported under the watched root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl Change {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Stream of changes (or backend failures) produced by a subscription
pub type ChangeStream = mpsc::Receiver<Result<Change>>;

/// Filters handed to the backend as a first line of filtering
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub depth: Depth,
    pub exclusions: ExclusionSet,
}

impl WatchOptions {
    /// Whether a change at `path` under `root` should be forwarded at all.
    ///
    /// Exclusions are tested against the path as reported and its
    /// ancestors under `root`, and entries deeper than the depth limit
    /// are dropped.
    pub fn admits(&self, root: &Path, path: &Path) -> bool {
        if self.exclusions.excludes_absolute(root, path) {
            return false;
        }
        match path.strip_prefix(root) {
            Ok(relative) => self.depth.allows(relative.components().count()),
            Err(_) => true,
        }
    }
}

/// Source of change notifications for a root directory
pub trait WatchBackend {
    /// Start watching `root` recursively. The subscription lives as long
    /// as the backend does.
    fn subscribe(&mut self, root: &Path, options: &WatchOptions) -> Result<ChangeStream>;
}

/// Backend built on the platform's recommended `notify` watcher
#[derive(Default)]
pub struct NotifyBackend {
    watcher: Option<RecommendedWatcher>,
}

impl NotifyBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatchBackend for NotifyBackend {
    fn subscribe(&mut self, root: &Path, options: &WatchOptions) -> Result<ChangeStream> {
        let (tx, rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);
        let watch_root = root.to_path_buf();
        let filters = options.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let messages: Vec<Result<Change>> = match res {
                Ok(event) => translate(event)
                    .into_iter()
                    .filter(|change| filters.admits(&watch_root, &change.path))
                    .map(Ok)
                    .collect(),
                Err(e) => vec![Err(MirrorError::from(e))],
            };

            for message in messages {
                if let Err(e) = tx.blocking_send(message) {
                    warn!("Failed to forward watcher event: {}", e);
                }
            }
        })?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        self.watcher = Some(watcher);

        Ok(rx)
    }
}

/// Map a notify event onto changes
pub fn translate(event: Event) -> Vec<Change> {
    let Event { kind, paths, .. } = event;

    match kind {
        EventKind::Create(_) => with_kind(paths, ChangeKind::Added),
        EventKind::Remove(_) => with_kind(paths, ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            with_kind(paths, ChangeKind::Removed)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => with_kind(paths, ChangeKind::Added),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => {
            let mut paths = paths.into_iter();
            let mut changes = Vec::with_capacity(2);
            if let Some(from) = paths.next() {
                changes.push(Change::new(ChangeKind::Removed, from));
            }
            if let Some(to) = paths.next() {
                changes.push(Change::new(ChangeKind::Added, to));
            }
            changes
        }
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .into_iter()
            .map(|path| {
                let kind = if path.exists() {
                    ChangeKind::Added
                } else {
                    ChangeKind::Removed
                };
                Change::new(kind, path)
            })
            .collect(),
        EventKind::Modify(_) => with_kind(paths, ChangeKind::Changed),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

fn with_kind(paths: Vec<PathBuf>, kind: ChangeKind) -> Vec<Change> {
    paths
        .into_iter()
        .map(|path| Change::new(kind, path))
        .collect()
}

/// Applies changes under the source root to the target, one at a time
pub struct ChangeWatcher {
    ops: MirrorOps,
}

impl ChangeWatcher {
    pub fn new(ops: MirrorOps) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &MirrorOps {
        &self.ops
    }

    /// Subscribe through `backend` and handle changes until the stream ends
    pub async fn run<B: WatchBackend>(&self, mut backend: B) -> Result<()> {
        let source = self.ops.source_root().to_path_buf();
        let options = WatchOptions {
            depth: self.ops.options().depth,
            exclusions: self.ops.exclusions().clone(),
        };

        let mut changes = backend.subscribe(&source, &options)?;
        info!("Watching '{}'", source.display());
        self.ops.emit(SyncEvent::WatchStarted {
            path: source.clone(),
        });

        while let Some(message) = changes.recv().await {
            match message {
                Ok(change) => self.handle(&change),
                Err(err) => self.ops.report(&err),
            }
        }

        info!("Stopped watching '{}'", source.display());
        drop(backend);
        Ok(())
    }

    /// Apply a single change
    pub fn handle(&self, change: &Change) {
        let Some(relative) = self.ops.relative(&change.path) else {
            debug!("ignoring change outside source: {}", change.path.display());
            return;
        };

        if self
            .ops
            .exclusions()
            .excludes_relative(self.ops.source_root(), &change.path)
        {
            trace!("excluded change: {}", change.path.display());
            return;
        }

        let target = self.ops.target_for(relative);
        let depth = relative.components().count();

        match change.kind {
            ChangeKind::Added | ChangeKind::Changed => {
                if !change.path.exists() {
                    // a removal for this path is queued behind us
                    debug!("source vanished before copy: {}", change.path.display());
                    return;
                }
                if change.kind == ChangeKind::Changed && change.path.is_dir() {
                    trace!("directory metadata change: {}", change.path.display());
                    return;
                }
                self.ops.copy(&change.path, &target, depth);
            }
            ChangeKind::Removed => {
                self.ops.delete_extraneous(&target);
            }
        }
    }
}
