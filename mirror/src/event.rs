//! Events emitted by the walker and the watcher, and the sink that receives them

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::MirrorError;

/// A discrete, fire-and-forget outcome of a mirroring step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SyncEvent {
    /// A copy was attempted
    Copy { from: PathBuf, to: PathBuf },
    /// A deletion was attempted
    Remove { path: PathBuf },
    /// An operation failed
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<i32>,
    },
    /// The watcher became ready
    #[serde(rename = "watch")]
    WatchStarted { path: PathBuf },
    /// Recursion stopped at the depth limit
    #[serde(rename = "max-depth")]
    MaxDepthSkipped { path: PathBuf },
    /// An extraneous entry was left in place because deletion is disabled
    #[serde(rename = "no-delete")]
    DeletionSkipped { path: PathBuf },
}

impl SyncEvent {
    pub fn copy(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self::Copy {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn remove(path: impl Into<PathBuf>) -> Self {
        Self::Remove { path: path.into() }
    }

    pub fn error(message: impl Into<String>, code: Option<i32>) -> Self {
        Self::Error {
            message: message.into(),
            code,
        }
    }

    /// Wire name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::Copy { .. } => "copy",
            SyncEvent::Remove { .. } => "remove",
            SyncEvent::Error { .. } => "error",
            SyncEvent::WatchStarted { .. } => "watch",
            SyncEvent::MaxDepthSkipped { .. } => "max-depth",
            SyncEvent::DeletionSkipped { .. } => "no-delete",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SyncEvent::Error { .. })
    }

    /// The path the event is about; the destination for copies
    pub fn subject(&self) -> Option<&Path> {
        match self {
            SyncEvent::Copy { to, .. } => Some(to),
            SyncEvent::Remove { path }
            | SyncEvent::WatchStarted { path }
            | SyncEvent::MaxDepthSkipped { path }
            | SyncEvent::DeletionSkipped { path } => Some(path),
            SyncEvent::Error { .. } => None,
        }
    }
}

impl From<&MirrorError> for SyncEvent {
    fn from(err: &MirrorError) -> Self {
        SyncEvent::error(err.to_string(), err.code())
    }
}

/// Receiver for every event the engine produces.
///
/// Implementations own aggregation, rendering and exit decisions.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

impl<F> EventSink for F
where
    F: Fn(SyncEvent) + Send + Sync,
{
    fn emit(&self, event: SyncEvent) {
        self(event)
    }
}

/// Sink that keeps every event in memory, in order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(SyncEvent::kind).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: SyncEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
