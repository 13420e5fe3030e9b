//! Mirror walker: sequential reconciliation of a target tree against a source tree

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{ConflictDirection, MirrorError, Result};
use crate::event::SyncEvent;
use crate::ops::{EntryKind, MirrorOps};

/// Outcome of visiting one source/target pair
enum Visit {
    Done(bool),
    Descend(DirFrame),
}

/// A directory pair whose children are being reconciled
struct DirFrame {
    source: PathBuf,
    target: PathBuf,
    depth: usize,
    children: std::vec::IntoIter<OsString>,
    copied: bool,
}

/// Reconciles trees with an explicit stack instead of call recursion.
///
/// Each child is processed to completion, descendants included, before
/// its next sibling, and the first failing child stops the remaining
/// siblings of its directory.
pub struct MirrorWalker<'a> {
    ops: &'a MirrorOps,
}

impl<'a> MirrorWalker<'a> {
    pub fn new(ops: &'a MirrorOps) -> Self {
        Self { ops }
    }

    /// Reconcile the whole source root into the target root
    pub fn run(&self) -> Result<bool> {
        debug!(
            "mirroring '{}' into '{}'",
            self.ops.source_root().display(),
            self.ops.target_root().display()
        );
        self.reconcile(self.ops.source_root(), self.ops.target_root())
    }

    /// Reconcile `source` into `target`.
    ///
    /// `Ok(false)` means a failure was reported through the sink.
    /// `Err` is only returned for entries that are neither file, directory
    /// nor missing, and aborts the walk.
    pub fn reconcile(&self, source: &Path, target: &Path) -> Result<bool> {
        let start_depth = self
            .ops
            .relative(source)
            .map(|relative| relative.components().count())
            .unwrap_or(0);

        let mut stack = Vec::new();
        let mut finished = match self.visit(source, target, start_depth)? {
            Visit::Done(ok) => return Ok(ok),
            Visit::Descend(frame) => {
                stack.push(frame);
                None
            }
        };

        while let Some(frame) = stack.last_mut() {
            if finished.take() == Some(false) {
                frame.copied = false;
                frame.children = Vec::new().into_iter();
            }

            match frame.children.next() {
                Some(name) => {
                    let child_source = frame.source.join(&name);
                    let child_target = frame.target.join(&name);
                    let depth = frame.depth + 1;

                    match self.visit(&child_source, &child_target, depth)? {
                        Visit::Done(ok) => finished = Some(ok),
                        Visit::Descend(child) => stack.push(child),
                    }
                }
                None => {
                    if let Some(frame) = stack.pop() {
                        let extras_removed = self.remove_extraneous(&frame);
                        finished = Some(frame.copied && extras_removed);
                    }
                }
            }
        }

        Ok(finished.unwrap_or(true))
    }

    fn visit(&self, source: &Path, target: &Path, depth: usize) -> Result<Visit> {
        if self
            .ops
            .exclusions()
            .excludes(self.ops.source_root(), source)
        {
            trace!("excluded '{}'", source.display());
            return Ok(Visit::Done(true));
        }

        let Some(source_kind) = self.classify(source)? else {
            return Ok(Visit::Done(false));
        };
        let Some(target_kind) = self.classify(target)? else {
            return Ok(Visit::Done(false));
        };

        let ok = match (source_kind, target_kind) {
            (EntryKind::Missing, EntryKind::Missing) => true,
            (EntryKind::Missing, _) => self.ops.delete_extraneous(target),
            (_, EntryKind::Missing) => self.ops.copy(source, target, depth),
            (EntryKind::Directory, EntryKind::Directory) => {
                if self.ops.options().depth.is_reached(depth) {
                    self.ops.emit(SyncEvent::MaxDepthSkipped {
                        path: source.to_path_buf(),
                    });
                    true
                } else {
                    return Ok(self.descend(source, target, depth));
                }
            }
            (
                EntryKind::File { modified: source_mtime },
                EntryKind::File { modified: target_mtime },
            ) => {
                if source_mtime > target_mtime {
                    self.ops.copy(source, target, depth)
                } else {
                    true
                }
            }
            (EntryKind::File { .. }, EntryKind::Directory) => {
                self.replace(source, target, depth, ConflictDirection::FileOverDirectory)
            }
            (EntryKind::Directory, EntryKind::File { .. }) => {
                self.replace(source, target, depth, ConflictDirection::DirectoryOverFile)
            }
        };

        Ok(Visit::Done(ok))
    }

    /// Stat a path; recoverable failures are reported and yield `None`
    fn classify(&self, path: &Path) -> Result<Option<EntryKind>> {
        match EntryKind::of(path) {
            Ok(kind) => Ok(Some(kind)),
            Err(err @ MirrorError::UnsupportedEntry(_)) => Err(err),
            Err(err) => {
                self.ops.report(&err);
                Ok(None)
            }
        }
    }

    fn descend(&self, source: &Path, target: &Path, depth: usize) -> Visit {
        match read_sorted(source) {
            Ok(children) => Visit::Descend(DirFrame {
                source: source.to_path_buf(),
                target: target.to_path_buf(),
                depth,
                children: children.into_iter(),
                copied: true,
            }),
            Err(err) => {
                self.ops.report(&err);
                Visit::Done(false)
            }
        }
    }

    /// File/directory conflict at the same path
    fn replace(
        &self,
        source: &Path,
        target: &Path,
        depth: usize,
        direction: ConflictDirection,
    ) -> bool {
        if self.ops.options().delete {
            self.ops.destroy(target) && self.ops.copy(source, target, depth)
        } else {
            self.ops.report(&MirrorError::TypeConflict {
                direction,
                source_path: source.to_path_buf(),
                target_path: target.to_path_buf(),
            });
            false
        }
    }

    /// Apply the deletion policy to target children with no source counterpart
    fn remove_extraneous(&self, frame: &DirFrame) -> bool {
        let names = match read_sorted(&frame.target) {
            Ok(names) => names,
            Err(err) => {
                self.ops.report(&err);
                return false;
            }
        };

        for name in names {
            let source = frame.source.join(&name);
            if self
                .ops
                .exclusions()
                .excludes(self.ops.source_root(), &source)
            {
                continue;
            }
            if !has_no_counterpart(&source) {
                continue;
            }
            if !self.ops.delete_extraneous(&frame.target.join(&name)) {
                return false;
            }
        }

        true
    }
}

/// Whether nothing at all exists at `source`, links included.
///
/// Dangling links and entries that fail to stat belong to the child pass;
/// neither makes the target extraneous.
fn has_no_counterpart(source: &Path) -> bool {
    match fs::symlink_metadata(source) {
        Ok(_) => false,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            trace!("keeping target of unreadable '{}': {}", source.display(), e);
            false
        }
    }
}

/// Directory entry names, sorted
fn read_sorted(dir: &Path) -> Result<Vec<OsString>> {
    let mut names = fs::read_dir(dir)
        .and_then(|entries| {
            entries
                .map(|entry| entry.map(|e| e.file_name()))
                .collect::<std::io::Result<Vec<_>>>()
        })
        .map_err(|e| MirrorError::io(dir, e))?;
    names.sort();
    Ok(names)
}
