//! Copy and destroy primitives shared by the walker and the watcher

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use filetime::FileTime;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::{MirrorError, Result};
use crate::event::{EventSink, SyncEvent};
use crate::exclude::ExclusionSet;
use crate::options::SyncOptions;

/// Kind of a filesystem entry, read fresh on every comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Missing,
    File { modified: SystemTime },
    Directory,
}

impl EntryKind {
    /// Stat `path`, following symlinks. A missing path is not an error.
    pub fn of(path: &Path) -> Result<Self> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(EntryKind::Missing),
            Err(e) => return Err(MirrorError::io(path, e)),
        };

        if metadata.is_dir() {
            Ok(EntryKind::Directory)
        } else if metadata.is_file() {
            let modified = metadata.modified().map_err(|e| MirrorError::io(path, e))?;
            Ok(EntryKind::File { modified })
        } else {
            Err(MirrorError::UnsupportedEntry(path.to_path_buf()))
        }
    }
}

/// The primitives bound to one source/target pair and its options
pub struct MirrorOps {
    source_root: PathBuf,
    target_root: PathBuf,
    options: SyncOptions,
    exclusions: ExclusionSet,
    sink: Arc<dyn EventSink>,
}

impl MirrorOps {
    /// Bind the primitives; fails if an exclusion pattern does not compile
    pub fn new(
        source_root: impl Into<PathBuf>,
        target_root: impl Into<PathBuf>,
        options: SyncOptions,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let exclusions = ExclusionSet::new(&options.exclude)?;

        Ok(Self {
            source_root: source_root.into(),
            target_root: target_root.into(),
            options,
            exclusions,
            sink,
        })
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    pub fn emit(&self, event: SyncEvent) {
        self.sink.emit(event);
    }

    /// Turn an error into an `error` event
    pub fn report(&self, err: &MirrorError) {
        debug!("reporting error: {}", err);
        self.sink.emit(SyncEvent::from(err));
    }

    /// Path of `path` relative to the source root, if it lies under it
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.source_root).ok()
    }

    /// Map a source-relative path onto the target tree
    pub fn target_for(&self, relative: &Path) -> PathBuf {
        if relative.as_os_str().is_empty() {
            self.target_root.clone()
        } else {
            self.target_root.join(relative)
        }
    }

    /// Copy `source` onto `target`, recursively for directories.
    ///
    /// `depth` is the depth of `source` below the source root; it bounds
    /// how far a directory copy descends.
    pub fn copy(&self, source: &Path, target: &Path, depth: usize) -> bool {
        self.emit(SyncEvent::copy(source, target));

        match self.copy_entry(source, target, depth) {
            Ok(()) => true,
            Err(err) => {
                self.report(&err);
                false
            }
        }
    }

    /// Remove `path`, whatever it is
    pub fn destroy(&self, path: &Path) -> bool {
        self.emit(SyncEvent::remove(path));

        match remove_path(path) {
            Ok(()) => true,
            Err(err) => {
                self.report(&err);
                false
            }
        }
    }

    /// Destroy an extraneous entry if deletion is enabled, otherwise leave it
    pub fn delete_extraneous(&self, path: &Path) -> bool {
        if self.options.delete {
            self.destroy(path)
        } else {
            self.emit(SyncEvent::DeletionSkipped {
                path: path.to_path_buf(),
            });
            true
        }
    }

    fn copy_entry(&self, source: &Path, target: &Path, depth: usize) -> Result<()> {
        let metadata = fs::metadata(source).map_err(|e| MirrorError::io(source, e))?;

        if metadata.is_dir() {
            self.copy_tree(source, target, depth)
        } else if metadata.is_file() {
            copy_file(source, target, &metadata)
        } else {
            Err(MirrorError::UnsupportedEntry(source.to_path_buf()))
        }
    }

    fn copy_tree(&self, source: &Path, target: &Path, depth: usize) -> Result<()> {
        let mut walk = WalkDir::new(source).follow_links(true).sort_by_file_name();
        if let Some(remaining) = self.options.depth.remaining(depth) {
            walk = walk.max_depth(remaining);
        }

        let root = &self.source_root;
        let exclusions = &self.exclusions;
        let entries = walk
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !exclusions.excludes(root, entry.path()));

        for entry in entries {
            let entry = entry.map_err(|e| walk_error(source, e))?;
            let dest = match entry.path().strip_prefix(source) {
                Ok(relative) if !relative.as_os_str().is_empty() => target.join(relative),
                _ => target.to_path_buf(),
            };

            if entry.depth() > 0 {
                self.emit(SyncEvent::copy(entry.path(), &dest));
            }

            let file_type = entry.file_type();
            if file_type.is_dir() {
                fs::create_dir_all(&dest).map_err(|e| MirrorError::io(&dest, e))?;
                if self.options.depth.is_reached(depth + entry.depth()) {
                    self.emit(SyncEvent::MaxDepthSkipped {
                        path: entry.path().to_path_buf(),
                    });
                }
            } else if file_type.is_file() {
                let metadata = entry
                    .metadata()
                    .map_err(|e| walk_error(entry.path(), e))?;
                copy_file(entry.path(), &dest, &metadata)?;
            } else {
                return Err(MirrorError::UnsupportedEntry(entry.path().to_path_buf()));
            }
        }

        Ok(())
    }
}

/// Copy one file with overwrite, carrying its modification time over
fn copy_file(source: &Path, target: &Path, metadata: &fs::Metadata) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| MirrorError::io(parent, e))?;
    }

    fs::copy(source, target).map_err(|e| MirrorError::io(target, e))?;

    let mtime = FileTime::from_last_modification_time(metadata);
    filetime::set_file_mtime(target, mtime).map_err(|e| MirrorError::io(target, e))?;

    trace!("copied {} -> {}", source.display(), target.display());
    Ok(())
}

/// Remove a file, symlink or directory tree. Already gone counts as removed.
fn remove_path(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(MirrorError::io(path, e)),
    };

    let removed = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    removed.map_err(|e| MirrorError::io(path, e))
}

fn walk_error(fallback: &Path, err: walkdir::Error) -> MirrorError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| fallback.to_path_buf());
    let message = err.to_string();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::other(message));
    MirrorError::io(path, source)
}
