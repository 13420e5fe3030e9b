//! Exclusion matching using globset

use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::{MirrorError, Result};

/// Compiled set of exclusion patterns.
///
/// `*` and `?` do not cross path separators; use `**` to match across
/// directories. Empty patterns are never compiled and so never match.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    set: Option<GlobSet>,
}

impl ExclusionSet {
    /// Compile the given patterns
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns: Vec<String> = patterns
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| !p.trim().is_empty())
            .map(str::to_string)
            .collect();

        let set = if patterns.is_empty() {
            None
        } else {
            Some(Self::build_globset(&patterns)?)
        };

        Ok(Self { set })
    }

    /// Whether `path` matches any pattern as given
    pub fn is_match(&self, path: &Path) -> bool {
        match &self.set {
            Some(set) => set.is_match(path),
            None => false,
        }
    }

    /// Walker test: the absolute path, or the path relative to `root`
    /// when `path` is not the root itself.
    pub fn excludes(&self, root: &Path, path: &Path) -> bool {
        if self.is_empty() {
            return false;
        }
        if self.is_match(path) {
            return true;
        }
        path != root && self.excludes_relative(root, path)
    }

    /// Watcher test: the path relative to `root` or any of its relative
    /// ancestors
    pub fn excludes_relative(&self, root: &Path, path: &Path) -> bool {
        match path.strip_prefix(root) {
            Ok(relative) => relative
                .ancestors()
                .take_while(|prefix| !prefix.as_os_str().is_empty())
                .any(|prefix| self.is_match(prefix)),
            Err(_) => false,
        }
    }

    /// Notification filter: the path as reported, or any ancestor of it
    /// down to and including `root`
    pub fn excludes_absolute(&self, root: &Path, path: &Path) -> bool {
        if !path.starts_with(root) {
            return self.is_match(path);
        }
        path.ancestors()
            .take_while(|prefix| prefix.starts_with(root))
            .any(|prefix| self.is_match(prefix))
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_none()
    }

    fn build_globset(patterns: &[String]) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .backslash_escape(true)
                .build()
                .map_err(|e| MirrorError::pattern_error(pattern, e.to_string()))?;

            builder.add(glob);
        }

        builder
            .build()
            .map_err(|e| MirrorError::pattern_error(patterns.join(", "), e.to_string()))
    }
}
