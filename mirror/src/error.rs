//! Error types for the mirror engine

use std::path::PathBuf;

/// Result type alias for mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Which way round a file/directory conflict goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDirection {
    /// Source is a file, target is a directory
    FileOverDirectory,
    /// Source is a directory, target is a file
    DirectoryOverFile,
}

/// Error type for mirror operations
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// IO errors with the path they happened on
    #[error("IO error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Depth option that is not a non-negative number
    #[error("Expected valid number for option 'depth', got '{0}'")]
    InvalidDepth(String),

    /// Exclusion pattern that does not compile
    #[error("Invalid exclusion pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// Incompatible entry kinds at the same path with deletion disabled
    #[error("{}", conflict_message(.direction, .source_path, .target_path))]
    TypeConflict {
        direction: ConflictDirection,
        source_path: PathBuf,
        target_path: PathBuf,
    },

    /// Stat succeeded but the entry is neither a file nor a directory
    #[error("Unsupported entry type at '{0}': neither file nor directory")]
    UnsupportedEntry(PathBuf),

    /// Watch backend failures
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Options file that cannot be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

fn conflict_message(
    direction: &ConflictDirection,
    source: &std::path::Path,
    target: &std::path::Path,
) -> String {
    match direction {
        ConflictDirection::FileOverDirectory => format!(
            "Cannot copy file '{}' to '{}' as existing folder",
            source.display(),
            target.display()
        ),
        ConflictDirection::DirectoryOverFile => format!(
            "Cannot copy folder '{}' to '{}' as existing file",
            source.display(),
            target.display()
        ),
    }
}

impl MirrorError {
    /// Create a new IO error bound to a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a new pattern error
    pub fn pattern_error(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Numeric code to report alongside the message, if any.
    ///
    /// Only I/O failures carry one (the OS error number).
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Io { source, .. } => source.raw_os_error(),
            Self::Watch(notify::Error {
                kind: notify::ErrorKind::Io(err),
                ..
            }) => err.raw_os_error(),
            _ => None,
        }
    }
}
