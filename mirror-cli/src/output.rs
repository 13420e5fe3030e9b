//! Console rendering of mirror events

use std::path::{Path, PathBuf};

use mirror::{EventSink, SyncEvent};
use tracing::warn;

/// Exit code used when an error event carries no code of its own
pub const DEFAULT_ERROR_CODE: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Normal,
    High,
}

pub fn priority(event: &SyncEvent) -> Priority {
    match event {
        SyncEvent::Error { .. } => Priority::High,
        SyncEvent::Copy { .. } | SyncEvent::Remove { .. } | SyncEvent::WatchStarted { .. } => {
            Priority::Normal
        }
        SyncEvent::MaxDepthSkipped { .. } | SyncEvent::DeletionSkipped { .. } => Priority::Low,
    }
}

/// Prints events to stdout, errors to stderr, and exits on the first error
pub struct ConsoleSink {
    verbose: bool,
    json: bool,
    cwd: PathBuf,
}

impl ConsoleSink {
    pub fn new(verbose: bool, json: bool) -> Self {
        Self {
            verbose,
            json,
            cwd: std::env::current_dir().unwrap_or_default(),
        }
    }

    /// Whether an event is shown at the current verbosity
    pub fn shows(&self, event: &SyncEvent) -> bool {
        self.verbose || priority(event) > Priority::Low
    }

    /// Human-readable line for an event
    pub fn render(&self, event: &SyncEvent) -> String {
        match event {
            SyncEvent::Copy { from, to } => {
                format!("COPY {} to {}", self.display(from), self.display(to))
            }
            SyncEvent::Remove { path } => format!("DELETE {}", self.display(path)),
            SyncEvent::WatchStarted { path } => format!("WATCHING {}", self.display(path)),
            SyncEvent::MaxDepthSkipped { path } => {
                format!("MAX-DEPTH: {} too deep", self.display(path))
            }
            SyncEvent::DeletionSkipped { path } => format!(
                "IGNORED: {} extraneous but not deleted (use --delete)",
                self.display(path)
            ),
            SyncEvent::Error { message, .. } => message.clone(),
        }
    }

    fn display(&self, path: &Path) -> String {
        match path.strip_prefix(&self.cwd) {
            Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
            Ok(relative) => relative.display().to_string(),
            Err(_) => path.display().to_string(),
        }
    }

    fn line(&self, event: &SyncEvent) -> String {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => return line,
                Err(e) => warn!("Failed to serialize event: {}", e),
            }
        }
        self.render(event)
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: SyncEvent) {
        if !self.shows(&event) {
            return;
        }

        match &event {
            SyncEvent::Error { code, .. } => {
                eprintln!("{}", self.line(&event));
                std::process::exit(code.unwrap_or(DEFAULT_ERROR_CODE));
            }
            _ => println!("{}", self.line(&event)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink_in(cwd: &str, verbose: bool) -> ConsoleSink {
        ConsoleSink {
            verbose,
            json: false,
            cwd: PathBuf::from(cwd),
        }
    }

    #[test]
    fn test_priorities() {
        assert_eq!(priority(&SyncEvent::error("x", None)), Priority::High);
        assert_eq!(priority(&SyncEvent::copy("/a", "/b")), Priority::Normal);
        assert_eq!(priority(&SyncEvent::remove("/a")), Priority::Normal);
        assert_eq!(
            priority(&SyncEvent::DeletionSkipped { path: "/a".into() }),
            Priority::Low
        );
    }

    #[test]
    fn test_low_priority_hidden_unless_verbose() {
        let quiet = sink_in("/work", false);
        let loud = sink_in("/work", true);
        let skipped = SyncEvent::MaxDepthSkipped {
            path: "/work/deep".into(),
        };

        assert!(!quiet.shows(&skipped));
        assert!(loud.shows(&skipped));
        assert!(quiet.shows(&SyncEvent::copy("/a", "/b")));
    }

    #[test]
    fn test_render_relative_to_cwd() {
        let sink = sink_in("/work", false);

        assert_eq!(
            sink.render(&SyncEvent::copy("/work/src/a.txt", "/work/dst/a.txt")),
            "COPY src/a.txt to dst/a.txt"
        );
        assert_eq!(
            sink.render(&SyncEvent::remove("/elsewhere/x")),
            "DELETE /elsewhere/x"
        );
        assert_eq!(
            sink.render(&SyncEvent::WatchStarted {
                path: "/work".into()
            }),
            "WATCHING ."
        );
        assert_eq!(
            sink.render(&SyncEvent::DeletionSkipped {
                path: "/work/dst/old".into()
            }),
            "IGNORED: dst/old extraneous but not deleted (use --delete)"
        );
        assert_eq!(
            sink.render(&SyncEvent::MaxDepthSkipped {
                path: "/work/src/deep".into()
            }),
            "MAX-DEPTH: src/deep too deep"
        );
    }

    #[test]
    fn test_json_line() {
        let sink = ConsoleSink {
            verbose: false,
            json: true,
            cwd: PathBuf::from("/work"),
        };
        let line = sink.line(&SyncEvent::remove("/work/x"));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["kind"], "remove");
        assert_eq!(value["path"], "/work/x");
    }
}
