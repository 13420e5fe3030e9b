//! Sync options, their defaults, and the one place they get merged

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MirrorError, Result};

/// Maximum recursion depth, inclusive. The sync root is depth 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "DepthValue", try_from = "DepthValue")]
pub enum Depth {
    #[default]
    Unbounded,
    Limited(usize),
}

impl Depth {
    /// Whether a directory at `depth` sits on the boundary and must not be descended
    pub fn is_reached(&self, depth: usize) -> bool {
        match self {
            Depth::Unbounded => false,
            Depth::Limited(max) => depth >= *max,
        }
    }

    /// Whether an entry at `depth` is within reach at all
    pub fn allows(&self, depth: usize) -> bool {
        match self {
            Depth::Unbounded => true,
            Depth::Limited(max) => depth <= *max,
        }
    }

    /// How many levels below `depth` can still be visited
    pub fn remaining(&self, depth: usize) -> Option<usize> {
        match self {
            Depth::Unbounded => None,
            Depth::Limited(max) => Some(max.saturating_sub(depth)),
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Depth::Unbounded => write!(f, "Infinity"),
            Depth::Limited(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for Depth {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "inf" | "infinity" | "unbounded" => Ok(Depth::Unbounded),
            _ => trimmed
                .parse::<usize>()
                .map(Depth::Limited)
                .map_err(|_| MirrorError::InvalidDepth(s.to_string())),
        }
    }
}

/// Depth as it may be written by a user: a number or a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DepthValue {
    Number(i64),
    Text(String),
}

impl TryFrom<DepthValue> for Depth {
    type Error = MirrorError;

    fn try_from(value: DepthValue) -> Result<Self> {
        match value {
            DepthValue::Number(n) => usize::try_from(n)
                .map(Depth::Limited)
                .map_err(|_| MirrorError::InvalidDepth(n.to_string())),
            DepthValue::Text(s) => s.parse(),
        }
    }
}

impl From<Depth> for DepthValue {
    fn from(depth: Depth) -> Self {
        match depth {
            Depth::Unbounded => DepthValue::Text("inf".to_string()),
            Depth::Limited(n) => DepthValue::Number(n as i64),
        }
    }
}

/// Partially specified options, as they arrive from a config file or flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionOverrides {
    pub watch: Option<bool>,
    pub delete: Option<bool>,
    pub depth: Option<DepthValue>,
    pub exclude: Option<Vec<String>>,
}

impl OptionOverrides {
    /// Parse overrides from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load overrides from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| MirrorError::io(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Layer `other` on top of `self`; fields set in `other` win
    pub fn merge(self, other: OptionOverrides) -> OptionOverrides {
        OptionOverrides {
            watch: other.watch.or(self.watch),
            delete: other.delete.or(self.delete),
            depth: other.depth.or(self.depth),
            exclude: other.exclude.or(self.exclude),
        }
    }
}

/// Resolved options for one sync invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Keep the target in sync after the initial pass
    pub watch: bool,
    /// Destroy extraneous and type-conflicting target entries
    pub delete: bool,
    /// Maximum recursion depth
    pub depth: Depth,
    /// Exclusion glob patterns; never contains empty entries
    pub exclude: Vec<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            watch: false,
            delete: false,
            depth: Depth::Unbounded,
            exclude: Vec::new(),
        }
    }
}

impl SyncOptions {
    /// Merge overrides onto the defaults and validate the result
    pub fn resolve(overrides: OptionOverrides) -> Result<Self> {
        let defaults = Self::default();
        let depth = match overrides.depth {
            Some(value) => Depth::try_from(value)?,
            None => defaults.depth,
        };

        Ok(Self {
            watch: overrides.watch.unwrap_or(defaults.watch),
            delete: overrides.delete.unwrap_or(defaults.delete),
            depth,
            exclude: overrides
                .exclude
                .map(without_empty)
                .unwrap_or(defaults.exclude),
        })
    }

    /// Replace the exclusion list, dropping empty patterns
    pub fn with_exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = without_empty(patterns.into_iter().map(Into::into).collect());
        self
    }
}

fn without_empty(patterns: Vec<String>) -> Vec<String> {
    patterns
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_defaults() {
        let options = SyncOptions::resolve(OptionOverrides::default()).unwrap();
        assert_eq!(options, SyncOptions::default());
        assert!(!options.watch);
        assert!(!options.delete);
        assert_eq!(options.depth, Depth::Unbounded);
        assert!(options.exclude.is_empty());
    }

    #[test_case("3", Depth::Limited(3))]
    #[test_case("0", Depth::Limited(0))]
    #[test_case(" 12 ", Depth::Limited(12))]
    #[test_case("inf", Depth::Unbounded)]
    #[test_case("Infinity", Depth::Unbounded)]
    #[test_case("unbounded", Depth::Unbounded)]
    fn test_depth_parse(input: &str, expected: Depth) {
        assert_eq!(input.parse::<Depth>().unwrap(), expected);
    }

    #[test_case("-1")]
    #[test_case("abc")]
    #[test_case("1.5")]
    #[test_case("")]
    fn test_depth_parse_rejects(input: &str) {
        assert!(matches!(
            input.parse::<Depth>(),
            Err(MirrorError::InvalidDepth(_))
        ));
    }

    #[test]
    fn test_negative_numeric_depth_is_config_error() {
        let overrides = OptionOverrides {
            depth: Some(DepthValue::Number(-2)),
            ..Default::default()
        };
        assert!(matches!(
            SyncOptions::resolve(overrides),
            Err(MirrorError::InvalidDepth(_))
        ));
    }

    #[test]
    fn test_empty_patterns_are_dropped() {
        let overrides = OptionOverrides {
            exclude: Some(vec!["".into(), "*.tmp".into(), "  ".into()]),
            ..Default::default()
        };
        let options = SyncOptions::resolve(overrides).unwrap();
        assert_eq!(options.exclude, vec!["*.tmp".to_string()]);

        let options = SyncOptions::default().with_exclude(["", "node_modules"]);
        assert_eq!(options.exclude, vec!["node_modules".to_string()]);
    }

    #[test]
    fn test_merge_later_wins() {
        let file = OptionOverrides::from_toml_str(
            r#"
            delete = false
            depth = 4
            exclude = ["*.log"]
            "#,
        )
        .unwrap();
        let flags = OptionOverrides {
            delete: Some(true),
            ..Default::default()
        };

        let options = SyncOptions::resolve(file.merge(flags)).unwrap();
        assert!(options.delete);
        assert_eq!(options.depth, Depth::Limited(4));
        assert_eq!(options.exclude, vec!["*.log".to_string()]);
    }

    #[test]
    fn test_toml_depth_as_string() {
        let overrides = OptionOverrides::from_toml_str(r#"depth = "inf""#).unwrap();
        assert_eq!(
            SyncOptions::resolve(overrides).unwrap().depth,
            Depth::Unbounded
        );
    }

    #[test]
    fn test_toml_unknown_key_rejected() {
        assert!(matches!(
            OptionOverrides::from_toml_str("colour = true"),
            Err(MirrorError::Config(_))
        ));
    }

    #[test]
    fn test_depth_boundaries() {
        let depth = Depth::Limited(1);
        assert!(!depth.is_reached(0));
        assert!(depth.is_reached(1));
        assert!(depth.allows(1));
        assert!(!depth.allows(2));
        assert_eq!(depth.remaining(0), Some(1));
        assert!(Depth::Unbounded.allows(1000));
        assert_eq!(Depth::Unbounded.remaining(3), None);
    }
}
