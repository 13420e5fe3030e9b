//! Property tests for path mapping and exclusion matching using proptest

use std::path::{Path, PathBuf};
use std::sync::Arc;

use proptest::prelude::*;

use crate::event::RecordingSink;
use crate::exclude::ExclusionSet;
use crate::ops::MirrorOps;
use crate::options::{Depth, SyncOptions};
use crate::watcher::WatchOptions;

/// Strategy for generating valid directory names
fn valid_dir_name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_\\-]{1,20}"
}

/// Strategy for generating relative paths of one or more components
fn relative_path() -> impl Strategy<Value = PathBuf> {
    prop::collection::vec(valid_dir_name(), 1..6).prop_map(|parts| parts.iter().collect())
}

fn ops() -> MirrorOps {
    MirrorOps::new(
        "/mirror/source",
        "/mirror/target",
        SyncOptions::default(),
        Arc::new(RecordingSink::new()),
    )
    .unwrap()
}

proptest! {
    #[test]
    fn prop_target_mapping_preserves_relative_path(relative in relative_path()) {
        let ops = ops();
        let source = ops.source_root().join(&relative);

        let mapped_relative = ops.relative(&source).unwrap();
        let target = ops.target_for(mapped_relative);

        prop_assert_eq!(target.strip_prefix(ops.target_root()).unwrap(), relative.as_path());
    }

    #[test]
    fn prop_no_patterns_exclude_nothing(relative in relative_path()) {
        let set = ExclusionSet::new(&["", " "]).unwrap();
        let root = Path::new("/mirror/source");

        prop_assert!(!set.excludes(root, &root.join(&relative)));
        prop_assert!(!set.excludes_relative(root, &root.join(&relative)));
    }

    #[test]
    fn prop_extension_pattern_matches_at_any_depth(relative in relative_path()) {
        let set = ExclusionSet::new(&["**/*.bak"]).unwrap();
        let root = Path::new("/mirror/source");
        let path = root.join(&relative).with_extension("bak");

        prop_assert!(set.excludes_relative(root, &path));
        prop_assert!(set.excludes(root, &path));
    }

    #[test]
    fn prop_watch_depth_filter_counts_components(relative in relative_path(), max in 0usize..6) {
        let options = WatchOptions {
            depth: Depth::Limited(max),
            ..Default::default()
        };
        let root = Path::new("/mirror/source");
        let components = relative.components().count();

        prop_assert_eq!(options.admits(root, &root.join(&relative)), components <= max);
    }
}
