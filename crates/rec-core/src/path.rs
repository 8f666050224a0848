//! Dot-notation field addressing over nested records
//!
//! A path like `address.city` walks nested objects one segment at a time.
//! Arrays are leaves: a path never descends into one. There is no escaping,
//! so a field whose own name contains a dot cannot be addressed by nesting.

use serde_json::Value;

/// Join a parent path and a key into a child path
pub fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Resolve a dot-notation path inside a value
///
/// Returns `None` as soon as an intermediate value is not an object (null,
/// scalars and arrays all stop the walk) or a segment is missing.
pub fn get_value_by_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(record, |current, segment| current.as_object()?.get(segment))
}

/// List every reachable path in a record, parents before their children
///
/// A nested object contributes its own path and then the paths beneath it;
/// arrays contribute a single path and are never expanded.
pub fn enumerate_paths(record: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_paths(record, "", &mut paths);
    paths
}

fn collect_paths(value: &Value, prefix: &str, paths: &mut Vec<String>) {
    let Some(map) = value.as_object() else {
        return;
    };

    for (key, child) in map {
        let path = join_path(prefix, key);
        paths.push(path.clone());
        if child.is_object() {
            collect_paths(child, &path, paths);
        }
    }
}
