//! Path lookups over loosely-typed object trees.
//!
//! Every accessor degrades to `None`: a missing key, a non-object intermediate node,
//! or a leaf of the wrong type all read as "not found".

use serde_json::{Map, Value};

/// One resource instance at one point in time.
pub type Snapshot = Value;

pub fn pluck<'a>(tree: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(tree, |node, key| node.as_object()?.get(*key))
}

pub fn pluck_str<'a>(tree: &'a Value, path: &[&str]) -> Option<&'a str> {
    pluck(tree, path)?.as_str()
}

pub fn pluck_i64(tree: &Value, path: &[&str]) -> Option<i64> {
    pluck(tree, path)?.as_i64()
}

pub fn pluck_array<'a>(tree: &'a Value, path: &[&str]) -> Option<&'a Vec<Value>> {
    pluck(tree, path)?.as_array()
}

pub fn pluck_object<'a>(tree: &'a Value, path: &[&str]) -> Option<&'a Map<String, Value>> {
    pluck(tree, path)?.as_object()
}
