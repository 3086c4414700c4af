//! kspy diff: leaf-level structural diffs between two snapshots of the same object.

#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fmt;

use kspy_core::style::{Paint, Plain, Style};
use serde_json::Value as Json;
use smallvec::SmallVec;

pub mod tracker;

pub use tracker::{ChangeTracker, Mode, RecordTracker, RecordWriter, Render};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(SmallVec<[PathSegment; 8]>);

impl Path {
    fn push(&mut self, seg: PathSegment) { self.0.push(seg); }

    fn pop(&mut self) { self.0.pop(); }
}

impl fmt::Display for Path {
    /// `spec.ports[0].port`; keys that would be ambiguous are quoted: `annotations["a.b/c"]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(root)");
        }
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                PathSegment::Index(n) => write!(f, "[{n}]")?,
                PathSegment::Key(k) if k.is_empty() || k.contains(['.', '[', ']', '"']) => {
                    write!(f, "[{}]", Json::String(k.clone()))?
                }
                PathSegment::Key(k) if i == 0 => f.write_str(k)?,
                PathSegment::Key(k) => write!(f, ".{k}")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Added,
    Removed,
    Changed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    pub path: Path,
    pub kind: DiffKind,
    pub old: Option<Json>,
    pub new: Option<Json>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    entries: Vec<DiffEntry>,
}

impl Diff {
    pub fn has_changes(&self) -> bool { !self.entries.is_empty() }

    pub fn entries(&self) -> &[DiffEntry] { &self.entries }

    /// One line per entry, in path order.
    pub fn render(&self, paint: &dyn Paint) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| match e.kind {
                DiffKind::Added => paint.paint(Style::Green, &format!("+ {}: {}", e.path, show(e.new.as_ref()))),
                DiffKind::Removed => paint.paint(Style::Red, &format!("- {}: {}", e.path, show(e.old.as_ref()))),
                DiffKind::Changed => format!(
                    "{} {}: {} -> {}",
                    paint.paint(Style::Yellow, "~"),
                    e.path,
                    paint.paint(Style::Red, &show(e.old.as_ref())),
                    paint.paint(Style::Green, &show(e.new.as_ref())),
                ),
            })
            .collect()
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.render(&Plain) {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

fn show(v: Option<&Json>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Classify every leaf that differs between `previous` and `current`.
///
/// Objects are compared key-wise and arrays index-wise. A null and a missing key both mean
/// "absent". Whole subtrees that appear or disappear are reported leaf by leaf; a container
/// with no non-null leaves counts as a single leaf.
pub fn diff(previous: &Json, current: &Json) -> Diff {
    let mut entries = Vec::new();
    let mut path = Path::default();
    walk(&mut path, Some(previous), Some(current), &mut entries);
    Diff { entries }
}

fn walk(path: &mut Path, prev: Option<&Json>, curr: Option<&Json>, out: &mut Vec<DiffEntry>) {
    let prev = prev.filter(|v| !v.is_null());
    let curr = curr.filter(|v| !v.is_null());
    match (prev, curr) {
        (None, None) => {}
        (None, Some(new)) => leaves(path, new, DiffKind::Added, out),
        (Some(old), None) => leaves(path, old, DiffKind::Removed, out),
        (Some(Json::Object(a)), Some(Json::Object(b))) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            for k in keys {
                path.push(PathSegment::Key(k.clone()));
                walk(path, a.get(k), b.get(k), out);
                path.pop();
            }
        }
        (Some(Json::Array(a)), Some(Json::Array(b))) => {
            for i in 0..a.len().max(b.len()) {
                path.push(PathSegment::Index(i));
                walk(path, a.get(i), b.get(i), out);
                path.pop();
            }
        }
        (Some(old), Some(new)) if is_leaf(old) && is_leaf(new) => {
            if old != new {
                out.push(DiffEntry { path: path.clone(), kind: DiffKind::Changed, old: Some(old.clone()), new: Some(new.clone()) });
            }
        }
        (Some(old), Some(new)) => {
            leaves(path, old, DiffKind::Removed, out);
            leaves(path, new, DiffKind::Added, out);
        }
    }
}

fn leaves(path: &mut Path, v: &Json, kind: DiffKind, out: &mut Vec<DiffEntry>) {
    match v {
        Json::Null => {}
        Json::Object(map) if !is_hollow(v) => {
            let keys: BTreeSet<&String> = map.keys().collect();
            for k in keys {
                path.push(PathSegment::Key(k.clone()));
                leaves(path, &map[k], kind, out);
                path.pop();
            }
        }
        Json::Array(arr) if !is_hollow(v) => {
            for (i, vv) in arr.iter().enumerate() {
                path.push(PathSegment::Index(i));
                leaves(path, vv, kind, out);
                path.pop();
            }
        }
        leaf => {
            let (old, new) = match kind {
                DiffKind::Removed => (Some(leaf.clone()), None),
                _ => (None, Some(leaf.clone())),
            };
            out.push(DiffEntry { path: path.clone(), kind, old, new });
        }
    }
}

/// A container holding nothing but nulls and other hollow containers (or nothing at all).
fn is_hollow(v: &Json) -> bool {
    let empty = |child: &Json| child.is_null() || is_hollow(child);
    match v {
        Json::Object(map) => map.values().all(empty),
        Json::Array(arr) => arr.iter().all(empty),
        _ => false,
    }
}

fn is_leaf(v: &Json) -> bool { !(v.is_object() || v.is_array()) || is_hollow(v) }
