//! kspy core types: snapshot trees, watch events, identities.

#![forbid(unsafe_code)]

use std::fmt;

use serde_json::Value;

pub mod owner;
pub mod revision;
pub mod snapshot;
pub mod style;

pub use owner::{owned_by, OwnerKind, OwnerKinds};
pub use revision::{parse_revision, RevisionError, REVISION_ANNOTATION};
pub use snapshot::{pluck, pluck_array, pluck_i64, pluck_object, pluck_str, Snapshot};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Object ID must be of the form <name> or <namespace>/<name>, got {0:?}")]
    InvalidObjectId(String),
    #[error("invalid owner kind {0:?} (expect version/Kind or group/version/Kind)")]
    InvalidOwnerKind(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Added,
    Modified,
    Deleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Added => "ADDED",
            EventKind::Modified => "MODIFIED",
            EventKind::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change notification: the kind of change plus the full object as of that change.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    pub kind: EventKind,
    pub object: Snapshot,
}

impl WatchEvent {
    pub fn new(kind: EventKind, object: Snapshot) -> Self { Self { kind, object } }

    pub fn is_deleted(&self) -> bool { self.kind == EventKind::Deleted }

    pub fn name(&self) -> &str { pluck_str(&self.object, &["metadata", "name"]).unwrap_or("") }

    pub fn identity(&self) -> ResourceId { ResourceId::of(&self.object) }
}

/// `(apiVersion, kind, namespace, name)` as declared by a snapshot. Missing fields read as "".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn of(obj: &Value) -> Self {
        let field = |path: &[&str]| pluck_str(obj, path).unwrap_or("").to_string();
        Self {
            api_version: field(&["apiVersion"]),
            kind: field(&["kind"]),
            namespace: field(&["metadata", "namespace"]),
            name: field(&["metadata", "name"]),
        }
    }

    /// `apiVersion/kind`, e.g. `apps/v1/Deployment`.
    pub fn type_key(&self) -> String { format!("{}/{}", self.api_version, self.kind) }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Parse `[<namespace>/]<name>`. The namespace is `None` when omitted so callers can
/// fall back to the kube-config context namespace.
pub fn parse_object_id(id: &str) -> Result<(Option<String>, String), CoreError> {
    let parts: Vec<&str> = id.split('/').collect();
    match parts.as_slice() {
        [name] if !name.is_empty() => Ok((None, (*name).to_string())),
        [ns, name] if !ns.is_empty() => Ok((Some((*ns).to_string()), (*name).to_string())),
        _ => Err(CoreError::InvalidObjectId(id.to_string())),
    }
}

/// Normalize a raw object before it enters the pipeline.
pub fn normalize(mut raw: Value) -> Value {
    #[cfg(feature = "strip-managed-fields")]
    if let Some(meta) = raw.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.remove("managedFields");
    }
    raw
}
