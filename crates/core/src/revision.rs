//! Rollout revision annotation shared by Deployments and their ReplicaSets.

use serde_json::Value;

use crate::snapshot::pluck;

pub const REVISION_ANNOTATION: &str = "deployment.kubernetes.io/revision";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RevisionError {
    #[error("revision annotation missing")]
    Missing,
    #[error("revision annotation is not an integer: {0:?}")]
    Invalid(String),
}

pub fn parse_revision(obj: &Value) -> Result<i64, RevisionError> {
    let raw = pluck(obj, &["metadata", "annotations", REVISION_ANNOTATION]).ok_or(RevisionError::Missing)?;
    let s = raw.as_str().ok_or_else(|| RevisionError::Invalid(raw.to_string()))?;
    s.parse::<i64>().map_err(|_| RevisionError::Invalid(s.to_string()))
}
