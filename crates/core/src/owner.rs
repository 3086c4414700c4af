//! Owner-reference lookups.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::snapshot::pluck_array;
use crate::CoreError;

/// True iff `metadata.ownerReferences` holds an entry matching all of `api_version`, `kind`
/// and `owner_name`. Absent or malformed owner data reads as "not owned".
pub fn owned_by(obj: &Value, api_version: &str, kind: &str, owner_name: &str) -> bool {
    let Some(refs) = pluck_array(obj, &["metadata", "ownerReferences"]) else { return false };
    refs.iter().filter_map(Value::as_object).any(|r| {
        let field = |k: &str| r.get(k).and_then(Value::as_str);
        field("apiVersion") == Some(api_version) && field("kind") == Some(kind) && field("name") == Some(owner_name)
    })
}

/// An `(apiVersion, kind)` pair an owner may be declared under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerKind {
    pub api_version: String,
    pub kind: String,
}

impl OwnerKind {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { api_version: api_version.into(), kind: kind.into() }
    }
}

impl FromStr for OwnerKind {
    type Err = CoreError;

    /// Accepts `version/Kind` or `group/version/Kind`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parts: Vec<&str> = s.split('/').collect();
        if !(2..=3).contains(&parts.len()) || parts.iter().any(|p| p.is_empty()) {
            return Err(CoreError::InvalidOwnerKind(s.to_string()));
        }
        let (api_version, kind) = s.rsplit_once('/').ok_or_else(|| CoreError::InvalidOwnerKind(s.to_string()))?;
        Ok(Self::new(api_version, kind))
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

/// API-group spellings under which the same logical controller has been served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerKinds(Vec<OwnerKind>);

impl OwnerKinds {
    pub fn new(kinds: Vec<OwnerKind>) -> Self { Self(kinds) }

    /// Every group/version Deployments have been served under.
    pub fn deployments() -> Self {
        Self(
            ["extensions/v1beta1", "apps/v1beta1", "apps/v1beta2", "apps/v1"]
                .into_iter()
                .map(|gv| OwnerKind::new(gv, "Deployment"))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &OwnerKind> { self.0.iter() }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Add entries not already present, keeping order.
    pub fn extend(&mut self, more: impl IntoIterator<Item = OwnerKind>) {
        for k in more {
            if !self.0.contains(&k) {
                self.0.push(k);
            }
        }
    }

    /// Owned by `owner_name` under any of the known spellings.
    pub fn owns(&self, obj: &Value, owner_name: &str) -> bool {
        self.0.iter().any(|k| owned_by(obj, &k.api_version, &k.kind, owner_name))
    }
}

impl Default for OwnerKinds {
    fn default() -> Self { Self::deployments() }
}
