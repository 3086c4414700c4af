//! Which instances of a kind a watch should hand to the consumer.

use std::fmt;

use kspy_core::{pluck_str, OwnerKinds};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// One named object.
    ByName { namespace: String, name: String },
    /// Objects whose owner references name `owner` under any of `owner_kinds`.
    ByOwner { namespace: String, owner: String, owner_kinds: OwnerKinds },
    /// Everything in the namespace.
    All { namespace: String },
}

impl Selector {
    pub fn by_name(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ByName { namespace: namespace.into(), name: name.into() }
    }

    pub fn by_owner(namespace: impl Into<String>, owner: impl Into<String>, owner_kinds: OwnerKinds) -> Self {
        Self::ByOwner { namespace: namespace.into(), owner: owner.into(), owner_kinds }
    }

    pub fn all(namespace: impl Into<String>) -> Self { Self::All { namespace: namespace.into() } }

    pub fn namespace(&self) -> &str {
        match self {
            Self::ByName { namespace, .. } | Self::ByOwner { namespace, .. } | Self::All { namespace } => namespace,
        }
    }

    /// Server-side field selector, when the selector can be narrowed that way.
    pub fn field_selector(&self) -> Option<String> {
        match self {
            Self::ByName { name, .. } => Some(format!("metadata.name={name}")),
            _ => None,
        }
    }

    pub fn matches(&self, obj: &Value) -> bool {
        let ns = pluck_str(obj, &["metadata", "namespace"]).unwrap_or("");
        let in_scope = self.namespace().is_empty() || ns.is_empty() || ns == self.namespace();
        in_scope
            && match self {
                Self::ByName { name, .. } => pluck_str(obj, &["metadata", "name"]) == Some(name.as_str()),
                Self::ByOwner { owner, owner_kinds, .. } => owner_kinds.owns(obj, owner),
                Self::All { .. } => true,
            }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByName { namespace, name } => write!(f, "{namespace}/{name}"),
            Self::ByOwner { namespace, owner, .. } => write!(f, "{namespace}/* owned by {owner}"),
            Self::All { namespace } => write!(f, "{namespace}/*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(ns: &str, name: &str, owner: Option<(&str, &str)>) -> Value {
        let mut v = json!({"metadata": {"namespace": ns, "name": name}});
        if let Some((api_version, owner)) = owner {
            v["metadata"]["ownerReferences"] = json!([{"apiVersion": api_version, "kind": "Deployment", "name": owner}]);
        }
        v
    }

    #[test]
    fn by_name_requires_exact_name_in_namespace() {
        let sel = Selector::by_name("prod", "web");
        assert!(sel.matches(&obj("prod", "web", None)));
        assert!(!sel.matches(&obj("prod", "web-2", None)));
        assert!(!sel.matches(&obj("dev", "web", None)));
        assert_eq!(sel.field_selector().as_deref(), Some("metadata.name=web"));
    }

    #[test]
    fn by_owner_accepts_any_known_group() {
        let sel = Selector::by_owner("prod", "web", OwnerKinds::default());
        assert!(sel.matches(&obj("prod", "web-5d8f", Some(("apps/v1", "web")))));
        assert!(sel.matches(&obj("prod", "web-77aa", Some(("extensions/v1beta1", "web")))));
        assert!(!sel.matches(&obj("prod", "api-1234", Some(("apps/v1", "api")))));
        assert!(!sel.matches(&obj("prod", "web-orphan", None)));
        assert_eq!(sel.field_selector(), None);
    }

    #[test]
    fn all_accepts_everything_in_scope() {
        let sel = Selector::all("prod");
        assert!(sel.matches(&obj("prod", "anything", None)));
        assert!(sel.matches(&json!({})));
        assert!(!sel.matches(&obj("kube-system", "coredns", None)));
        assert_eq!(sel.to_string(), "prod/*");
    }
}
