//! Command-line configuration resolved into runtime values.

use anyhow::{Context, Result};
use kspy_core::{parse_object_id, OwnerKind, OwnerKinds};
use tracing::debug;

/// Default owner kinds plus any configured extras (`group/version/Kind` or `version/Kind`).
pub fn owner_kinds(extra: &[String]) -> Result<OwnerKinds> {
    let mut kinds = OwnerKinds::default();
    let parsed = extra
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<OwnerKind>())
        .collect::<Result<Vec<_>, _>>()?;
    kinds.extend(parsed);
    debug!(count = kinds.len(), "deployment owner kinds");
    Ok(kinds)
}

/// Split `[<namespace>/]<name>`, filling a missing namespace from the kube-config context.
pub async fn resolve_object(id: &str) -> Result<(String, String)> {
    let (namespace, name) = parse_object_id(id)?;
    let namespace = match namespace {
        Some(ns) => ns,
        None => kube::Config::infer().await.context("unable to read kube config")?.default_namespace,
    };
    Ok((namespace, name))
}
