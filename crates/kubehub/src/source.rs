//! Resource watch sources: the seam between the multiplexer and the cluster.

use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use kspy_core::{EventKind, WatchEvent};
use kube::{
    api::{Api, WatchEvent as KubeEvent, WatchParams},
    core::{ApiResource, DynamicObject, GroupVersionKind},
    discovery::{Discovery, Scope},
    Client,
};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::{Selector, WatchError};

const REWATCH_BACKOFF: Duration = Duration::from_secs(2);

/// Never-ending, order-preserving sequence of events for one target.
pub type EventStream = BoxStream<'static, std::result::Result<WatchEvent, WatchError>>;

/// A kind (with an apiVersion hint) plus the selector narrowing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub api_version: String,
    pub kind: String,
    pub selector: Selector,
}

impl WatchTarget {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>, selector: Selector) -> Self {
        Self { api_version: api_version.into(), kind: kind.into(), selector }
    }
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.api_version, self.kind, self.selector)
    }
}

#[async_trait::async_trait]
pub trait WatchSource: Send + Sync {
    /// Open a stream for `target`. Errors here are fatal to the caller; errors inside the
    /// stream are transient.
    async fn open(&self, target: &WatchTarget) -> Result<EventStream>;
}

/// kube-rs backed source using a dynamic (untyped) API per resource.
pub struct KubeSource {
    client: Client,
    discovery: OnceCell<Discovery>,
}

impl KubeSource {
    pub fn new(client: Client) -> Self { Self { client, discovery: OnceCell::new() } }

    /// Build a client from the ambient kube config (KUBECONFIG, in-cluster, ...).
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default().await.context("unable to read kube config")?;
        Ok(Self::new(client))
    }

    async fn discovery(&self) -> Result<&Discovery> {
        self.discovery
            .get_or_try_init(|| async {
                let d = Discovery::new(self.client.clone()).run().await.context("running API discovery")?;
                Ok::<_, anyhow::Error>(d)
            })
            .await
    }

    /// Resolve `api_version`/`kind`; when that exact version is not served, fall back to the
    /// preferred version of the same kind, same group first.
    async fn resolve(&self, api_version: &str, kind: &str) -> Result<(ApiResource, bool)> {
        let (group, version) = split_api_version(api_version);
        let discovery = self.discovery().await?;
        if let Some((ar, caps)) = discovery.resolve_gvk(&GroupVersionKind::gvk(group, version, kind)) {
            return Ok((ar, matches!(caps.scope, Scope::Namespaced)));
        }
        let mut other_group = None;
        for g in discovery.groups() {
            for (ar, caps) in g.recommended_resources() {
                if !ar.kind.eq_ignore_ascii_case(kind) {
                    continue;
                }
                let namespaced = matches!(caps.scope, Scope::Namespaced);
                if ar.group == group {
                    info!(requested = %api_version, served = %ar.api_version, kind = %ar.kind, "apiVersion not served; using preferred version");
                    return Ok((ar, namespaced));
                }
                other_group.get_or_insert((ar, namespaced));
            }
        }
        match other_group {
            Some((ar, namespaced)) => {
                info!(requested = %api_version, served = %ar.api_version, kind = %ar.kind, "apiVersion not served; using another group");
                Ok((ar, namespaced))
            }
            None => Err(anyhow!(WatchError::NotServed(format!("{api_version}/{kind}")))),
        }
    }
}

#[async_trait::async_trait]
impl WatchSource for KubeSource {
    async fn open(&self, target: &WatchTarget) -> Result<EventStream> {
        let (ar, namespaced) = self.resolve(&target.api_version, &target.kind).await?;
        let ns = target.selector.namespace();
        let api: Api<DynamicObject> = if namespaced && !ns.is_empty() {
            Api::namespaced_with(self.client.clone(), ns, &ar)
        } else {
            Api::all_with(self.client.clone(), &ar)
        };
        let mut params = WatchParams::default();
        if let Some(fields) = target.selector.field_selector() {
            params = params.fields(&fields);
        }
        let first = api
            .watch(&params, "0")
            .await
            .with_context(|| format!("opening watch for {target}"))?
            .boxed();
        info!(target = %target, served = %ar.api_version, "watch opened");
        Ok(rewatching(api, params, first, target.to_string()))
    }
}

/// Follow a kube watch forever: when the server closes it, resume from the last seen
/// resourceVersion; on 410 Gone, start over from "0".
fn rewatching(
    api: Api<DynamicObject>,
    params: WatchParams,
    first: BoxStream<'static, kube::Result<KubeEvent<DynamicObject>>>,
    label: String,
) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut version = String::from("0");
        let mut current = Some(first);
        loop {
            let mut stream = match current.take() {
                Some(s) => s,
                None => match api.watch(&params, &version).await {
                    Ok(s) => s.boxed(),
                    Err(e) => {
                        yield Err(WatchError::Stream(e.to_string()));
                        tokio::time::sleep(REWATCH_BACKOFF).await;
                        continue;
                    }
                },
            };
            while let Some(item) = stream.next().await {
                match item {
                    Ok(KubeEvent::Added(o)) => { yield convert(EventKind::Added, o, &mut version); }
                    Ok(KubeEvent::Modified(o)) => { yield convert(EventKind::Modified, o, &mut version); }
                    Ok(KubeEvent::Deleted(o)) => { yield convert(EventKind::Deleted, o, &mut version); }
                    Ok(KubeEvent::Bookmark(b)) => { version = b.metadata.resource_version; }
                    Ok(KubeEvent::Error(e)) => {
                        let gone = e.code == 410;
                        yield Err(WatchError::Server { code: e.code, message: e.message });
                        if gone {
                            version = String::from("0");
                            break;
                        }
                    }
                    Err(e) => { yield Err(WatchError::Stream(e.to_string())); }
                }
            }
            debug!(target = %label, rv = %version, "watch closed by server; re-watching");
        }
    })
}

fn convert(kind: EventKind, obj: DynamicObject, version: &mut String) -> std::result::Result<WatchEvent, WatchError> {
    if let Some(rv) = obj.metadata.resource_version.as_ref() {
        version.clone_from(rv);
    }
    let raw = serde_json::to_value(&obj).map_err(|e| WatchError::Decode(e.to_string()))?;
    Ok(WatchEvent::new(kind, kspy_core::normalize(raw)))
}

/// `apps/v1` -> (`apps`, `v1`); `v1` -> (``, `v1`).
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    api_version.split_once('/').unwrap_or(("", api_version))
}
