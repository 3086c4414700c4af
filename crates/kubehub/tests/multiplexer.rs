#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kspy_core::{EventKind, OwnerKinds, WatchEvent};
use kspy_kubehub::{EventStream, Multiplexer, Selector, WatchError, WatchSource, WatchTarget};

fn obj(ns: &str, name: &str, owner: Option<&str>) -> serde_json::Value {
    let mut v = serde_json::json!({"metadata": {"namespace": ns, "name": name}});
    if let Some(owner) = owner {
        v["metadata"]["ownerReferences"] = serde_json::json!([{"apiVersion": "apps/v1", "kind": "Deployment", "name": owner}]);
    }
    v
}

fn ev(kind: EventKind, v: serde_json::Value) -> Result<WatchEvent, WatchError> {
    Ok(WatchEvent::new(kind, v))
}

/// Replays a fixed list per kind, then ends.
#[derive(Default)]
struct Scripted {
    scripts: HashMap<&'static str, Vec<Result<WatchEvent, WatchError>>>,
    pulled: Arc<AtomicUsize>,
}

impl Scripted {
    fn with(mut self, kind: &'static str, events: Vec<Result<WatchEvent, WatchError>>) -> Self {
        self.scripts.insert(kind, events);
        self
    }
}

#[async_trait::async_trait]
impl WatchSource for Scripted {
    async fn open(&self, target: &WatchTarget) -> anyhow::Result<EventStream> {
        let Some(events) = self.scripts.get(target.kind.as_str()) else {
            anyhow::bail!("the server could not find the requested resource {}", target.kind);
        };
        let events: Vec<_> = events
            .iter()
            .map(|r| match r {
                Ok(e) => Ok(e.clone()),
                Err(e) => Err(WatchError::Stream(e.to_string())),
            })
            .collect();
        let pulled = Arc::clone(&self.pulled);
        Ok(futures::stream::iter(events)
            .inspect(move |_| {
                pulled.fetch_add(1, Ordering::SeqCst);
            })
            .boxed())
    }
}

async fn drain(mut mux: Multiplexer<&'static str>) -> Vec<(&'static str, String)> {
    let mut out = Vec::new();
    while let Some((tag, e)) = mux.next().await {
        out.push((tag, e.name().to_string()));
    }
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fan_in_keeps_per_source_order() {
    let source = Scripted::default()
        .with("Service", vec![
            ev(EventKind::Added, obj("prod", "web", None)),
            ev(EventKind::Modified, obj("prod", "web", None)),
        ])
        .with("Pod", vec![
            ev(EventKind::Added, obj("prod", "web-1", Some("web"))),
            ev(EventKind::Added, obj("prod", "web-2", Some("web"))),
            ev(EventKind::Deleted, obj("prod", "web-1", Some("web"))),
        ]);
    let mux = Multiplexer::open(&source, vec![
        ("svc", WatchTarget::new("v1", "Service", Selector::by_name("prod", "web"))),
        ("pod", WatchTarget::new("v1", "Pod", Selector::all("prod"))),
    ])
    .await
    .expect("open");
    assert_eq!(mux.sources(), 2);

    let got = drain(mux).await;
    assert_eq!(got.len(), 5);
    let pods: Vec<_> = got.iter().filter(|(t, _)| *t == "pod").map(|(_, n)| n.as_str()).collect();
    assert_eq!(pods, vec!["web-1", "web-2", "web-1"]);
    let svcs: Vec<_> = got.iter().filter(|(t, _)| *t == "svc").map(|(_, n)| n.as_str()).collect();
    assert_eq!(svcs, vec!["web", "web"]);
}

#[tokio::test]
async fn selector_rejects_never_reach_consumer() {
    let source = Scripted::default()
        .with("ReplicaSet", vec![
            ev(EventKind::Added, obj("prod", "web-5d8f", Some("web"))),
            ev(EventKind::Added, obj("prod", "api-77aa", Some("api"))),
            ev(EventKind::Added, obj("prod", "orphan", None)),
            ev(EventKind::Added, obj("dev", "web-0000", Some("web"))),
        ])
        .with("Service", vec![
            ev(EventKind::Added, obj("prod", "web-canary", None)),
            ev(EventKind::Added, obj("prod", "web", None)),
        ]);
    let mux = Multiplexer::open(&source, vec![
        ("rs", WatchTarget::new("apps/v1", "ReplicaSet", Selector::by_owner("prod", "web", OwnerKinds::default()))),
        ("svc", WatchTarget::new("v1", "Service", Selector::by_name("prod", "web"))),
    ])
    .await
    .expect("open");

    let mut got = drain(mux).await;
    got.sort();
    assert_eq!(got, vec![("rs", "web-5d8f".to_string()), ("svc", "web".to_string())]);
}

#[tokio::test]
async fn stream_errors_are_skipped() {
    let source = Scripted::default().with("Pod", vec![
        ev(EventKind::Added, obj("prod", "a", None)),
        Err(WatchError::Server { code: 500, message: "etcd hiccup".into() }),
        ev(EventKind::Added, obj("prod", "b", None)),
    ]);
    let mux = Multiplexer::open(&source, vec![("pod", WatchTarget::new("v1", "Pod", Selector::all("prod")))])
        .await
        .expect("open");
    let names: Vec<_> = drain(mux).await.into_iter().map(|(_, n)| n).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn failed_open_is_fatal() {
    let source = Scripted::default().with("Service", vec![]);
    let res = Multiplexer::open(&source, vec![
        ("svc", WatchTarget::new("v1", "Service", Selector::by_name("prod", "web"))),
        ("ep", WatchTarget::new("v1", "Endpoints", Selector::by_name("prod", "web"))),
    ])
    .await;
    let err = res.err().expect("open must fail");
    let msg = format!("{err:#}");
    assert!(msg.contains("cannot watch v1/Endpoints prod/web"), "{msg}");
    assert!(msg.contains("could not find the requested resource"), "{msg}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stalled_consumer_stalls_the_source() {
    let events = (0..20).map(|i| ev(EventKind::Added, obj("prod", &format!("p{i}"), None))).collect();
    let source = Scripted::default().with("Pod", events);
    let pulled = Arc::clone(&source.pulled);
    let mut mux = Multiplexer::open(&source, vec![("pod", WatchTarget::new("v1", "Pod", Selector::all("prod")))])
        .await
        .expect("open");

    tokio::time::sleep(Duration::from_millis(50)).await;
    // one event parked in the channel slot, one blocked in send
    assert!(pulled.load(Ordering::SeqCst) <= 2, "source ran ahead: {}", pulled.load(Ordering::SeqCst));

    let (_, first) = mux.next().await.expect("event");
    assert_eq!(first.name(), "p0");
}
