//! kspy store: the resource state table a trace session derives its status from.
//!
//! Only the most recent event per tracked object is retained. Singleton kinds hold one
//! event; collection kinds hold one event per object name and forget deleted objects.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use kspy_core::{EventKind, WatchEvent};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, trace};

/// Resource kinds a trace session tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackedKind {
    Service,
    Endpoints,
    Deployment,
    ReplicaSet,
    Pod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// The one object the session is about.
    Singleton,
    /// Every matching object, keyed by name.
    Collection,
}

impl TrackedKind {
    pub const ALL: [TrackedKind; 5] =
        [TrackedKind::Service, TrackedKind::Endpoints, TrackedKind::Deployment, TrackedKind::ReplicaSet, TrackedKind::Pod];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedKind::Service => "Service",
            TrackedKind::Endpoints => "Endpoints",
            TrackedKind::Deployment => "Deployment",
            TrackedKind::ReplicaSet => "ReplicaSet",
            TrackedKind::Pod => "Pod",
        }
    }

    /// apiVersion a session watches this kind under.
    pub fn api_version(&self) -> &'static str {
        match self {
            TrackedKind::Service | TrackedKind::Endpoints | TrackedKind::Pod => "v1",
            TrackedKind::Deployment | TrackedKind::ReplicaSet => "apps/v1",
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            TrackedKind::Service | TrackedKind::Endpoints | TrackedKind::Deployment => Shape::Singleton,
            TrackedKind::ReplicaSet | TrackedKind::Pod => Shape::Collection,
        }
    }

    /// Top-level fields that describe live state and are dropped once the object is deleted.
    fn live_fields(&self) -> &'static [&'static str] {
        match self {
            TrackedKind::Endpoints => &["spec", "status", "subsets"],
            _ => &["spec", "status"],
        }
    }
}

impl fmt::Display for TrackedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
enum Slot {
    Singleton(WatchEvent),
    Collection(BTreeMap<String, WatchEvent>),
}

/// Last event per tracked object. Owned by a single loop; no interior locking.
#[derive(Debug, Default)]
pub struct ResourceStateTable {
    slots: FxHashMap<TrackedKind, Slot>,
    epoch: u64,
}

impl ResourceStateTable {
    pub fn new() -> Self { Self::default() }

    /// Number of events recorded so far.
    pub fn epoch(&self) -> u64 { self.epoch }

    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    /// Record `event` as the latest state for its object.
    pub fn record(&mut self, kind: TrackedKind, event: WatchEvent) {
        self.epoch = self.epoch.saturating_add(1);
        match kind.shape() {
            Shape::Singleton => {
                let event = if event.is_deleted() { prune(kind, event) } else { event };
                trace!(kind = %kind, event = %event.kind, "singleton updated");
                self.slots.insert(kind, Slot::Singleton(event));
            }
            Shape::Collection => {
                let name = event.name().to_string();
                let slot = self.slots.entry(kind).or_insert_with(|| Slot::Collection(BTreeMap::new()));
                let Slot::Collection(items) = slot else { return };
                if event.kind == EventKind::Deleted {
                    if items.remove(&name).is_some() {
                        debug!(kind = %kind, name = %name, "entry removed");
                    }
                } else {
                    items.insert(name, event);
                }
            }
        }
    }

    /// Latest event for a singleton kind; `None` before the first event or for collection kinds.
    pub fn singleton(&self, kind: TrackedKind) -> Option<&WatchEvent> {
        match self.slots.get(&kind) {
            Some(Slot::Singleton(ev)) => Some(ev),
            _ => None,
        }
    }

    /// Live objects of a collection kind, in name order.
    pub fn collection(&self, kind: TrackedKind) -> impl Iterator<Item = &WatchEvent> + '_ {
        let items = match self.slots.get(&kind) {
            Some(Slot::Collection(items)) => Some(items),
            _ => None,
        };
        items.into_iter().flat_map(|m| m.values())
    }

    pub fn collection_len(&self, kind: TrackedKind) -> usize {
        match self.slots.get(&kind) {
            Some(Slot::Collection(items)) => items.len(),
            _ => 0,
        }
    }
}

fn prune(kind: TrackedKind, mut event: WatchEvent) -> WatchEvent {
    if let Value::Object(map) = &mut event.object {
        for field in kind.live_fields() {
            map.remove(*field);
        }
    }
    event
}
