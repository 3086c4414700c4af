//! Trace sessions: feed multiplexed events into the state table and redraw after each one.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use kspy_core::style::Style;
use kspy_core::{OwnerKinds, WatchEvent};
use kspy_kubehub::{Multiplexer, Selector, WatchTarget};
use kspy_store::{ResourceStateTable, TrackedKind};
use metrics::counter;
use tracing::{debug, info};

use crate::deployment::deployment_lines;
use crate::line::Line;
use crate::service::service_lines;
use crate::sink::DisplaySink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Service,
    Deployment,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown trace type {0:?}; expected one of: service (svc), deployment (deploy)")]
pub struct UnknownRule(pub String);

impl FromStr for Rule {
    type Err = UnknownRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "service" | "svc" => Ok(Rule::Service),
            "deployment" | "deploy" => Ok(Rule::Deployment),
            _ => Err(UnknownRule(s.to_string())),
        }
    }
}

impl Rule {
    /// The kind named on the command line.
    pub fn primary(&self) -> TrackedKind {
        match self {
            Rule::Service => TrackedKind::Service,
            Rule::Deployment => TrackedKind::Deployment,
        }
    }

    pub fn derive(&self, table: &ResourceStateTable) -> Vec<Line> {
        match self {
            Rule::Service => service_lines(table),
            Rule::Deployment => deployment_lines(table),
        }
    }

    /// Watches the rule needs for `namespace/name`.
    pub fn targets(&self, namespace: &str, name: &str, owner_kinds: &OwnerKinds) -> Vec<(TrackedKind, WatchTarget)> {
        let target = |kind: TrackedKind, selector: Selector| (kind, WatchTarget::new(kind.api_version(), kind.as_str(), selector));
        match self {
            Rule::Service => vec![
                target(TrackedKind::Service, Selector::by_name(namespace, name)),
                target(TrackedKind::Endpoints, Selector::by_name(namespace, name)),
            ],
            Rule::Deployment => vec![
                target(TrackedKind::Deployment, Selector::by_name(namespace, name)),
                target(TrackedKind::ReplicaSet, Selector::by_owner(namespace, name, owner_kinds.clone())),
                target(TrackedKind::Pod, Selector::all(namespace)),
            ],
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rule::Service => "service",
            Rule::Deployment => "deployment",
        })
    }
}

/// One `trace` invocation. Owns the state table; every event triggers a full re-derivation.
pub struct TraceSession {
    rule: Rule,
    namespace: String,
    name: String,
    table: ResourceStateTable,
}

impl TraceSession {
    pub fn new(rule: Rule, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { rule, namespace: namespace.into(), name: name.into(), table: ResourceStateTable::new() }
    }

    pub fn targets(&self, owner_kinds: &OwnerKinds) -> Vec<(TrackedKind, WatchTarget)> {
        self.rule.targets(&self.namespace, &self.name, owner_kinds)
    }

    pub fn table(&self) -> &ResourceStateTable { &self.table }

    pub fn apply(&mut self, kind: TrackedKind, event: WatchEvent) { self.table.record(kind, event) }

    /// Lines for the current table; a waiting banner until the first event arrives.
    pub fn frame(&self) -> Vec<Line> {
        if self.table.is_empty() {
            let text = format!("Waiting for {} '{}/{}'", self.rule.primary(), self.namespace, self.name);
            return vec![Line::heading(Style::CyanBold, text)];
        }
        self.rule.derive(&self.table)
    }

    pub fn draw<D: DisplaySink + ?Sized>(&self, sink: &mut D) -> Result<()> {
        for line in self.frame() {
            sink.write(&line).context("writing status line")?;
        }
        sink.flush().context("flushing status frame")?;
        counter!("kspy_render_passes_total", 1);
        Ok(())
    }

    /// Draw the waiting banner, then redraw after every event until all sources end.
    pub async fn run<D: DisplaySink + ?Sized>(&mut self, mux: &mut Multiplexer<TrackedKind>, sink: &mut D) -> Result<()> {
        info!(rule = %self.rule, ns = %self.namespace, name = %self.name, sources = mux.sources(), "trace started");
        self.draw(sink)?;
        while let Some((kind, event)) = mux.next().await {
            debug!(kind = %kind, event = %event.kind, name = event.name(), "trace event");
            self.apply(kind, event);
            self.draw(sink)?;
        }
        info!(events = self.table.epoch(), "all watch sources ended");
        Ok(())
    }
}
