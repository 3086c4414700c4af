//! Single-object streaming: turn successive watch events into creation dumps, diffs,
//! or recorded snapshots.

use std::io::{self, Write};

use kspy_core::style::{Paint, Style};
use kspy_core::{EventKind, WatchEvent};
use serde_json::Value as Json;
use tracing::debug;

use crate::{diff, Diff};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Whole object.
    Full,
    /// Only the `status` sub-tree.
    StatusOnly,
}

impl Mode {
    /// Printed once before the first event arrives.
    pub fn banner(&self, paint: &dyn Paint, api_version: &str, kind: &str, object: &str) -> String {
        let text = match self {
            Mode::Full => format!("Watching for changes on {api_version} {kind} {object}"),
            Mode::StatusOnly => format!("Watching status of {api_version} {kind} {object}"),
        };
        paint.paint(Style::Green, &text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Render {
    Created(Json),
    Changed(EventKind, Diff),
    Unchanged(EventKind),
    Deleted,
}

impl Render {
    /// Heading plus body; `Unchanged` renders as nothing.
    pub fn lines(&self, paint: &dyn Paint) -> Vec<String> {
        match self {
            Render::Created(tree) => {
                let body = serde_json::to_string_pretty(tree).unwrap_or_else(|_| tree.to_string());
                let mut out = vec![paint.paint(Style::BlueBold, "CREATED")];
                out.extend(body.lines().map(|l| paint.paint(Style::Green, l)));
                out
            }
            Render::Changed(kind, d) => {
                let mut out = vec![paint.paint(Style::BlueBold, kind.as_str())];
                out.extend(d.render(paint));
                out
            }
            Render::Unchanged(_) => Vec::new(),
            Render::Deleted => vec![paint.paint(Style::BlueBold, EventKind::Deleted.as_str())],
        }
    }
}

/// Holds the one-step history for `changes` / `status` streaming.
#[derive(Debug)]
pub struct ChangeTracker {
    mode: Mode,
    last: Option<Json>,
    gone: bool,
}

impl ChangeTracker {
    pub fn new(mode: Mode) -> Self { Self { mode, last: None, gone: false } }

    pub fn observe(&mut self, ev: &WatchEvent) -> Render {
        let current = match self.mode {
            Mode::Full => ev.object.clone(),
            Mode::StatusOnly => status_of(&ev.object),
        };
        let out = match (&self.last, ev.kind) {
            (_, EventKind::Deleted) => Render::Deleted,
            (Some(prev), kind) if !self.gone => {
                let d = diff(prev, &current);
                if d.has_changes() { Render::Changed(kind, d) } else { Render::Unchanged(kind) }
            }
            _ => Render::Created(current.clone()),
        };
        debug!(kind = %ev.kind, name = ev.name(), "observed");
        self.gone = ev.is_deleted();
        self.last = Some(current);
        out
    }
}

fn status_of(obj: &Json) -> Json {
    match obj.get("status") {
        Some(s @ Json::Object(_)) => s.clone(),
        _ => Json::Object(serde_json::Map::new()),
    }
}

/// Emits the full object whenever it first appears or actually changes.
#[derive(Debug, Default)]
pub struct RecordTracker {
    last: Option<Json>,
    gone: bool,
}

impl RecordTracker {
    pub fn new() -> Self { Self::default() }

    pub fn observe(&mut self, ev: &WatchEvent) -> Option<Json> {
        let out = match (&self.last, ev.kind) {
            (_, EventKind::Deleted) => None,
            (Some(prev), _) if !self.gone => diff(prev, &ev.object).has_changes().then(|| ev.object.clone()),
            _ => Some(ev.object.clone()),
        };
        self.gone = ev.is_deleted();
        self.last = Some(ev.object.clone());
        out
    }
}

/// Writes recorded objects as the elements of one pretty-printed JSON array.
pub struct RecordWriter<W: Write> {
    out: W,
    written: usize,
}

impl<W: Write> RecordWriter<W> {
    pub fn begin(mut out: W) -> io::Result<Self> {
        out.write_all(b"[\n")?;
        out.flush()?;
        Ok(Self { out, written: 0 })
    }

    pub fn push(&mut self, obj: &Json) -> io::Result<()> {
        if self.written > 0 {
            self.out.write_all(b",\n")?;
        }
        let body = serde_json::to_string_pretty(obj).map_err(io::Error::other)?;
        let indented: Vec<String> = body.lines().map(|l| format!("  {l}")).collect();
        self.out.write_all(indented.join("\n").as_bytes())?;
        self.out.flush()?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize { self.written }

    pub fn finish(mut self) -> io::Result<W> {
        self.out.write_all(b"\n]\n")?;
        self.out.flush()?;
        Ok(self.out)
    }
}
