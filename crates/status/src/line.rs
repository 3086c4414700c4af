//! Styled status lines: the unit a rule produces and a sink renders.

use kspy_core::style::{Paint, Plain, Style};
use kspy_core::{EventKind, ResourceId};
use serde_json::Value;

const STATUS_INDENT: &str = "    ";
const ITEM_PREFIX: &str = "       - ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
    Pending,
}

impl Status {
    pub fn marker(&self) -> &'static str {
        match self {
            Status::Success => "✅",
            Status::Failure => "❌",
            Status::Pending => "⌛",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// `[EVENT apiVersion/kind]  ns/name`
    Header,
    /// Indented judgement with a status marker.
    Status(Status),
    /// Unindented judgement with a status marker.
    Note(Status),
    /// Bullet under the preceding judgement.
    Item(Status),
    /// Free text.
    Heading,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    kind: LineKind,
    spans: Vec<(Style, String)>,
    faint: bool,
}

impl Line {
    fn new(kind: LineKind) -> Self { Self { kind, spans: Vec::new(), faint: false } }

    pub fn success(text: impl Into<String>) -> Self { Self::new(LineKind::Status(Status::Success)).push(Style::Plain, text) }

    pub fn failure(text: impl Into<String>) -> Self { Self::new(LineKind::Status(Status::Failure)).push(Style::Plain, text) }

    pub fn pending(text: impl Into<String>) -> Self { Self::new(LineKind::Status(Status::Pending)).push(Style::Plain, text) }

    pub fn note(status: Status, text: impl Into<String>) -> Self { Self::new(LineKind::Note(status)).push(Style::Plain, text) }

    /// Empty bullet; fill with [`Line::push`].
    pub fn item(status: Status) -> Self { Self::new(LineKind::Item(status)) }

    pub fn heading(style: Style, text: impl Into<String>) -> Self { Self::new(LineKind::Heading).push(style, text) }

    pub fn blank() -> Self { Self::new(LineKind::Blank) }

    pub fn header(event: EventKind, obj: &Value) -> Self {
        let id = ResourceId::of(obj);
        Self::new(LineKind::Header)
            .push(Style::Plain, "[")
            .push(event_style(event), event.as_str())
            .push(Style::Plain, " ")
            .push(Style::CyanBold, id.type_key())
            .push(Style::Plain, format!("]  {id}"))
    }

    pub fn push(mut self, style: Style, text: impl Into<String>) -> Self {
        self.spans.push((style, text.into()));
        self
    }

    /// Render every span faint, for superseded objects.
    pub fn faint(mut self) -> Self {
        self.faint = true;
        self
    }

    pub fn kind(&self) -> LineKind { self.kind }

    pub fn is_faint(&self) -> bool { self.faint }

    /// Judgement carried by the line, if any.
    pub fn status(&self) -> Option<Status> {
        match self.kind {
            LineKind::Status(s) | LineKind::Note(s) | LineKind::Item(s) => Some(s),
            _ => None,
        }
    }

    /// Span text without prefix or styling.
    pub fn text(&self) -> String { self.spans.iter().map(|(_, t)| t.as_str()).collect() }

    pub fn render(&self, paint: &dyn Paint) -> String {
        let body: String = self
            .spans
            .iter()
            .map(|(style, text)| paint.paint(if self.faint { Style::Faint } else { *style }, text))
            .collect();
        let marker = |s: Status| paint.paint(if self.faint { Style::Faint } else { Style::Plain }, s.marker());
        match self.kind {
            LineKind::Status(s) => format!("{STATUS_INDENT}{} {body}", marker(s)),
            LineKind::Note(s) => format!("{} {body}", marker(s)),
            LineKind::Item(_) => format!("{ITEM_PREFIX}{body}"),
            LineKind::Header | LineKind::Heading | LineKind::Blank => body,
        }
    }

    pub fn plain_text(&self) -> String { self.render(&Plain) }
}

/// Deleted objects read red, everything else green.
pub fn event_style(event: EventKind) -> Style {
    match event {
        EventKind::Deleted => Style::RedBold,
        _ => Style::Green,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_names_event_type_and_object() {
        let svc = json!({"apiVersion": "v1", "kind": "Service", "metadata": {"namespace": "prod", "name": "web"}});
        let l = Line::header(EventKind::Modified, &svc);
        assert_eq!(l.plain_text(), "[MODIFIED v1/Service]  prod/web");
        assert_eq!(l.status(), None);
    }

    #[test]
    fn prefixes_follow_line_kind() {
        assert_eq!(Line::success("ok").plain_text(), "    ✅ ok");
        assert_eq!(Line::failure("no").plain_text(), "    ❌ no");
        assert_eq!(Line::note(Status::Pending, "soon").plain_text(), "⌛ soon");
        let item = Line::item(Status::Success).push(Style::Green, "Ready").push(Style::Plain, " x");
        assert_eq!(item.plain_text(), "       - Ready x");
        assert_eq!(item.text(), "Ready x");
        assert_eq!(Line::blank().plain_text(), "");
    }

    #[test]
    fn faint_overrides_span_styles() {
        struct Tagged;
        impl Paint for Tagged {
            fn paint(&self, style: Style, text: &str) -> String { format!("<{style:?}>{text}") }
        }
        let l = Line::heading(Style::CyanBold, "x").faint();
        assert_eq!(l.render(&Tagged), "<Faint>x");
        assert!(l.is_faint());
    }
}
