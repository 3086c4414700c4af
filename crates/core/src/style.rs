//! Text styles. Renderers take a `&dyn Paint` instead of touching global color state.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    Plain,
    Bold,
    Faint,
    Green,
    Red,
    RedBold,
    Yellow,
    YellowBold,
    Cyan,
    CyanBold,
    BlueBold,
}

pub trait Paint {
    fn paint(&self, style: Style, text: &str) -> String;
}

/// Ignores styles entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plain;

impl Paint for Plain {
    fn paint(&self, _style: Style, text: &str) -> String { text.to_string() }
}
