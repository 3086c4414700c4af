//! crossterm-backed painter.

use std::io::IsTerminal;

use crossterm::style::Stylize;
use kspy_core::style::{Paint, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    color: bool,
}

impl Palette {
    pub fn new(color: bool) -> Self { Self { color } }

    /// Color only when stdout is a terminal and the user has not opted out.
    pub fn detect(no_color: bool) -> Self { Self::new(!no_color && std::io::stdout().is_terminal()) }
}

impl Paint for Palette {
    fn paint(&self, style: Style, text: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        match style {
            Style::Plain => text.to_string(),
            Style::Bold => text.bold().to_string(),
            Style::Faint => text.dim().to_string(),
            Style::Green => text.green().to_string(),
            Style::Red => text.red().to_string(),
            Style::RedBold => text.red().bold().to_string(),
            Style::Yellow => text.yellow().to_string(),
            Style::YellowBold => text.yellow().bold().to_string(),
            Style::Cyan => text.cyan().to_string(),
            Style::CyanBold => text.cyan().bold().to_string(),
            Style::BlueBold => text.blue().bold().to_string(),
        }
    }
}
