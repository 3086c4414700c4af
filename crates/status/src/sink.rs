//! Where rendered frames go.

use std::io::{self, Write};

use crossterm::cursor::MoveToPreviousLine;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};

use crate::line::Line;
use crate::palette::Palette;

/// Receives one frame at a time: a run of `write` calls closed by `flush`.
pub trait DisplaySink {
    fn write(&mut self, line: &Line) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// Draws each frame over the previous one.
pub struct TerminalSink<W: Write> {
    out: W,
    palette: Palette,
    rewrite: bool,
    width: Option<u16>,
    pending: Vec<(String, u16)>,
    drawn: u16,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout(palette: Palette) -> Self {
        let rewrite = std::io::IsTerminal::is_terminal(&io::stdout());
        let sink = Self::new(io::stdout(), palette, rewrite);
        match crossterm::terminal::size() {
            Ok((cols, _)) if rewrite => sink.wrap_at(cols),
            _ => sink,
        }
    }
}

impl<W: Write> TerminalSink<W> {
    /// With `rewrite` off, frames are appended instead of redrawn (pipes, log files).
    pub fn new(out: W, palette: Palette, rewrite: bool) -> Self {
        Self { out, palette, rewrite, width: None, pending: Vec::new(), drawn: 0 }
    }

    /// Terminal width used to count wrapped rows when erasing the previous frame.
    pub fn wrap_at(mut self, cols: u16) -> Self {
        self.width = (cols > 0).then_some(cols);
        self
    }

    pub fn into_inner(self) -> W { self.out }
}

impl<W: Write> DisplaySink for TerminalSink<W> {
    fn write(&mut self, line: &Line) -> io::Result<()> {
        let rows = screen_rows(&line.plain_text(), self.width);
        self.pending.push((line.render(&self.palette), rows));
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.rewrite && self.drawn > 0 {
            queue!(self.out, MoveToPreviousLine(self.drawn), Clear(ClearType::FromCursorDown))?;
        }
        self.drawn = 0;
        for (line, rows) in self.pending.drain(..) {
            writeln!(self.out, "{line}")?;
            self.drawn = self.drawn.saturating_add(rows);
        }
        if !self.rewrite {
            writeln!(self.out)?;
        }
        self.out.flush()
    }
}

/// Rows a line occupies once printed: one per embedded newline, plus wrapping when the
/// width is known.
fn screen_rows(text: &str, width: Option<u16>) -> u16 {
    let rows: usize = text
        .split('\n')
        .map(|seg| match width {
            Some(cols) => seg.chars().count().max(1).div_ceil(usize::from(cols)),
            None => 1,
        })
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

/// Keeps plain-text frames in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Vec<Vec<String>>,
    current: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self { Self::default() }

    pub fn frames(&self) -> &[Vec<String>] { &self.frames }

    pub fn last_frame(&self) -> Option<&[String]> { self.frames.last().map(Vec::as_slice) }
}

impl DisplaySink for MemorySink {
    fn write(&mut self, line: &Line) -> io::Result<()> {
        self.current.push(line.plain_text());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.frames.push(std::mem::take(&mut self.current));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_groups_lines_into_frames() {
        let mut sink = MemorySink::new();
        sink.write(&Line::success("a")).unwrap();
        sink.flush().unwrap();
        sink.write(&Line::failure("b")).unwrap();
        sink.write(&Line::blank()).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.frames().len(), 2);
        assert_eq!(sink.last_frame().unwrap(), ["    ❌ b".to_string(), String::new()]);
    }

    #[test]
    fn appending_terminal_sink_separates_frames() {
        let mut sink = TerminalSink::new(Vec::new(), Palette::new(false), false);
        sink.write(&Line::heading(kspy_core::style::Style::Bold, "one")).unwrap();
        sink.flush().unwrap();
        sink.write(&Line::heading(kspy_core::style::Style::Bold, "two")).unwrap();
        sink.flush().unwrap();
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "one\n\ntwo\n\n");
    }

    #[test]
    fn rewriting_terminal_sink_clears_previous_frame() {
        let mut sink = TerminalSink::new(Vec::new(), Palette::new(false), true);
        sink.write(&Line::success("a")).unwrap();
        sink.write(&Line::success("b")).unwrap();
        sink.flush().unwrap();
        sink.write(&Line::success("c")).unwrap();
        sink.flush().unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        // cursor up two lines, then clear to end of screen
        assert!(out.contains("\u{1b}[2F"), "{out:?}");
        assert!(out.contains("\u{1b}[J"), "{out:?}");
        assert!(out.ends_with("    ✅ c\n"));
    }

    #[test]
    fn multi_line_messages_are_fully_erased() {
        let mut sink = TerminalSink::new(Vec::new(), Palette::new(false), true);
        sink.write(&Line::failure("panic: boom\ngoroutine 1\nmain.main()")).unwrap();
        sink.flush().unwrap();
        sink.write(&Line::success("next")).unwrap();
        sink.flush().unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.contains("main.main()\n\u{1b}[3F\u{1b}[J    ✅ next\n"), "{out:?}");
    }

    #[test]
    fn wrapped_lines_count_every_row() {
        let mut sink = TerminalSink::new(Vec::new(), Palette::new(false), true).wrap_at(10);
        sink.write(&Line::heading(kspy_core::style::Style::Plain, "x".repeat(25))).unwrap();
        sink.write(&Line::heading(kspy_core::style::Style::Plain, "y".repeat(10))).unwrap();
        sink.write(&Line::blank()).unwrap();
        sink.flush().unwrap();
        sink.write(&Line::blank()).unwrap();
        sink.flush().unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        // 3 rows + 1 row + 1 row for the empty line
        assert!(out.contains("\u{1b}[5F"), "{out:?}");
    }

    #[test]
    fn row_counting() {
        assert_eq!(screen_rows("", None), 1);
        assert_eq!(screen_rows("a\nb", None), 2);
        assert_eq!(screen_rows("abcd\nefghij", Some(4)), 3);
    }
}
