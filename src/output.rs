//! Record renderers and the severity filter applied in front of them.
//!
//! Text output (one line per record):
//!
//! ```text
//! 12:00:03 WARN  /var/log/app.log disk usage at 90%
//! ```
//!
//! JSON output is the record wire shape, one compact object per line.

use std::collections::BTreeSet;
use std::io::{self, IsTerminal, Write};

use crossterm::style::{Color, Stylize};
use loom_core::{Level, LogEntry};

/// Writes records to some sink. A failed render is reported to the caller,
/// which logs it and carries on with the next record.
pub trait Renderer: Send {
    fn render(&mut self, entry: &LogEntry) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

pub struct TextRenderer<W> {
    out: W,
    color: bool,
}

impl TextRenderer<io::Stdout> {
    /// Colourised when stdout is a terminal.
    pub fn stdout() -> Self {
        let out = io::stdout();
        let color = out.is_terminal();
        Self { out, color }
    }
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Renderer for TextRenderer<W> {
    fn render(&mut self, entry: &LogEntry) -> io::Result<()> {
        let time = entry.timestamp.format("%H:%M:%S");
        let tag = format!("{:<5}", entry.level);
        let source = entry.source.display().to_string();

        if self.color {
            writeln!(
                self.out,
                "{} {} {} {}",
                time,
                style_level(entry.level, tag),
                source.with(Color::Cyan).dim(),
                entry.message
            )
        } else {
            writeln!(self.out, "{time} {tag} {source} {}", entry.message)
        }
    }
}

fn style_level(level: Level, tag: String) -> crossterm::style::StyledContent<String> {
    match level {
        Level::Debug => tag.with(Color::Grey).dim(),
        Level::Info => tag.with(Color::Grey),
        Level::Warn => tag.with(Color::Yellow),
        Level::Error => tag.with(Color::Red).bold(),
        Level::Fatal => tag.with(Color::White).on(Color::Red).bold(),
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

pub struct JsonRenderer<W> {
    out: W,
}

impl JsonRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Renderer for JsonRenderer<W> {
    fn render(&mut self, entry: &LogEntry) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, entry)?;
        self.out.write_all(b"\n")
    }
}

// ---------------------------------------------------------------------------
// Level filter
// ---------------------------------------------------------------------------

/// Set of levels to show. An empty filter shows everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelFilter {
    levels: BTreeSet<Level>,
}

impl LevelFilter {
    /// Build from items that may themselves be comma-separated
    /// (`["warn,error", "fatal"]`). Names are the five canonical levels in any
    /// case; anything else is rejected.
    pub fn parse<S: AsRef<str>>(items: &[S]) -> loom_core::Result<Self> {
        let mut levels = BTreeSet::new();
        for item in items {
            for name in item.as_ref().split(',') {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                levels.insert(name.parse::<Level>()?);
            }
        }
        Ok(Self { levels })
    }

    pub fn allows(&self, level: Level) -> bool {
        self.levels.is_empty() || self.levels.contains(&level)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
