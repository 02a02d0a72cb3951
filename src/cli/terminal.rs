//! Colored terminal output

use owo_colors::{OwoColorize, colors::css};

/// What a piece of output conveys, which decides its color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Something was created (green)
    Success,
    /// Something was rolled back or skipped (amber)
    Warning,
    /// A location or identifier (blue)
    Info,
    /// Secondary detail (dimmed)
    Muted,
}

/// Whether stdout accepts colors
fn supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

/// Extension trait for colorizing output
pub trait Colorize: AsRef<str> {
    /// Colors the text for the given tone, if the terminal supports it.
    fn tone(&self, tone: Tone) -> String {
        let text = self.as_ref();
        if !supports_color() {
            return text.to_string();
        }
        match tone {
            Tone::Success => text.fg::<css::Green>().to_string(),
            Tone::Warning => text.fg::<css::Orange>().to_string(),
            Tone::Info => text.fg::<css::LightBlue>().to_string(),
            Tone::Muted => text.dimmed().to_string(),
        }
    }

    /// Color as success (green)
    fn success(&self) -> String {
        self.tone(Tone::Success)
    }

    /// Color as warning (amber)
    fn warning(&self) -> String {
        self.tone(Tone::Warning)
    }

    /// Color as info (blue)
    fn info(&self) -> String {
        self.tone(Tone::Info)
    }

    /// Dim the text
    fn dim(&self) -> String {
        self.tone(Tone::Muted)
    }
}

impl<T: AsRef<str> + ?Sized> Colorize for T {}

/// A dimmed horizontal rule as wide as `heading`.
pub fn underline(heading: &str) -> String {
    "─".repeat(heading.chars().count()).dim()
}
