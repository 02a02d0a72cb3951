//! Heading rules shared by the source adapters.
//!
//! Standards encode structure in heading text: `APP.1.1 Office-Produkte`,
//! `GOVERN (GV): ...`, `Sichere Konfiguration (S)`. Each shape is one [`Rule`]
//! with a single regular expression, so every adapter parses headings the same
//! way and reports the same [`FormatError`] when a heading does not fit.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::source::FormatError;

/// Upstream numbering defects, rewritten before keys are derived.
pub const CODE_CORRECTIONS: &[(&str, &str)] = &[("OPS.2.3A22", "OPS.2.3.A22")];

/// A heading shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// `{code} {title}`, e.g. `APP.1.1 Office-Produkte`.
    ///
    /// Captures `code` and `title`.
    CodeTitle,

    /// `{title} ({code})`, optionally followed by more text, e.g.
    /// `GOVERN (GV)` or `Organisation of Information Security (OIS)`.
    ///
    /// Captures `title` and `code`.
    TitleCode,

    /// A requirement title carrying a level marker, e.g.
    /// `Sichere Konfiguration (S)` or `Planung (B) [Institutionsleitung]`.
    ///
    /// Captures `title`, `level` and the trailing `rest`.
    LevelMarker,

    /// An elemental threat heading, e.g. `G 0.1 Feuer`.
    ///
    /// Captures `number` and `title`.
    ElementalThreat,

    /// An implementation example marker, e.g. `Ex1:`.
    ExampleMarker,
}

impl Rule {
    /// Every rule.
    pub const ALL: [Self; 5] = [
        Self::CodeTitle,
        Self::TitleCode,
        Self::LevelMarker,
        Self::ElementalThreat,
        Self::ExampleMarker,
    ];

    /// A short name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CodeTitle => "code and title",
            Self::TitleCode => "title and parenthesized code",
            Self::LevelMarker => "level marker",
            Self::ElementalThreat => "elemental threat",
            Self::ExampleMarker => "example marker",
        }
    }

    /// The regular expression of the rule.
    #[must_use]
    pub const fn pattern(self) -> &'static str {
        match self {
            Self::CodeTitle => r"^\s*(?P<code>\S+)\s+(?P<title>.+?)\s*$",
            Self::TitleCode => r"^\s*(?P<title>.+?)\s+\((?P<code>[^()]+)\)",
            Self::LevelMarker => r"^\s*(?P<title>.*?)\s*\((?P<level>[BSH])\)\s*(?P<rest>.*?)\s*$",
            Self::ElementalThreat => r"^\s*G\s*(?P<number>\d+\.\d+)\s+(?P<title>.+?)\s*$",
            Self::ExampleMarker => r"Ex\d+:",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::CodeTitle => 0,
            Self::TitleCode => 1,
            Self::LevelMarker => 2,
            Self::ElementalThreat => 3,
            Self::ExampleMarker => 4,
        }
    }

    /// The compiled regular expression of the rule.
    #[must_use]
    pub fn regex(self) -> &'static Regex {
        static COMPILED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
            Rule::ALL
                .iter()
                .map(|rule| {
                    Regex::new(rule.pattern())
                        .unwrap_or_else(|e| panic!("invalid {} pattern: {e}", rule.name()))
                })
                .collect()
        });
        &COMPILED[self.index()]
    }

    /// Matches `text` against the rule.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Pattern`] if the text does not fit.
    pub fn captures(self, text: &str) -> Result<Captures<'_>, FormatError> {
        self.regex()
            .captures(text)
            .ok_or_else(|| FormatError::Pattern {
                rule: self,
                text: text.to_string(),
            })
    }

    /// Matches `text` against the rule and returns two named groups.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Pattern`] if the text does not fit.
    pub fn split<'t>(
        self,
        text: &'t str,
        first: &str,
        second: &str,
    ) -> Result<(&'t str, &'t str), FormatError> {
        let captures = self.captures(text)?;
        let group = |name: &str| captures.name(name).map_or("", |m| m.as_str());
        Ok((group(first), group(second)))
    }
}

/// Cuts the level marker out of a requirement title.
///
/// Returns the title without the marker and the marker letter, or `None` if
/// the title carries no marker. Text after the marker is kept.
#[must_use]
pub fn strip_level_marker(title: &str) -> Option<(String, &str)> {
    let captures = Rule::LevelMarker.regex().captures(title)?;
    let group = |name: &str| captures.name(name).map_or("", |m| m.as_str());
    let stripped = match (group("title"), group("rest")) {
        (head, "") => head.to_string(),
        ("", rest) => rest.to_string(),
        (head, rest) => format!("{head} {rest}"),
    };
    Some((stripped, group("level")))
}

/// Applies [`CODE_CORRECTIONS`] to a code.
#[must_use]
pub fn correct_code(code: &str) -> &str {
    CODE_CORRECTIONS
        .iter()
        .find(|(defect, _)| *defect == code)
        .map_or(code, |&(defect, fixed)| {
            tracing::debug!("Corrected upstream code {defect} to {fixed}");
            fixed
        })
}
