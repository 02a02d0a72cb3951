use std::{borrow::Borrow, fmt, ops::Deref, str::FromStr};

use serde::{Serialize, Serializer};

/// Width every numeric key segment is padded to.
///
/// Two digits are enough for every source currently imported, and keep sibling
/// keys sorting lexically in numeric order (`APP.02` before `APP.10`).
pub const SEGMENT_WIDTH: usize = 2;

/// Zero-pads a single key segment to [`SEGMENT_WIDTH`] if it is purely numeric.
///
/// Non-numeric segments (`APP`, `A22`, `GV`) are returned unchanged.
#[must_use]
pub fn pad_segment(segment: &str) -> String {
    if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
        format!("{segment:0>width$}", width = SEGMENT_WIDTH)
    } else {
        segment.to_string()
    }
}

/// Zero-pads every numeric dot-delimited segment of a raw source code.
///
/// # Examples
///
/// ```
/// use reqimport::domain::key::pad_segments;
///
/// assert_eq!(pad_segments("APP.1.1"), "APP.01.01");
/// assert_eq!(pad_segments("APP.01.01"), "APP.01.01");
/// assert_eq!(pad_segments("14.2.10"), "14.02.10");
/// ```
#[must_use]
pub fn pad_segments(raw: &str) -> String {
    raw.split('.').map(pad_segment).collect::<Vec<_>>().join(".")
}

/// A validated, non-empty key of a topic or requirement.
///
/// Keys are unique within their sibling scope and are derived
/// deterministically from the numbering of the source document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(String);

impl Key {
    /// Creates a key from a string, verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyKeyError`] if the string is empty or only whitespace.
    pub fn new(s: impl Into<String>) -> Result<Self, EmptyKeyError> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(EmptyKeyError);
        }
        Ok(Self(s))
    }

    /// Creates a key from a dotted source code, zero-padding numeric segments.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyKeyError`] if the code is empty.
    pub fn padded(raw: &str) -> Result<Self, EmptyKeyError> {
        Self::new(pad_segments(raw.trim()))
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Key {
    type Error = EmptyKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Key {
    type Error = EmptyKeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for Key {
    type Err = EmptyKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for Key {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Error returned when a key would be empty.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("key must not be empty")]
pub struct EmptyKeyError;
