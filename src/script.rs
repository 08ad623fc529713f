//! Line store
//!
//! A [`Script`] is an ordered, immutable list of lines. Order is playback
//! order. Lines are counted in characters, never bytes, so a cursor can
//! stop in the middle of `"Host → Device"` without splitting a code point.

use std::sync::Arc;

/// Ordered, immutable sequence of scripted lines.
///
/// Cloning is cheap: the lines are shared behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    lines: Arc<[String]>,
}

impl Script {
    /// Builds a script from well-formed lines.
    #[must_use]
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a script from possibly missing entries.
    ///
    /// A missing entry (a YAML `~`, a gap in generated content) becomes an
    /// empty line so playback keeps going.
    #[must_use]
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        Self {
            lines: entries.into_iter().map(Option::unwrap_or_default).collect(),
        }
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the script has no lines at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line at `index`, or `None` past the end.
    #[must_use]
    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    /// Character count of the line at `index` (0 past the end).
    #[must_use]
    pub fn line_chars(&self, index: usize) -> usize {
        self.line(index).map_or(0, |line| line.chars().count())
    }

    /// All lines in playback order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Total number of characters across all lines.
    #[must_use]
    pub fn total_chars(&self) -> usize {
        self.lines.iter().map(|line| line.chars().count()).sum()
    }
}

impl<S: Into<String>> FromIterator<S> for Script {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Returns the first `chars` characters of `line`.
#[must_use]
pub fn prefix(line: &str, chars: usize) -> &str {
    match line.char_indices().nth(chars) {
        Some((byte, _)) => &line[..byte],
        None => line,
    }
}

/// Visual class of a log line, used to colour terminal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// `[  OK  ]`, `[OK]` or `[SUCCESS]` lines
    Ok,
    /// Lines mentioning `ERROR` or `FAILED`
    Error,
    /// Shell prompts and banners (`$ `, `>>> `)
    Command,
    /// Everything else
    Plain,
}

impl LineKind {
    /// Classifies a line by its markers.
    #[must_use]
    pub fn classify(line: &str) -> Self {
        if line.contains("ERROR") || line.contains("FAILED") {
            Self::Error
        } else if line.contains("[  OK  ]") || line.contains("[OK]") || line.contains("[SUCCESS]")
        {
            Self::Ok
        } else if line.starts_with("$ ") || line.starts_with(">>>") {
            Self::Command
        } else {
            Self::Plain
        }
    }
}
