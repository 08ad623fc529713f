//! Playback cursor and the pure stepping rules of a typewriter.
//!
//! Stepping is kept free of timers so the reveal order can be checked
//! without a runtime; [`super::Typewriter`] only adds the waiting.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::script::{self, Script};

/// Position within a script.
///
/// `line_index == script.len()` means the script has been played through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PlaybackCursor {
    /// Current line, `0..=len`
    pub line_index: usize,
    /// Characters of the current line revealed so far
    pub char_index: usize,
}

impl PlaybackCursor {
    /// Cursor at the very beginning of a script.
    pub const START: Self = Self {
        line_index: 0,
        char_index: 0,
    };

    /// Creates a cursor at the given position.
    #[must_use]
    pub const fn new(line_index: usize, char_index: usize) -> Self {
        Self {
            line_index,
            char_index,
        }
    }

    /// Text of the current line revealed so far.
    ///
    /// Past the end of the script this is the empty string.
    #[must_use]
    pub fn revealed_text(self, script: &Script) -> &str {
        script
            .line(self.line_index)
            .map_or("", |line| script::prefix(line, self.char_index))
    }

    /// Whether every line of `script` has been played.
    #[must_use]
    pub fn is_finished(self, script: &Script) -> bool {
        self.line_index >= script.len()
    }
}

impl std::fmt::Display for PlaybackCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line_index, self.char_index)
    }
}

/// How much of a line one tick reveals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealUnit {
    /// One character per tick (terminal typing)
    #[default]
    Char,
    /// A whole line per tick (log lines scrolling in)
    Line,
}

/// Timing parameters of one typewriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypewriterTiming {
    /// Delay before each reveal tick
    pub char_interval: Duration,
    /// Pause after a line is fully revealed, before the next line starts
    pub line_delay: Duration,
    /// Pause used instead of `line_delay` for empty lines
    pub empty_line_delay: Option<Duration>,
    /// Amount revealed per tick
    pub reveal: RevealUnit,
    /// Start over from the first line instead of completing
    pub repeat: bool,
}

impl TypewriterTiming {
    /// Character-by-character timing with the given delays.
    #[must_use]
    pub const fn new(char_interval: Duration, line_delay: Duration) -> Self {
        Self {
            char_interval,
            line_delay,
            empty_line_delay: None,
            reveal: RevealUnit::Char,
            repeat: false,
        }
    }

    /// Overrides the pause used for empty lines.
    #[must_use]
    pub const fn with_empty_line_delay(mut self, delay: Duration) -> Self {
        self.empty_line_delay = Some(delay);
        self
    }

    /// Reveals whole lines per tick.
    #[must_use]
    pub const fn by_line(mut self) -> Self {
        self.reveal = RevealUnit::Line;
        self
    }

    /// Loops forever instead of completing.
    #[must_use]
    pub const fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Pause after the line at `index` of `script`.
    #[must_use]
    pub fn delay_after(&self, script: &Script, index: usize) -> Duration {
        if script.line_chars(index) == 0 {
            self.empty_line_delay.unwrap_or(self.line_delay)
        } else {
            self.line_delay
        }
    }

    /// Time one full pass over `script` takes.
    #[must_use]
    pub fn pass_duration(&self, script: &Script) -> Duration {
        (0..script.len())
            .map(|index| {
                let ticks = match self.reveal {
                    RevealUnit::Char => script.line_chars(index),
                    RevealUnit::Line => usize::from(script.line_chars(index) > 0),
                };
                let ticks = u32::try_from(ticks).unwrap_or(u32::MAX);
                self.char_interval.saturating_mul(ticks) + self.delay_after(script, index)
            })
            .sum()
    }
}

/// The next thing a typewriter will do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Reveal more of the current line after `wait`
    Reveal {
        /// Delay before the reveal
        wait: Duration,
    },
    /// Move on to the next line after `wait`
    Advance {
        /// Delay before the advance
        wait: Duration,
    },
    /// Nothing left to play
    Finish,
}

impl Step {
    /// Delay before this step is applied.
    #[must_use]
    pub const fn wait(self) -> Duration {
        match self {
            Self::Reveal { wait } | Self::Advance { wait } => wait,
            Self::Finish => Duration::ZERO,
        }
    }
}

/// Decides the next step from `cursor`.
///
/// An empty line counts as already revealed, so it goes straight to
/// [`Step::Advance`]. A cursor past the end is [`Step::Finish`].
#[must_use]
pub fn next_step(script: &Script, timing: &TypewriterTiming, cursor: PlaybackCursor) -> Step {
    if cursor.is_finished(script) {
        return Step::Finish;
    }
    if cursor.char_index < script.line_chars(cursor.line_index) {
        Step::Reveal {
            wait: timing.char_interval,
        }
    } else {
        Step::Advance {
            wait: timing.delay_after(script, cursor.line_index),
        }
    }
}

/// Applies `step` to `cursor`, returning the new cursor.
///
/// Advancing past the last line of a repeating typewriter wraps to the
/// start; the caller detects the wrap by comparing line indices.
#[must_use]
pub fn apply_step(
    script: &Script,
    timing: &TypewriterTiming,
    cursor: PlaybackCursor,
    step: Step,
) -> PlaybackCursor {
    match step {
        Step::Reveal { .. } => {
            let total = script.line_chars(cursor.line_index);
            let char_index = match timing.reveal {
                RevealUnit::Char => (cursor.char_index + 1).min(total),
                RevealUnit::Line => total,
            };
            PlaybackCursor::new(cursor.line_index, char_index)
        }
        Step::Advance { .. } => {
            let next = cursor.line_index + 1;
            if timing.repeat && next >= script.len() {
                PlaybackCursor::START
            } else {
                PlaybackCursor::new(next.min(script.len()), 0)
            }
        }
        Step::Finish => cursor,
    }
}
