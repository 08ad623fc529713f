//! Phase exit triggers and duration parsing.

use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

use super::phase::PhaseAction;

/// What ends a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCondition {
    /// The phase's typewriter played its script through
    TypewriterComplete,
    /// The phase's ramp reached 100%
    RampComplete,
    /// Time spent running in the phase (pauses excluded)
    After(Duration),
    /// An explicit [`super::Sequencer::signal`] call
    Signal,
}

impl ExitCondition {
    /// Whether the trigger can ever fire for a phase running `action`.
    ///
    /// An exit that can't fire is not an error; the sequencer just stalls
    /// there. The validator reports it as a warning.
    #[must_use]
    pub const fn can_fire_for(&self, action: &PhaseAction) -> bool {
        match self {
            Self::TypewriterComplete => match action {
                PhaseAction::Type { timing, .. } => !timing.repeat,
                PhaseAction::Show { .. } => true,
                PhaseAction::Wait | PhaseAction::Ramp(_) => false,
            },
            Self::RampComplete => matches!(action, PhaseAction::Ramp(_)),
            Self::After(_) | Self::Signal => true,
        }
    }

    /// Stable name used in config files and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TypewriterComplete => "typewriter_complete",
            Self::RampComplete => "ramp_complete",
            Self::After(_) => "after",
            Self::Signal => "signal",
        }
    }
}

impl fmt::Display for ExitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::After(duration) => write!(f, "after {}", humantime::format_duration(*duration)),
            other => f.write_str(other.kind()),
        }
    }
}

/// Parses a duration written as `<n>ms`, `<n>s`, `<n>m` or `<n>h`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when the number or suffix is
/// not recognised.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidValue {
        field: "duration".to_string(),
        value: s.to_string(),
        expected: "a whole number with suffix ms, s, m or h".to_string(),
    };
    let number = |digits: &str| digits.trim().parse::<u64>().map_err(|_| invalid());

    if let Some(ms) = s.strip_suffix("ms") {
        return Ok(Duration::from_millis(number(ms)?));
    }
    if let Some(hours) = s.strip_suffix('h') {
        return number(hours)?
            .checked_mul(3600)
            .map(Duration::from_secs)
            .ok_or_else(invalid);
    }
    if let Some(mins) = s.strip_suffix('m') {
        return number(mins)?
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(invalid);
    }
    if let Some(secs) = s.strip_suffix('s') {
        return Ok(Duration::from_secs(number(secs)?));
    }
    Err(invalid())
}
