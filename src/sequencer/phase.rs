//! Phase descriptors.

use std::time::Duration;

use crate::playback::TypewriterTiming;
use crate::ramp::RampConfig;
use crate::script::Script;

use super::trigger::ExitCondition;

/// Name of the implicit phase every sequencer ends in.
pub const TERMINAL_PHASE: &str = "complete";

/// What a phase does on entry.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseAction {
    /// Type a script out on a timer
    Type {
        /// Lines to type
        script: Script,
        /// Typing cadence
        timing: TypewriterTiming,
    },
    /// Reveal a whole script at once
    Show {
        /// Lines to show
        script: Script,
    },
    /// Nothing; the phase only waits for its exit
    Wait,
    /// Run a progress ramp
    Ramp(RampConfig),
}

impl PhaseAction {
    /// Script revealed by this action, if any.
    #[must_use]
    pub const fn script(&self) -> Option<&Script> {
        match self {
            Self::Type { script, .. } | Self::Show { script } => Some(script),
            Self::Wait | Self::Ramp(_) => None,
        }
    }

    /// Reduced-motion variant: typing becomes an instant reveal.
    #[must_use]
    pub fn without_motion(self) -> Self {
        match self {
            Self::Type { script, .. } => Self::Show { script },
            other => other,
        }
    }

    /// Stable name used in config files and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Type { .. } => "type",
            Self::Show { .. } => "show",
            Self::Wait => "wait",
            Self::Ramp(_) => "ramp",
        }
    }
}

/// One named stage of a sequencer.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSpec {
    /// Phase name, unique within its sequencer
    pub name: String,
    /// Entry action
    pub action: PhaseAction,
    /// Exit trigger
    pub exit: ExitCondition,
}

impl PhaseSpec {
    /// Builds a phase from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, action: PhaseAction, exit: ExitCondition) -> Self {
        Self {
            name: name.into(),
            action,
            exit,
        }
    }

    /// Types `script` and exits once it has been played through.
    #[must_use]
    pub fn typing(name: impl Into<String>, script: Script, timing: TypewriterTiming) -> Self {
        Self::new(
            name,
            PhaseAction::Type { script, timing },
            ExitCondition::TypewriterComplete,
        )
    }

    /// Shows `script` at once and exits after `hold`.
    #[must_use]
    pub fn showing(name: impl Into<String>, script: Script, hold: Duration) -> Self {
        Self::new(name, PhaseAction::Show { script }, ExitCondition::After(hold))
    }

    /// Does nothing for `duration`.
    #[must_use]
    pub fn waiting(name: impl Into<String>, duration: Duration) -> Self {
        Self::new(name, PhaseAction::Wait, ExitCondition::After(duration))
    }

    /// Runs a ramp and exits at 100%.
    #[must_use]
    pub fn ramping(name: impl Into<String>, config: RampConfig) -> Self {
        Self::new(name, PhaseAction::Ramp(config), ExitCondition::RampComplete)
    }

    /// Replaces the exit trigger.
    #[must_use]
    pub const fn with_exit(mut self, exit: ExitCondition) -> Self {
        self.exit = exit;
        self
    }

    /// Reduced-motion copy of this phase.
    #[must_use]
    pub fn without_motion(self) -> Self {
        Self {
            action: self.action.without_motion(),
            ..self
        }
    }

    /// Running time when nothing pauses the phase.
    ///
    /// `None` when the phase waits for a signal, loops forever or can
    /// never exit.
    #[must_use]
    pub fn nominal_duration(&self) -> Option<Duration> {
        match (&self.exit, &self.action) {
            (ExitCondition::After(duration), _) => Some(*duration),
            (ExitCondition::TypewriterComplete, PhaseAction::Type { script, timing })
                if !timing.repeat =>
            {
                Some(timing.pass_duration(script))
            }
            (ExitCondition::TypewriterComplete, PhaseAction::Show { .. }) => Some(Duration::ZERO),
            (ExitCondition::RampComplete, PhaseAction::Ramp(config)) => Some(config.total),
            _ => None,
        }
    }
}
