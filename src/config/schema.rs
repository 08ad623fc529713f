//! Configuration schema types
//!
//! YAML form of a surface. Durations stay strings here (`"80ms"`, `"5s"`)
//! so the validator can report every bad value with its path; conversion
//! to engine types happens in [`SurfaceConfig::to_spec`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gate::GatePolicy;
use crate::playback::{RevealUnit, TypewriterTiming};
use crate::ramp::{self, RampConfig};
use crate::script::Script;
use crate::sequencer::{ExitCondition, PhaseAction, PhaseSpec, parse_duration};
use crate::surface::{StreamSpec, SurfaceSpec};

// ============================================================================
// Surface
// ============================================================================

/// Root configuration: one surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurfaceConfig {
    /// Surface name (required)
    pub name: String,

    /// Free-form description shown by `list`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Visibility gate; omitted means the surface plays when started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<VisibilityConfig>,

    /// Streams in declaration order
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
}

/// Visibility gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisibilityConfig {
    /// Gate policy
    pub policy: PolicyConfig,

    /// Hidden time before a rewind (`restart_on_reentry` only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<String>,

    /// Scripted visibility changes replayed by `textplay run`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timeline: Vec<VisibilityStep>,
}

/// Gate policy name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Start on first visibility, then ignore changes
    OnceOnly,
    /// Pause when hidden, rewind after the cooldown
    RestartOnReentry,
}

/// One scripted visibility change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisibilityStep {
    /// Offset from the start of the run
    pub at: String,
    /// New visibility
    pub visible: bool,
}

/// Default cooldown of `restart_on_reentry`.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(1);

// ============================================================================
// Streams and Phases
// ============================================================================

/// One sequencer stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    /// Stream name, unique within the surface
    pub name: String,

    /// Earlier stream that must reach its terminal phase first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,

    /// Phases in order
    #[serde(default)]
    pub phases: Vec<PhaseConfig>,
}

/// One phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseConfig {
    /// Phase name, unique within the stream
    pub name: String,

    /// Entry action
    pub action: ActionConfig,

    /// Exit trigger; defaults from the action when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<ExitConfig>,
}

/// Entry action, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ActionConfig {
    /// Type lines out
    Type {
        /// Lines; `~` entries become empty lines
        lines: Vec<Option<String>>,
        /// Delay per reveal tick (default `30ms`)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        char_interval: Option<String>,
        /// Pause after each line (default `800ms`)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line_delay: Option<String>,
        /// Pause after empty lines (default: `line_delay`)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        empty_line_delay: Option<String>,
        /// Reveal unit (default `char`)
        #[serde(default)]
        reveal: RevealUnit,
        /// Loop forever instead of completing
        #[serde(default)]
        repeat: bool,
    },
    /// Show lines at once
    Show {
        /// Lines; `~` entries become empty lines
        lines: Vec<Option<String>>,
    },
    /// Do nothing
    Wait,
    /// Progress ramp
    Ramp {
        /// Time to reach 100% (default `15s`)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total: Option<String>,
        /// Update interval (default `50ms`)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tick: Option<String>,
    },
}

/// Exit trigger, tagged by `on`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "on", rename_all = "snake_case", deny_unknown_fields)]
pub enum ExitConfig {
    /// Typewriter finished
    TypewriterComplete,
    /// Ramp reached 100%
    RampComplete,
    /// Fixed running time
    After {
        /// Time in the phase
        duration: String,
    },
    /// External signal
    Signal,
}

/// Default delay per reveal tick.
pub const DEFAULT_CHAR_INTERVAL: Duration = Duration::from_millis(30);

/// Default pause after a line.
pub const DEFAULT_LINE_DELAY: Duration = Duration::from_millis(800);

// ============================================================================
// Conversion
// ============================================================================

fn duration_or(value: Option<&str>, default: Duration) -> Result<Duration, ConfigError> {
    value.map_or(Ok(default), parse_duration)
}

impl ActionConfig {
    /// Stable action name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Type { .. } => "type",
            Self::Show { .. } => "show",
            Self::Wait => "wait",
            Self::Ramp { .. } => "ramp",
        }
    }

    /// Lines of a `type` or `show` action.
    #[must_use]
    pub fn lines(&self) -> Option<&[Option<String>]> {
        match self {
            Self::Type { lines, .. } | Self::Show { lines } => Some(lines),
            Self::Wait | Self::Ramp { .. } => None,
        }
    }

    /// Converts to the engine action.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a malformed duration.
    pub fn to_action(&self) -> Result<PhaseAction, ConfigError> {
        Ok(match self {
            Self::Type {
                lines,
                char_interval,
                line_delay,
                empty_line_delay,
                reveal,
                repeat,
            } => {
                let mut timing = TypewriterTiming::new(
                    duration_or(char_interval.as_deref(), DEFAULT_CHAR_INTERVAL)?,
                    duration_or(line_delay.as_deref(), DEFAULT_LINE_DELAY)?,
                );
                if let Some(delay) = empty_line_delay {
                    timing = timing.with_empty_line_delay(parse_duration(delay)?);
                }
                timing.reveal = *reveal;
                timing.repeat = *repeat;
                PhaseAction::Type {
                    script: Script::from_entries(lines.iter().cloned()),
                    timing,
                }
            }
            Self::Show { lines } => PhaseAction::Show {
                script: Script::from_entries(lines.iter().cloned()),
            },
            Self::Wait => PhaseAction::Wait,
            Self::Ramp { total, tick } => PhaseAction::Ramp(RampConfig {
                total: duration_or(total.as_deref(), ramp::DEFAULT_TOTAL)?,
                tick: duration_or(tick.as_deref(), ramp::DEFAULT_TICK)?,
            }),
        })
    }
}

impl ExitConfig {
    /// Exit used when a phase omits one. `wait` has no default.
    #[must_use]
    pub const fn default_for(action: &ActionConfig) -> Option<Self> {
        match action {
            ActionConfig::Type { .. } | ActionConfig::Show { .. } => Some(Self::TypewriterComplete),
            ActionConfig::Ramp { .. } => Some(Self::RampComplete),
            ActionConfig::Wait => None,
        }
    }

    /// Converts to the engine trigger.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a malformed duration.
    pub fn to_condition(&self) -> Result<ExitCondition, ConfigError> {
        Ok(match self {
            Self::TypewriterComplete => ExitCondition::TypewriterComplete,
            Self::RampComplete => ExitCondition::RampComplete,
            Self::After { duration } => ExitCondition::After(parse_duration(duration)?),
            Self::Signal => ExitCondition::Signal,
        })
    }
}

impl PhaseConfig {
    /// Converts to the engine phase.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a malformed duration or a
    /// `wait` phase without an exit.
    pub fn to_spec(&self) -> Result<PhaseSpec, ConfigError> {
        let exit = self
            .exit
            .clone()
            .or_else(|| ExitConfig::default_for(&self.action))
            .ok_or_else(|| ConfigError::InvalidValue {
                field: format!("phase '{}' exit", self.name),
                value: "<missing>".to_string(),
                expected: "an exit trigger for a wait phase".to_string(),
            })?;
        Ok(PhaseSpec::new(
            self.name.clone(),
            self.action.to_action()?,
            exit.to_condition()?,
        ))
    }
}

impl VisibilityConfig {
    /// Converts to the gate policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a malformed cooldown.
    pub fn to_policy(&self) -> Result<GatePolicy, ConfigError> {
        Ok(match self.policy {
            PolicyConfig::OnceOnly => GatePolicy::OnceOnly,
            PolicyConfig::RestartOnReentry => GatePolicy::RestartOnReentry {
                cooldown: duration_or(self.cooldown.as_deref(), DEFAULT_COOLDOWN)?,
            },
        })
    }

    /// Scripted changes as `(offset, visible)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a malformed offset.
    pub fn to_timeline(&self) -> Result<Vec<(Duration, bool)>, ConfigError> {
        self.timeline
            .iter()
            .map(|step| Ok((parse_duration(&step.at)?, step.visible)))
            .collect()
    }
}

impl SurfaceConfig {
    /// Converts to the engine surface.
    ///
    /// # Errors
    ///
    /// Returns the first conversion error; run the validator first for a
    /// complete report.
    pub fn to_spec(&self) -> Result<SurfaceSpec, ConfigError> {
        let gate = self
            .visibility
            .as_ref()
            .map(VisibilityConfig::to_policy)
            .transpose()?;
        let streams = self
            .streams
            .iter()
            .map(|stream| {
                Ok(StreamSpec {
                    name: stream.name.clone(),
                    after: stream.after.clone(),
                    phases: stream
                        .phases
                        .iter()
                        .map(PhaseConfig::to_spec)
                        .collect::<Result<_, ConfigError>>()?,
                })
            })
            .collect::<Result<_, ConfigError>>()?;
        Ok(SurfaceSpec {
            name: self.name.clone(),
            gate,
            streams,
        })
    }

    /// Scripted visibility, defaulting to "visible from the start".
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a malformed offset.
    pub fn timeline(&self) -> Result<Vec<(Duration, bool)>, ConfigError> {
        match &self.visibility {
            Some(visibility) if !visibility.timeline.is_empty() => visibility.to_timeline(),
            _ => Ok(vec![(Duration::ZERO, true)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTACT: &str = r#"
name: contact
visibility:
  policy: restart_on_reentry
  cooldown: 1s
  timeline:
    - { at: 0s, visible: true }
    - { at: 3s, visible: false }
streams:
  - name: terminal
    phases:
      - name: typing
        action:
          kind: type
          lines:
            - "[OK] System ready for contact."
            - ~
            - "$ connecting to contact.space..."
          empty_line_delay: 200ms
"#;

    #[test]
    fn test_parse_and_convert() {
        let config: SurfaceConfig = serde_yaml::from_str(CONTACT).unwrap();
        let spec = config.to_spec().unwrap();

        assert_eq!(spec.name, "contact");
        assert_eq!(spec.gate, Some(GatePolicy::RESTART));
        let phase = &spec.streams[0].phases[0];
        assert_eq!(phase.exit, ExitCondition::TypewriterComplete);
        match &phase.action {
            PhaseAction::Type { script, timing } => {
                assert_eq!(script.line(1), Some(""));
                assert_eq!(timing.char_interval, DEFAULT_CHAR_INTERVAL);
                assert_eq!(timing.empty_line_delay, Some(Duration::from_millis(200)));
            }
            other => panic!("unexpected action {other:?}"),
        }
        assert_eq!(
            config.timeline().unwrap(),
            vec![(Duration::ZERO, true), (Duration::from_secs(3), false)]
        );
    }

    #[test]
    fn test_exit_forms() {
        let yaml = r"
name: hold
action: { kind: wait }
exit: { on: after, duration: 5s }
";
        let phase: PhaseConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            phase.to_spec().unwrap().exit,
            ExitCondition::After(Duration::from_secs(5))
        );

        let yaml = "name: bar\naction: { kind: ramp, total: 2s }\n";
        let phase: PhaseConfig = serde_yaml::from_str(yaml).unwrap();
        let spec = phase.to_spec().unwrap();
        assert_eq!(spec.exit, ExitCondition::RampComplete);
        assert_eq!(
            spec.action,
            PhaseAction::Ramp(RampConfig {
                total: Duration::from_secs(2),
                tick: ramp::DEFAULT_TICK,
            })
        );
    }

    #[test]
    fn test_wait_without_exit_is_rejected() {
        let phase: PhaseConfig = serde_yaml::from_str("name: idle\naction: { kind: wait }\n").unwrap();
        assert!(matches!(
            phase.to_spec(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: Result<SurfaceConfig, _> = serde_yaml::from_str("name: x\nstreamz: []\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_timeline() {
        let config: SurfaceConfig = serde_yaml::from_str("name: plain\n").unwrap();
        assert_eq!(config.timeline().unwrap(), vec![(Duration::ZERO, true)]);
        assert!(config.to_spec().unwrap().streams.is_empty());
    }
}
