//! Configuration validation
//!
//! Runs on the deserialized [`SurfaceConfig`] and collects every error and
//! warning instead of stopping at the first one.

use crate::config::loader::ConfigLimits;
use crate::config::schema::{
    ActionConfig, ExitConfig, PhaseConfig, PolicyConfig, StreamConfig, SurfaceConfig,
    VisibilityConfig,
};
use crate::error::{Severity, ValidationIssue};
use crate::sequencer::{TERMINAL_PHASE, parse_duration};

use std::collections::HashSet;
use std::time::Duration;

/// Longest duration accepted anywhere in a surface file.
const MAX_DURATION: Duration = Duration::from_secs(24 * 3600);

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a surface and returns every issue found.
    pub fn validate(&mut self, config: &SurfaceConfig, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        if config.name.trim().is_empty() {
            self.add_error("name", "Surface name cannot be empty");
        }

        if let Some(visibility) = &config.visibility {
            self.validate_visibility(visibility);
        }

        if config.streams.is_empty() {
            self.add_warning("streams", "Surface has no streams and completes immediately");
        }
        self.validate_streams(&config.streams, limits);

        self.validate_limits(config, limits);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Visibility
    // ========================================================================

    fn validate_visibility(&mut self, visibility: &VisibilityConfig) {
        if let Some(cooldown) = &visibility.cooldown {
            self.validate_duration(cooldown, "visibility.cooldown");
            if visibility.policy == PolicyConfig::OnceOnly {
                self.add_warning(
                    "visibility.cooldown",
                    "cooldown has no effect with the once_only policy",
                );
            }
        }

        let mut previous: Option<Duration> = None;
        for (idx, step) in visibility.timeline.iter().enumerate() {
            let path = format!("visibility.timeline[{idx}].at");
            let Some(at) = self.validate_duration(&step.at, &path) else {
                continue;
            };
            if previous.is_some_and(|prev| at < prev) {
                self.add_error(&path, "Timeline offsets must be in ascending order");
            }
            previous = Some(at);
        }
    }

    // ========================================================================
    // Streams
    // ========================================================================

    fn validate_streams(&mut self, streams: &[StreamConfig], limits: &ConfigLimits) {
        let all_names: Vec<&str> = streams.iter().map(|s| s.name.as_str()).collect();
        let mut seen = HashSet::new();

        for (idx, stream) in streams.iter().enumerate() {
            let path = format!("streams[{idx}]");

            if stream.name.trim().is_empty() {
                self.add_error(&format!("{path}.name"), "Stream name cannot be empty");
            } else if !seen.insert(stream.name.as_str()) {
                self.add_error(
                    &format!("{path}.name"),
                    &format!("Duplicate stream name: '{}'", stream.name),
                );
            }

            if let Some(after) = &stream.after {
                self.validate_after(after, &stream.name, &all_names[..idx], &all_names, &path);
            }

            if stream.phases.is_empty() {
                self.add_warning(&format!("{path}.phases"), "Stream has no phases");
            }
            if stream.phases.len() > limits.max_phases {
                self.add_error(
                    &format!("{path}.phases"),
                    &format!(
                        "Too many phases: {} (maximum: {}). \
                         Set TEXTPLAY_MAX_PHASES to increase the limit.",
                        stream.phases.len(),
                        limits.max_phases
                    ),
                );
            }

            self.validate_phases(&stream.phases, &path, limits);
        }
    }

    /// Checks a stream's `after` reference. Only earlier streams may be
    /// named, so gating can never form a cycle.
    fn validate_after(
        &mut self,
        after: &str,
        own: &str,
        earlier: &[&str],
        all: &[&str],
        path: &str,
    ) {
        let path = format!("{path}.after");
        if after == own {
            self.add_error(&path, &format!("Stream '{own}' cannot wait for itself"));
        } else if earlier.contains(&after) {
            // valid
        } else if all.contains(&after) {
            self.add_error(
                &path,
                &format!("Stream '{own}' waits for '{after}', which is declared later"),
            );
        } else {
            let message = match suggest(after, all) {
                Some(hint) => format!("Unknown stream '{after}'. Did you mean '{hint}'?"),
                None => format!("Unknown stream '{after}'"),
            };
            self.add_error(&path, &message);
        }
    }

    // ========================================================================
    // Phases
    // ========================================================================

    fn validate_phases(&mut self, phases: &[PhaseConfig], stream_path: &str, limits: &ConfigLimits) {
        let mut seen = HashSet::new();
        for (idx, phase) in phases.iter().enumerate() {
            let path = format!("{stream_path}.phases[{idx}]");

            if phase.name.trim().is_empty() {
                self.add_error(&format!("{path}.name"), "Phase name cannot be empty");
            } else if phase.name == TERMINAL_PHASE {
                self.add_error(
                    &format!("{path}.name"),
                    &format!("'{TERMINAL_PHASE}' is reserved for the terminal phase"),
                );
            } else if !seen.insert(phase.name.as_str()) {
                self.add_error(
                    &format!("{path}.name"),
                    &format!("Duplicate phase name: '{}'", phase.name),
                );
            }

            self.validate_action(&phase.action, &format!("{path}.action"), limits);
            self.validate_exit(phase, &path);
        }
    }

    fn validate_action(&mut self, action: &ActionConfig, path: &str, limits: &ConfigLimits) {
        match action {
            ActionConfig::Type {
                char_interval,
                line_delay,
                empty_line_delay,
                ..
            } => {
                for (field, value) in [
                    ("char_interval", char_interval),
                    ("line_delay", line_delay),
                    ("empty_line_delay", empty_line_delay),
                ] {
                    if let Some(value) = value {
                        self.validate_duration(value, &format!("{path}.{field}"));
                    }
                }
            }
            ActionConfig::Ramp { total, tick } => {
                if let Some(total) = total {
                    let parsed = self.validate_duration(total, &format!("{path}.total"));
                    if parsed == Some(Duration::ZERO) {
                        self.add_warning(
                            &format!("{path}.total"),
                            "A zero total completes the ramp on its first tick",
                        );
                    }
                }
                if let Some(tick) = tick {
                    let parsed = self.validate_duration(tick, &format!("{path}.tick"));
                    if parsed == Some(Duration::ZERO) {
                        self.add_error(&format!("{path}.tick"), "Ramp tick must be greater than zero");
                    }
                }
            }
            ActionConfig::Show { .. } | ActionConfig::Wait => {}
        }

        if let Some(lines) = action.lines() {
            let lines_path = format!("{path}.lines");
            if lines.is_empty() {
                self.add_warning(&lines_path, "Script has no lines");
            }
            if lines.len() > limits.max_lines {
                self.add_error(
                    &lines_path,
                    &format!(
                        "Too many lines: {} (maximum: {}). \
                         Set TEXTPLAY_MAX_LINES to increase the limit.",
                        lines.len(),
                        limits.max_lines
                    ),
                );
            }
        }
    }

    fn validate_exit(&mut self, phase: &PhaseConfig, path: &str) {
        let path = format!("{path}.exit");
        let Some(exit) = &phase.exit else {
            if matches!(phase.action, ActionConfig::Wait) {
                self.add_error(&path, "A wait phase needs an exit trigger");
            }
            return;
        };

        let never_fires = match (exit, &phase.action) {
            (ExitConfig::After { duration }, _) => {
                self.validate_duration(duration, &format!("{path}.duration"));
                false
            }
            (ExitConfig::TypewriterComplete, ActionConfig::Type { repeat, .. }) => *repeat,
            (ExitConfig::TypewriterComplete, ActionConfig::Show { .. })
            | (ExitConfig::RampComplete, ActionConfig::Ramp { .. })
            | (ExitConfig::Signal, _) => false,
            (ExitConfig::TypewriterComplete | ExitConfig::RampComplete, _) => true,
        };

        if never_fires {
            self.add_warning(
                &path,
                &format!(
                    "Exit '{}' can never fire for a {} action; the stream will stall",
                    exit_name(exit),
                    phase.action.kind()
                ),
            );
        }
    }

    // ========================================================================
    // Limits and Helpers
    // ========================================================================

    fn validate_limits(&mut self, config: &SurfaceConfig, limits: &ConfigLimits) {
        if config.streams.len() > limits.max_streams {
            self.add_error(
                "streams",
                &format!(
                    "Too many streams: {} (maximum: {}). \
                     Set TEXTPLAY_MAX_STREAMS to increase the limit.",
                    config.streams.len(),
                    limits.max_streams
                ),
            );
        }
    }

    /// Validates a duration string, returning it when well-formed and no
    /// longer than [`MAX_DURATION`].
    fn validate_duration(&mut self, duration: &str, path: &str) -> Option<Duration> {
        let Ok(parsed) = parse_duration(duration) else {
            self.add_error(
                path,
                &format!(
                    "Invalid duration '{duration}'. Expected format: <number><unit> where unit is ms, s, m, or h"
                ),
            );
            return None;
        };
        if parsed > MAX_DURATION {
            self.add_error(
                path,
                &format!("Duration '{duration}' is too long (maximum: 24h)"),
            );
            return None;
        }
        Some(parsed)
    }

    /// Adds an error to the collection.
    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    /// Adds a warning to the collection.
    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

const fn exit_name(exit: &ExitConfig) -> &'static str {
    match exit {
        ExitConfig::TypewriterComplete => "typewriter_complete",
        ExitConfig::RampComplete => "ramp_complete",
        ExitConfig::After { .. } => "after",
        ExitConfig::Signal => "signal",
    }
}

/// Closest candidate within a Damerau-Levenshtein distance of 3.
fn suggest<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, strsim::damerau_levenshtein(input, c)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_limits() -> ConfigLimits {
        ConfigLimits {
            max_streams: 32,
            max_phases: 100,
            max_lines: 10_000,
            max_config_size: 1024 * 1024,
        }
    }

    fn validate(yaml: &str) -> ValidationResult {
        let config: SurfaceConfig = serde_yaml::from_str(yaml).unwrap();
        Validator::new().validate(&config, &default_limits())
    }

    fn error_paths(result: &ValidationResult) -> Vec<&str> {
        result.errors.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn test_validate_minimal_config() {
        let result = validate(
            r"
name: demo
streams:
  - name: main
    phases:
      - name: hello
        action: { kind: type, lines: [hello] }
",
        );
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_empty_names() {
        let result = validate(
            r"
name: ' '
streams:
  - name: ''
    phases:
      - name: ''
        action: { kind: show, lines: [x] }
",
        );
        assert_eq!(
            error_paths(&result),
            vec!["name", "streams[0].name", "streams[0].phases[0].name"]
        );
    }

    #[test]
    fn test_validate_duplicates_and_reserved() {
        let result = validate(
            r"
name: demo
streams:
  - name: a
    phases:
      - { name: one, action: { kind: show, lines: [x] } }
      - { name: one, action: { kind: show, lines: [x] } }
      - { name: complete, action: { kind: show, lines: [x] } }
  - name: a
    phases: []
",
        );
        let paths = error_paths(&result);
        assert!(paths.contains(&"streams[0].phases[1].name"));
        assert!(paths.contains(&"streams[0].phases[2].name"));
        assert!(paths.contains(&"streams[1].name"));
        assert!(result.errors.iter().any(|e| e.message.contains("reserved")));
    }

    #[test]
    fn test_validate_after_references() {
        let result = validate(
            r"
name: demo
streams:
  - { name: logs, after: commands, phases: [] }
  - { name: commands, after: commands, phases: [] }
  - { name: tail, after: lgos, phases: [] }
  - { name: ok, after: logs, phases: [] }
",
        );
        assert_eq!(
            error_paths(&result),
            vec!["streams[0].after", "streams[1].after", "streams[2].after"]
        );
        assert!(result.errors[0].message.contains("declared later"));
        assert!(result.errors[1].message.contains("itself"));
        assert!(result.errors[2].message.contains("Did you mean 'logs'?"));
    }

    #[test]
    fn test_validate_durations() {
        let result = validate(
            r"
name: demo
visibility:
  policy: restart_on_reentry
  cooldown: soon
streams:
  - name: main
    phases:
      - name: t
        action: { kind: type, lines: [x], char_interval: 5x }
      - name: w
        action: { kind: wait }
        exit: { on: after, duration: '' }
",
        );
        assert_eq!(
            error_paths(&result),
            vec![
                "visibility.cooldown",
                "streams[0].phases[0].action.char_interval",
                "streams[0].phases[1].exit.duration",
            ]
        );
    }

    #[test]
    fn test_validate_duration_upper_bound() {
        let result = validate(
            r"
name: demo
visibility:
  policy: restart_on_reentry
  cooldown: 24h
  timeline:
    - { at: 0ms, visible: true }
    - { at: 18446744073709551615s, visible: false }
streams:
  - name: main
    phases:
      - name: w
        action: { kind: wait }
        exit: { on: after, duration: 18446744073709551615s }
      - name: v
        action: { kind: wait }
        exit: { on: after, duration: 1441m }
",
        );
        assert_eq!(
            error_paths(&result),
            vec![
                "visibility.timeline[1].at",
                "streams[0].phases[0].exit.duration",
                "streams[0].phases[1].exit.duration",
            ]
        );
        assert!(result.errors.iter().all(|e| e.message.contains("too long")));
    }

    #[test]
    fn test_validate_wait_needs_exit() {
        let result = validate(
            r"
name: demo
streams:
  - name: main
    phases:
      - { name: idle, action: { kind: wait } }
",
        );
        assert_eq!(error_paths(&result), vec!["streams[0].phases[0].exit"]);
    }

    #[test]
    fn test_validate_ramp_tick_and_total() {
        let result = validate(
            r"
name: demo
streams:
  - name: main
    phases:
      - { name: bar, action: { kind: ramp, total: 0s, tick: 0ms } }
",
        );
        assert_eq!(error_paths(&result), vec!["streams[0].phases[0].action.tick"]);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].path, "streams[0].phases[0].action.total");
    }

    #[test]
    fn test_validate_mismatched_exit_warns() {
        let result = validate(
            r"
name: demo
streams:
  - name: main
    phases:
      - name: bar
        action: { kind: ramp }
        exit: { on: typewriter_complete }
      - name: loop
        action: { kind: type, lines: [x], repeat: true }
        exit: { on: typewriter_complete }
      - name: text
        action: { kind: show, lines: [x] }
        exit: { on: ramp_complete }
",
        );
        assert!(result.is_valid());
        let paths: Vec<_> = result.warnings.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "streams[0].phases[0].exit",
                "streams[0].phases[1].exit",
                "streams[0].phases[2].exit",
            ]
        );
    }

    #[test]
    fn test_validate_timeline_order() {
        let result = validate(
            r"
name: demo
visibility:
  policy: once_only
  cooldown: 1s
  timeline:
    - { at: 1s, visible: true }
    - { at: 500ms, visible: false }
streams: []
",
        );
        assert_eq!(error_paths(&result), vec!["visibility.timeline[1].at"]);
        let warnings: Vec<_> = result.warnings.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(warnings, vec!["visibility.cooldown", "streams"]);
    }

    #[test]
    fn test_validate_limits() {
        let config: SurfaceConfig = serde_yaml::from_str(
            r"
name: demo
streams:
  - name: a
    phases:
      - { name: one, action: { kind: show, lines: [x, y, z] } }
      - { name: two, action: { kind: show, lines: [x] } }
  - { name: b, phases: [] }
",
        )
        .unwrap();
        let limits = ConfigLimits {
            max_streams: 1,
            max_phases: 1,
            max_lines: 2,
            max_config_size: 1024,
        };
        let result = Validator::new().validate(&config, &limits);
        assert_eq!(
            error_paths(&result),
            vec!["streams[0].phases", "streams[0].phases[0].action.lines", "streams"]
        );
    }

    #[test]
    fn test_suggest() {
        assert_eq!(suggest("kernal", &["kernel", "commands"]), Some("kernel"));
        assert_eq!(suggest("zzzzzzzz", &["kernel"]), None);
    }
}
