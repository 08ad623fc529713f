//! Error types for `textplay`
//!
//! The playback core itself never fails: malformed lines become empty
//! lines, timer races are prevented by [`crate::timer::TimerSlot`] and a
//! stalled sequencer is a legal state. Everything here belongs to the
//! surrounding tool: configuration loading, the boot flag file, terminal
//! rendering and process exit codes.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `textplay` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied, broken terminal)
    pub const IO_ERROR: i32 = 3;

    /// Usage error (invalid arguments, unknown preset)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `textplay` operations.
#[derive(Debug, Error)]
pub enum TextplayError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Boot flag persistence error
    #[error(transparent)]
    State(#[from] StateError),

    /// Terminal rendering error
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TextplayError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::State(_) | Self::Render(_) | Self::Io(_) => ExitCode::IO_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", summarize(errors))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

fn summarize(errors: &[ValidationIssue]) -> String {
    match errors {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "streams[1].phases[2].exit")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Validation failure that prevents the surface from being played
    Error,
    /// Potential issue that does not prevent loading
    Warning,
}

// ============================================================================
// Boot Flag Errors
// ============================================================================

/// Errors reading or writing the persisted "boot already seen" flag.
#[derive(Debug, Error)]
pub enum StateError {
    /// Flag file could not be read
    #[error("failed to read state file {path}: {source}")]
    Read {
        /// Path to the flag file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Flag file could not be written
    #[error("failed to write state file {path}: {source}")]
    Write {
        /// Path to the flag file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

// ============================================================================
// Render Errors
// ============================================================================

/// Terminal output errors.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Writing a frame to the output failed
    #[error("failed to write frame: {0}")]
    Write(#[from] std::io::Error),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `textplay` operations.
pub type Result<T> = std::result::Result<T, TextplayError>;

// ============================================================================
// Tests
// ============================================================================
