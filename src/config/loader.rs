//! Configuration loader
//!
//! Pipeline:
//! 1. Size check
//! 2. Read and strip a UTF-8 BOM
//! 3. YAML parsing
//! 4. Deserialization to [`SurfaceConfig`]
//! 5. Validation
//!
//! [`ConfigLoader::parse`] stops after step 4 for callers that want the
//! full validation report rather than the first failure.

use crate::config::schema::SurfaceConfig;
use crate::config::validation::{ValidationResult, Validator};
use crate::error::ConfigError;

use std::path::{Path, PathBuf};
use std::str::FromStr;

// ============================================================================
// Public API
// ============================================================================

/// Options for the configuration loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Limits for configuration size.
    pub config_limits: ConfigLimits,
}

/// Limits for configuration size to prevent resource exhaustion.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum number of streams.
    pub max_streams: usize,

    /// Maximum number of phases per stream.
    pub max_phases: usize,

    /// Maximum number of lines per script.
    pub max_lines: usize,

    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_streams: env_or("TEXTPLAY_MAX_STREAMS", 32),
            max_phases: env_or("TEXTPLAY_MAX_PHASES", 100),
            max_lines: env_or("TEXTPLAY_MAX_LINES", 10_000),
            max_config_size: env_or("TEXTPLAY_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: SurfaceConfig,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{location}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a new configuration loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a new configuration loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Loads and validates a surface file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or exceeds the size limit
    /// - YAML parsing fails
    /// - Validation fails
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let config = self.parse(path)?;
        self.finish(config, path)
    }

    /// Parses and validates surface YAML. `path` is only used in errors.
    ///
    /// # Errors
    ///
    /// Returns an error if YAML parsing or validation fails.
    pub fn load_str(&self, content: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        let config = self.parse_str(content, path)?;
        self.finish(config, path)
    }

    /// Reads and parses a surface file without validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, exceeds the size limit
    /// or is not a well-formed surface.
    pub fn parse(&self, path: &Path) -> Result<SurfaceConfig, ConfigError> {
        let max_size = self.options.config_limits.max_config_size;

        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > max_size {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {max_size} bytes"),
            });
        }

        let raw_content = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.parse_str(&raw_content, path)
    }

    /// Parses surface YAML without validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is empty or not a well-formed surface.
    pub fn parse_str(&self, content: &str, path: &Path) -> Result<SurfaceConfig, ConfigError> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        let root: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| parse_error(path, &e))?;

        if root.is_null() {
            return Err(ConfigError::ParseError {
                path: path.to_path_buf(),
                line: None,
                message: "Configuration file is empty".to_string(),
            });
        }

        // Re-parse from text rather than from `root` so errors keep their
        // line numbers.
        serde_yaml::from_str(content).map_err(|e| parse_error(path, &e))
    }

    /// Validates a parsed surface with this loader's limits.
    #[must_use]
    pub fn validate(&self, config: &SurfaceConfig) -> ValidationResult {
        Validator::new().validate(config, &self.options.config_limits)
    }

    fn finish(&self, config: SurfaceConfig, path: &Path) -> Result<LoadResult, ConfigError> {
        let result = self.validate(&config);

        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: result.errors,
            });
        }

        let warnings = result
            .warnings
            .into_iter()
            .map(|issue| LoadWarning {
                message: issue.message,
                location: Some(issue.path),
            })
            .collect();

        Ok(LoadResult { config, warnings })
    }
}

fn parse_error(path: &Path, e: &serde_yaml::Error) -> ConfigError {
    ConfigError::ParseError {
        path: PathBuf::from(path),
        line: e.location().map(|l| l.line()),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    const MINIMAL: &str = r"
name: demo
streams:
  - name: main
    phases:
      - name: hello
        action: { kind: type, lines: [hello] }
";

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_minimal() {
        let file = write_temp(MINIMAL);
        let result = assert_ok!(ConfigLoader::with_defaults().load(file.path()));
        assert_eq!(result.config.name, "demo");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_load_strips_bom() {
        let file = write_temp(&format!("\u{feff}{MINIMAL}"));
        assert_ok!(ConfigLoader::with_defaults().load(file.path()));
    }

    #[test]
    fn test_missing_file() {
        let err = assert_err!(ConfigLoader::with_defaults().load(Path::new("/nonexistent/x.yaml")));
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn test_empty_file() {
        let file = write_temp("   \n");
        let err = assert_err!(ConfigLoader::with_defaults().load(file.path()));
        match err {
            ConfigError::ParseError { message, .. } => assert!(message.contains("empty")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_has_line() {
        let file = write_temp("name: demo\nstreams:\n  - name: [unclosed\n");
        let err = assert_err!(ConfigLoader::with_defaults().load(file.path()));
        match err {
            ConfigError::ParseError { line, .. } => assert!(line.is_some()),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_size_limit() {
        let file = write_temp(MINIMAL);
        let loader = ConfigLoader::new(LoaderOptions {
            config_limits: ConfigLimits {
                max_config_size: 8,
                ..ConfigLimits::default()
            },
        });
        let err = assert_err!(loader.load(file.path()));
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "file_size"));
    }

    #[test]
    fn test_validation_errors_are_reported() {
        let yaml = "name: ''\nstreams: []\n";
        let err = assert_err!(ConfigLoader::with_defaults().load_str(yaml, Path::new("inline.yaml")));
        match err {
            ConfigError::ValidationError { path, errors } => {
                assert_eq!(path, "inline.yaml");
                assert!(errors.iter().any(|e| e.path == "name"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_warnings_are_returned() {
        let yaml = r"
name: demo
streams:
  - name: main
    phases:
      - name: empty
        action: { kind: show, lines: [] }
        exit: { on: after, duration: 1s }
";
        let result = assert_ok!(ConfigLoader::with_defaults().load_str(yaml, Path::new("w.yaml")));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(
            result.warnings[0].location.as_deref(),
            Some("streams[0].phases[0].action.lines")
        );
    }
}
