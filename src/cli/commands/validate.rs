//! `validate` command: checks surface files without playing them.

use std::path::Path;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::ConfigLoader;
use crate::error::{ConfigError, Severity, TextplayError, ValidationIssue};

/// Validation outcome for one file.
#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

/// Validate every file and print a report.
///
/// Every file is checked even after a failure. With `--strict`, warnings
/// count as errors.
///
/// # Errors
///
/// Returns the first failing file as a [`ConfigError`].
pub fn run(args: &ValidateArgs) -> Result<(), TextplayError> {
    let loader = ConfigLoader::with_defaults();
    let mut first_failure = None;
    let mut reports = Vec::with_capacity(args.files.len());

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating surface");
        let report = match check(&loader, path, args.strict) {
            Ok(report) => report,
            Err(err) => {
                tracing::debug!(file = %path.display(), error = %err, "surface unreadable");
                let report = FileReport {
                    file: path.display().to_string(),
                    valid: false,
                    errors: vec![ValidationIssue {
                        path: String::new(),
                        message: err.to_string(),
                        severity: Severity::Error,
                    }],
                    warnings: Vec::new(),
                };
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
                report
            }
        };

        if !report.valid && first_failure.is_none() {
            first_failure = Some(ConfigError::ValidationError {
                path: report.file.clone(),
                errors: report.errors.clone(),
            });
        }
        reports.push(report);
    }

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                print_human(report);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    first_failure.map_or(Ok(()), |err| Err(err.into()))
}

fn check(loader: &ConfigLoader, path: &Path, strict: bool) -> Result<FileReport, ConfigError> {
    let config = loader.parse(path)?;
    let mut result = loader.validate(&config);

    if strict {
        result.errors.extend(result.warnings.drain(..).map(|issue| ValidationIssue {
            severity: Severity::Error,
            ..issue
        }));
    }

    Ok(FileReport {
        file: path.display().to_string(),
        valid: result.is_valid(),
        errors: result.errors,
        warnings: result.warnings,
    })
}

fn print_human(report: &FileReport) {
    let mark = if report.valid { "ok" } else { "FAILED" };
    println!("{}: {mark}", report.file);
    for issue in report.errors.iter().chain(&report.warnings) {
        if issue.path.is_empty() {
            println!("  {}", issue.message);
        } else {
            println!("  {issue}");
        }
    }
}
