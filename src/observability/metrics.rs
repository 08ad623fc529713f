//! Metrics collection.
//!
//! Prometheus-compatible counters and gauges with label cardinality
//! protection, plus typed convenience functions used by the engine.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::TextplayError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Maximum length for labels derived from configuration names.
const MAX_LABEL_LEN: usize = 64;

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `TextplayError::Io` if the recorder or HTTP listener
/// cannot be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), TextplayError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| TextplayError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "textplay_chars_revealed_total",
        "Total number of typewriter reveal ticks"
    );
    describe_counter!(
        "textplay_lines_completed_total",
        "Total number of fully revealed lines"
    );
    describe_counter!(
        "textplay_phase_transitions_total",
        "Total number of sequencer phase transitions"
    );
    describe_counter!(
        "textplay_runs_completed_total",
        "Total number of surfaces that finished every stream"
    );
    describe_gauge!(
        "textplay_progress_percent",
        "Latest displayed value of each progress ramp"
    );
}

/// Records one reveal tick.
pub fn record_reveal(component: &str) {
    counter!("textplay_chars_revealed_total", "component" => sanitize_label(component))
        .increment(1);
}

/// Records a fully revealed line.
pub fn record_line_completed(component: &str) {
    counter!("textplay_lines_completed_total", "component" => sanitize_label(component))
        .increment(1);
}

/// Sets a ramp's displayed value.
pub fn record_progress(component: &str, percent: u8) {
    gauge!("textplay_progress_percent", "component" => sanitize_label(component))
        .set(f64::from(percent));
}

/// Records a phase transition.
///
/// Phase names are sanitized to prevent label cardinality explosion
/// from user-controlled configuration values.
pub fn record_phase_transition(sequencer: &str, to_phase: &str) {
    counter!(
        "textplay_phase_transitions_total",
        "sequencer" => sanitize_label(sequencer),
        "to" => sanitize_label(to_phase)
    )
    .increment(1);
}

/// Records a finished surface.
pub fn record_run_completed(surface: &str) {
    counter!("textplay_runs_completed_total", "surface" => sanitize_label(surface)).increment(1);
}

/// Truncates to [`MAX_LABEL_LEN`] characters and replaces characters
/// invalid in Prometheus labels with underscores.
fn sanitize_label(name: &str) -> String {
    name.chars()
        .take(MAX_LABEL_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '/' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
