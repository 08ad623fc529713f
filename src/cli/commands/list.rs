//! `list` command: shows the built-in presets.

use serde::Serialize;

use crate::cli::args::{ListArgs, OutputFormat};
use crate::error::TextplayError;
use crate::gate::GatePolicy;
use crate::presets::{self, Preset};

#[derive(Debug, Serialize)]
struct PresetEntry {
    name: &'static str,
    summary: &'static str,
    streams: Vec<String>,
    gate: Option<String>,
    /// `None` when the preset loops or waits for a signal
    duration_ms: Option<u64>,
}

impl From<&Preset> for PresetEntry {
    fn from(preset: &Preset) -> Self {
        let spec = preset.spec();
        Self {
            name: preset.name,
            summary: preset.summary,
            streams: spec.streams.iter().map(|s| s.name.clone()).collect(),
            gate: spec.gate.map(describe_gate),
            duration_ms: spec
                .nominal_duration()
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

fn describe_gate(policy: GatePolicy) -> String {
    match policy {
        GatePolicy::OnceOnly => "once_only".to_string(),
        GatePolicy::RestartOnReentry { cooldown } => {
            format!("restart_on_reentry ({})", humantime::format_duration(cooldown))
        }
    }
}

/// Print every preset.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn run(args: &ListArgs) -> Result<(), TextplayError> {
    let entries: Vec<PresetEntry> = presets::PRESETS.iter().map(PresetEntry::from).collect();

    match args.format {
        OutputFormat::Human => {
            for entry in &entries {
                print_human(entry);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
    }
    Ok(())
}

fn print_human(entry: &PresetEntry) {
    let duration = entry.duration_ms.map_or_else(
        || "until stopped".to_string(),
        |ms| humantime::format_duration(std::time::Duration::from_millis(ms)).to_string(),
    );
    println!("{:<12} {}", entry.name, entry.summary);
    println!("{:<12} streams: {}", "", entry.streams.join(", "));
    println!(
        "{:<12} gate: {}, plays: {duration}",
        "",
        entry.gate.as_deref().unwrap_or("none")
    );
}
