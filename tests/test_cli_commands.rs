mod common;

use common::{CONFIG_ERROR, fixture_path, run, stderr, stdout};

// ============================================================================
// validate
// ============================================================================

#[test]
fn validate_valid_surface() {
    let surface = fixture_path("quick_surface.yaml");
    let output = run(&["validate", surface.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "validate should succeed: {}",
        stderr(&output)
    );
    assert!(stdout(&output).contains(": ok"), "{}", stdout(&output));
}

#[test]
fn validate_reports_every_error() {
    let surface = fixture_path("invalid_surface.yaml");
    let output = run(&["validate", surface.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(CONFIG_ERROR));

    let out = stdout(&output);
    assert!(out.contains("FAILED"), "{out}");
    assert!(out.contains("Did you mean 'main'"), "{out}");
    assert!(out.contains("wait phase needs an exit"), "{out}");
    assert!(out.contains("greater than zero"), "{out}");
}

#[test]
fn validate_rejects_oversized_durations() {
    let surface = fixture_path("oversized_duration.yaml");
    let output = run(&["validate", surface.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(CONFIG_ERROR));

    let out = stdout(&output);
    assert!(out.contains("visibility.timeline[1].at"), "{out}");
    assert!(out.contains("streams[0].phases[0].exit.duration"), "{out}");
    assert!(out.contains("too long (maximum: 24h)"), "{out}");
}

#[test]
fn validate_malformed_yaml() {
    let surface = fixture_path("malformed.yaml");
    let output = run(&["validate", surface.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(CONFIG_ERROR));
    assert!(stderr(&output).contains("parse error"), "{}", stderr(&output));
}

#[test]
fn validate_missing_file() {
    let output = run(&["validate", "/tmp/nonexistent_textplay_surface.yaml"]);
    assert_eq!(output.status.code(), Some(CONFIG_ERROR));
}

#[test]
fn validate_strict_promotes_warnings() {
    let surface = fixture_path("warning_surface.yaml");
    let path = surface.to_str().unwrap();

    let lenient = run(&["validate", path]);
    assert!(lenient.status.success(), "{}", stderr(&lenient));
    assert!(stdout(&lenient).contains("warning: Script has no lines"));

    let strict = run(&["validate", "--strict", path]);
    assert_eq!(strict.status.code(), Some(CONFIG_ERROR));
}

#[test]
fn validate_json_output() {
    let good = fixture_path("quick_surface.yaml");
    let bad = fixture_path("invalid_surface.yaml");
    let output = run(&[
        "validate",
        "--format",
        "json",
        good.to_str().unwrap(),
        bad.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(CONFIG_ERROR));

    let parsed: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("output should be valid JSON");
    let reports = parsed.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["valid"], true);
    assert_eq!(reports[1]["valid"], false);
    assert_eq!(reports[1]["errors"][0]["severity"], "error");
}

// ============================================================================
// list
// ============================================================================

#[test]
fn list_human() {
    let output = run(&["list"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    for name in ["boot", "kernel", "kernel-loop", "contact", "transition"] {
        assert!(out.contains(name), "missing preset {name}: {out}");
    }
}

#[test]
fn list_json() {
    let output = run(&["list", "--format", "json"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let boot = parsed
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == "boot")
        .expect("boot preset listed");
    assert_eq!(boot["streams"][0], "boot");
    assert!(boot["duration_ms"].as_u64().unwrap() > 15_000);
}

// ============================================================================
// version / completions
// ============================================================================

#[test]
fn version_human() {
    let output = run(&["version"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.starts_with("textplay "), "{out}");
    assert!(out.contains(env!("CARGO_PKG_VERSION")), "{out}");
}

#[test]
fn version_json() {
    let output = run(&["version", "--format", "json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed["name"], "textplay");
    assert!(parsed["presets"].as_array().unwrap().len() >= 5);
}

#[test]
fn completions_bash() {
    let output = run(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("textplay"));
}
