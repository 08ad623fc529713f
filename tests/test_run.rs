mod common;

use std::io::{BufRead, BufReader, Write};

use common::{USAGE_ERROR, fixture_path, run, spawn, stderr, stdout};

#[test]
fn run_surface_plain() {
    let surface = fixture_path("quick_surface.yaml");
    let output = run(&["run", "--config", surface.to_str().unwrap(), "--render", "plain"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let out = stdout(&output);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "[log] [OK] core online");
    assert_eq!(lines[1], "[log] ");
    assert_eq!(lines[2], "[log] $ status");
    assert!(lines.iter().any(|l| l.ends_with("100%")), "{out}");
    assert_eq!(lines.last(), Some(&"[footer] ready"));
}

#[test]
fn run_reduced_motion_prints_the_same_lines() {
    let surface = fixture_path("quick_surface.yaml");
    let output = run(&[
        "run",
        "--config",
        surface.to_str().unwrap(),
        "--render",
        "plain",
        "--reduced-motion",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("[log] [OK] core online"), "{out}");
    assert!(out.contains("[footer] ready"), "{out}");
}

#[test]
fn run_unknown_preset_suggests_name() {
    let output = run(&["run", "--preset", "bot"]);
    assert_eq!(output.status.code(), Some(USAGE_ERROR));
    assert!(stderr(&output).contains("Did you mean 'boot'"), "{}", stderr(&output));
}

#[test]
fn run_invalid_surface_is_config_error() {
    let surface = fixture_path("invalid_surface.yaml");
    let output = run(&["run", "--config", surface.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(common::CONFIG_ERROR));
}

#[test]
fn run_oversized_duration_is_config_error() {
    let surface = fixture_path("oversized_duration.yaml");
    let output = run(&["run", "--config", surface.to_str().unwrap(), "--render", "plain"]);
    assert_eq!(output.status.code(), Some(common::CONFIG_ERROR));
    assert!(!stderr(&output).contains("panicked"), "{}", stderr(&output));
}

#[test]
fn run_ends_when_timeline_hides_surface() {
    let surface = fixture_path("hidden_surface.yaml");
    let output = run(&["run", "--config", surface.to_str().unwrap(), "--render", "plain"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).is_empty(), "{}", stdout(&output));
}

#[test]
fn run_state_file_skips_completed_surface() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");
    let state = state.to_str().unwrap();
    let surface = fixture_path("quick_surface.yaml");
    let surface = surface.to_str().unwrap();
    let args = ["run", "--config", surface, "--render", "plain", "--state-file", state];

    let first = run(&args);
    assert!(first.status.success(), "{}", stderr(&first));
    assert!(stdout(&first).contains("core online"));

    let recorded: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(state).unwrap()).unwrap();
    assert!(recorded["completed"]["quick"].is_string());

    let second = run(&args);
    assert!(second.status.success(), "{}", stderr(&second));
    assert!(!stdout(&second).contains("core online"), "{}", stdout(&second));

    let mut replay_args = args.to_vec();
    replay_args.push("--replay");
    let replay = run(&replay_args);
    assert!(replay.status.success(), "{}", stderr(&replay));
    assert!(stdout(&replay).contains("core online"));
}

#[test]
fn run_writes_event_stream() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("events.jsonl");
    let surface = fixture_path("quick_surface.yaml");
    let output = run(&[
        "run",
        "--config",
        surface.to_str().unwrap(),
        "--render",
        "plain",
        "--events",
        events.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let lines: Vec<serde_json::Value> = std::fs::read_to_string(&events)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    let first = lines.first().unwrap();
    let last = lines.last().unwrap();
    assert_eq!(first["type"], "RunStarted");
    assert_eq!(first["streams"], serde_json::json!(["log", "footer"]));
    assert_eq!(last["type"], "RunCompleted");
    assert_eq!(last["reason"], "completed");
    assert!(lines.iter().any(|e| e["type"] == "PhaseEntered" && e["phase"] == "loading"));
    assert!(lines.iter().any(|e| e["type"] == "LineCompleted" && e["text"] == "$ status"));

    for (i, event) in lines.iter().enumerate() {
        assert_eq!(event["sequence"], i as u64);
        assert_eq!(event["run_id"], first["run_id"]);
    }
}

#[test]
fn run_signal_exit_waits_for_enter() {
    let surface = fixture_path("signal_surface.yaml");
    let mut child = spawn(&["run", "--config", surface.to_str().unwrap(), "--render", "plain"]);
    let mut stdin = child.stdin.take().unwrap();
    let mut lines = BufReader::new(child.stdout.take().unwrap()).lines();

    assert_eq!(lines.next().unwrap().unwrap(), "$ press enter");
    stdin.write_all(b"\n").unwrap();
    assert_eq!(lines.next().unwrap().unwrap(), "[OK] continuing");

    let status = child.wait().unwrap();
    assert!(status.success());
}
