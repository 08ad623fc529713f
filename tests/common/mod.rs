//! Shared helpers for spawning the `textplay` binary.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};

/// Exit code for configuration errors.
pub const CONFIG_ERROR: i32 = 2;

/// Exit code for usage errors.
pub const USAGE_ERROR: i32 = 64;

/// Path of a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Base command with logging silenced and colour off.
pub fn command(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_textplay"));
    cmd.args(args)
        .env_remove("TEXTPLAY_CONFIG")
        .env_remove("TEXTPLAY_STATE_FILE")
        .env_remove("TEXTPLAY_REDUCED_MOTION")
        .env("TEXTPLAY_COLOR", "never");
    cmd
}

/// Runs `textplay` to completion with stdin closed.
#[allow(clippy::missing_panics_doc)]
pub fn run(args: &[&str]) -> Output {
    command(args)
        .stdin(Stdio::null())
        .output()
        .expect("failed to run textplay")
}

/// Spawns `textplay` with piped stdin and stdout.
#[allow(clippy::missing_panics_doc)]
pub fn spawn(args: &[&str]) -> Child {
    command(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn textplay")
}

/// Stdout as text.
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Stderr as text.
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
