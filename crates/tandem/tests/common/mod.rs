//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::process::{Child, Command, Output, Stdio};

/// Run the tandem binary in the specified directory
pub fn run_tandem_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tandem"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute tandem binary")
}

/// Start the tandem binary without waiting for it
pub fn spawn_tandem_in_dir(dir: &Path, args: &[&str]) -> Child {
    Command::new(env!("CARGO_BIN_EXE_tandem"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn tandem binary")
}

/// Run a command and assert it succeeded, returning stdout
pub fn run_ok(dir: &Path, args: &[&str]) -> String {
    let output = run_tandem_in_dir(dir, args);
    assert!(
        output.status.success(),
        "tandem {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Run a command with `--json` and parse its stdout
pub fn run_json(dir: &Path, args: &[&str]) -> serde_json::Value {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let stdout = run_ok(dir, &full);
    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("tandem {args:?} printed invalid JSON ({e}): {stdout}"))
}

/// Write a feature batch file and return its path as a string
pub fn write_features(dir: &Path, json: &str) -> String {
    let path = dir.join("features.json");
    std::fs::write(&path, json).unwrap();
    path.display().to_string()
}
