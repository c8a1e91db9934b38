//! Common test infrastructure for lockdown integration tests.
//!
//! Provides:
//! - TestProject: Temp working directory with an optional lockdown.toml
//! - Output assertion helpers
//!
//! Tests use the compiled binary (CARGO_BIN_EXE_lockdown) instead of `cargo run`.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Get the path to the compiled lockdown binary
pub fn lockdown_binary() -> String {
    env!("CARGO_BIN_EXE_lockdown").to_string()
}

/// A scratch working directory so a developer's ./lockdown.toml never leaks
/// into a test run.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Project with ./lockdown.toml containing `contents`.
    pub fn with_config(contents: &str) -> Self {
        let project = Self::new();
        std::fs::write(project.path("lockdown.toml"), contents).expect("Failed to write config");
        project
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn run_lockdown(&self, args: &[&str]) -> Output {
        Command::new(lockdown_binary())
            .args(args)
            .current_dir(self.dir.path())
            .env("LOCKDOWN_NON_INTERACTIVE", "1")
            .env("NO_COLOR", "1")
            .output()
            .expect("Failed to execute lockdown")
    }

    pub fn run_lockdown_ok(&self, args: &[&str]) -> Output {
        let output = self.run_lockdown(args);
        assert!(
            output.status.success(),
            "lockdown {:?} failed:\nstdout: {}\nstderr: {}",
            args,
            stdout(&output),
            stderr(&output)
        );
        output
    }

    pub fn run_lockdown_fails(&self, args: &[&str], expected_code: i32) -> Output {
        let output = self.run_lockdown(args);
        assert_eq!(
            output.status.code(),
            Some(expected_code),
            "lockdown {:?} exit code mismatch:\nstdout: {}\nstderr: {}",
            args,
            stdout(&output),
            stderr(&output)
        );
        output
    }
}

pub fn parse_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not valid JSON ({}):\n{}",
            e,
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

pub fn assert_stdout_contains(output: &Output, expected: &str) {
    let out = stdout(output);
    assert!(
        out.contains(expected),
        "Expected stdout to contain '{}', got:\n{}",
        expected,
        out
    );
}

pub fn assert_stderr_contains(output: &Output, expected: &str) {
    let err = stderr(output);
    assert!(
        err.contains(expected),
        "Expected stderr to contain '{}', got:\n{}",
        expected,
        err
    );
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
