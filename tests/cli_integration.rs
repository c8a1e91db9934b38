//! Integration tests for command dispatch and exit codes.
//!
//! Guarantees tested:
//! - help, usage and no arguments print usage and exit 0
//! - Unrecognized commands exit 1
//! - Bad indices are rejected (exit 1) before anything touches the host
//! - Config errors are operational failures (exit 10)
//! - On non-macOS hosts, list/audit/fix stop at the platform check (exit 1)

mod common;

use common::*;

#[test]
fn test_no_arguments_prints_usage() {
    let project = TestProject::new();
    let output = project.run_lockdown_ok(&[]);
    assert_stdout_contains(&output, "Usage: lockdown");
    assert_stdout_contains(&output, "fix-force");
}

#[test]
fn test_help_and_usage_commands() {
    let project = TestProject::new();
    for command in ["help", "usage"] {
        let output = project.run_lockdown_ok(&[command]);
        assert_stdout_contains(&output, "Usage: lockdown");
    }
}

#[test]
fn test_help_ignores_broken_config() {
    let project = TestProject::with_config("this is not toml [");
    project.run_lockdown_ok(&["help"]);
}

#[test]
fn test_help_flag() {
    let project = TestProject::new();
    let output = project.run_lockdown_ok(&["--help"]);
    assert_stdout_contains(&output, "Commands:");
    assert_stdout_contains(&output, "audit");
}

#[test]
fn test_version_flag() {
    let project = TestProject::new();
    let output = project.run_lockdown_ok(&["--version"]);
    assert_stdout_contains(&output, env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_unknown_command_exits_1() {
    let project = TestProject::new();
    let output = project.run_lockdown_fails(&["frobnicate"], 1);
    assert_stderr_contains(&output, "frobnicate");
}

#[test]
fn test_out_of_range_index_exits_1() {
    let project = TestProject::new();
    let output = project.run_lockdown_fails(&["audit", "99"], 1);
    assert_stderr_contains(&output, "Index 99 is out of range");
    assert_stderr_contains(&output, "lockdown list");
}

#[test]
fn test_negative_index_exits_1() {
    let project = TestProject::new();
    let output = project.run_lockdown_fails(&["audit", "-1"], 1);
    assert_stderr_contains(&output, "out of range");
}

#[test]
fn test_non_numeric_index_exits_1() {
    let project = TestProject::new();
    let output = project.run_lockdown_fails(&["fix", "abc"], 1);
    assert_stderr_contains(&output, "not a valid index");
}

#[test]
fn test_bad_fix_index_is_rejected_before_prompting() {
    let project = TestProject::new();
    let output = project.run_lockdown_fails(&["fix-force", "16"], 1);
    assert_stderr_contains(&output, "out of range");
    assert!(!stdout(&output).contains("Aborted"));
}

#[test]
fn test_missing_explicit_config_exits_10() {
    let project = TestProject::new();
    let output = project.run_lockdown_fails(&["--config", "nope.toml", "list"], 10);
    assert_stderr_contains(&output, "Config file not found");
}

#[test]
fn test_unknown_skip_name_exits_10() {
    let project = TestProject::with_config("[settings]\nskip = [\"enable_telepathy\"]\n");
    let output = project.run_lockdown_fails(&["audit"], 10);
    assert_stderr_contains(&output, "enable_telepathy");
}

#[test]
fn test_unparseable_config_exits_10() {
    let project = TestProject::with_config("[preconditions]\nsupported_versions = \"fourteen\"\n");
    let output = project.run_lockdown_fails(&["audit"], 10);
    assert_stderr_contains(&output, "Failed to parse");
}

#[cfg(not(target_os = "macos"))]
mod non_macos {
    use super::*;

    #[test]
    fn test_list_requires_macos() {
        let project = TestProject::new();
        let output = project.run_lockdown_fails(&["list"], 1);
        assert_stderr_contains(&output, "requires macOS");
    }

    #[test]
    fn test_audit_requires_macos() {
        let project = TestProject::new();
        let output = project.run_lockdown_fails(&["audit", "0"], 1);
        assert_stderr_contains(&output, "requires macOS");
    }

    #[test]
    fn test_fix_force_requires_macos() {
        let project = TestProject::new();
        let output = project.run_lockdown_fails(&["fix-force"], 1);
        assert_stderr_contains(&output, "requires macOS");
    }
}
