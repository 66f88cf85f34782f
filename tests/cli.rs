//! Tests for the `zencube` binary's exit status contract.

#![cfg(unix)]

use std::process::{Command, Output};

fn zencube(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_zencube"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("binary runs")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help_exits_zero() {
    let output = zencube(&["--help"]);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--cpu"));
    assert!(stdout.contains("--fsize"));
    assert!(stdout.contains("SIGXCPU"));
}

#[test]
fn test_negative_limit_rejected_before_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran");
    let script = format!("touch {}", marker.display());

    let output = zencube(&["--cpu=-5", "/bin/sh", "-c", &script]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("invalid CPU time limit: -5"));
    assert!(!marker.exists(), "child must not have run");
}

#[test]
fn test_unknown_option_rejected() {
    let output = zencube(&["--bogus=1", "/bin/true"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_missing_command_rejected() {
    let output = zencube(&["--cpu=1"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_child_exit_code_mirrored() {
    let output = zencube(&["/bin/sh", "-c", "exit 3"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("exited normally with status 3"));
}

#[test]
fn test_child_flags_pass_through() {
    let output = zencube(&["/bin/echo", "-n", "hello"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello");
}

#[test]
fn test_cpu_violation_exits_with_failure() {
    let output = zencube(&["--cpu=1", "/bin/sh", "-c", "while :; do :; done"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr(&output);
    assert!(stderr.contains("CPU time limit"));
    assert!(stderr.contains("SIGXCPU"));
    assert!(stderr.contains("Execution time"));
}

#[test]
fn test_missing_program_exits_with_failure() {
    let output = zencube(&["/nonexistent/zencube-test-binary"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("failed to execute"));
}
