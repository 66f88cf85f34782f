//! Integration tests for zencube.
//!
//! These tests verify end-to-end behavior with real binaries.

#![cfg(unix)]

use std::time::Duration;
use zencube::{
    Error, LaunchError, LaunchRequest, LimitKind, ResourceLimits, Sandbox, TerminationOutcome,
    FAILURE_EXIT_CODE,
};

/// Helper to run a shell snippet under `sandbox`.
async fn run_sh(sandbox: &Sandbox, script: &str) -> zencube::LaunchReport {
    let request = LaunchRequest::new("/bin/sh", ["-c", script]);
    sandbox
        .prepare(request)
        .expect("valid request")
        .run()
        .await
        .expect("launch succeeds")
}

#[tokio::test]
async fn test_echo_without_limits() {
    let sandbox = Sandbox::default();
    let request = LaunchRequest::new("echo", ["hello"]);

    let prepared = sandbox.prepare(request).unwrap();
    assert!(prepared.plan().is_empty());

    let report = prepared.run().await.unwrap();
    assert_eq!(report.outcome, TerminationOutcome::Exited(0));
    assert!(report.success());
    assert!(report.pid.is_some());
    assert!(report.elapsed.unwrap() > Duration::ZERO);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_exit_code_passes_through() {
    let report = run_sh(&Sandbox::default(), "exit 7").await;

    assert_eq!(report.outcome, TerminationOutcome::Exited(7));
    assert_eq!(report.exit_code(), 7);
    assert!(!report.success());
}

#[tokio::test]
async fn test_arguments_are_not_shell_expanded() {
    // "$1" is expanded by the inner shell from argv, proving the outer
    // launch passed "a b" as a single literal argument.
    let request = LaunchRequest::new(
        "/bin/sh",
        ["-c", r#"[ "$1" = "a b" ] && [ "$2" = '$HOME' ]"#, "sh", "a b", "$HOME"],
    );
    let report = Sandbox::default()
        .prepare(request)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, TerminationOutcome::Exited(0));
}

#[tokio::test]
async fn test_missing_program_is_spawn_error() {
    let request = LaunchRequest::new("/nonexistent/zencube-test-binary", Vec::<String>::new());
    let result = Sandbox::default().prepare(request).unwrap().run().await;

    match result {
        Err(Error::Launch(LaunchError::SpawnFailed { program, .. })) => {
            assert_eq!(program, "/nonexistent/zencube-test-binary");
        }
        other => panic!("expected SpawnFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sigkill_with_memory_ceiling_is_reported_as_memory() {
    let sandbox = Sandbox::builder().memory_mb(512).build();
    let report = run_sh(&sandbox, "kill -9 $$").await;

    assert_eq!(
        report.outcome,
        TerminationOutcome::KilledByLimit {
            kind: LimitKind::Memory,
            signal: libc::SIGKILL
        }
    );
    assert_eq!(report.exit_code(), FAILURE_EXIT_CODE);
    assert!(report.describe().contains("possibly"));
}

#[tokio::test]
async fn test_sigkill_without_memory_ceiling_is_plain_signal() {
    let report = run_sh(&Sandbox::default(), "kill -9 $$").await;

    assert!(matches!(
        report.outcome,
        TerminationOutcome::KilledBySignal {
            signal,
            ..
        } if signal == libc::SIGKILL
    ));
    assert_eq!(report.exit_code(), FAILURE_EXIT_CODE);
}

#[tokio::test]
async fn test_other_signal_is_not_a_limit() {
    let sandbox = Sandbox::builder().cpu_seconds(30).memory_mb(512).build();
    let report = run_sh(&sandbox, "kill -TERM $$").await;

    assert!(matches!(
        report.outcome,
        TerminationOutcome::KilledBySignal { signal, .. } if signal == libc::SIGTERM
    ));
    assert!(!report.outcome.is_limit_violation());
}

#[test]
fn test_run_sync_outside_runtime() {
    let prepared = Sandbox::default()
        .prepare(LaunchRequest::new("/bin/sh", ["-c", "exit 3"]))
        .unwrap();

    let report = prepared.run_sync().unwrap();
    assert_eq!(report.outcome, TerminationOutcome::Exited(3));
}

#[tokio::test]
async fn test_run_sync_inside_runtime() {
    let prepared = Sandbox::default()
        .prepare(LaunchRequest::new("/bin/sh", ["-c", "exit 4"]))
        .unwrap();

    let report = prepared.run_sync().unwrap();
    assert_eq!(report.outcome, TerminationOutcome::Exited(4));
}

#[tokio::test]
async fn test_report_keeps_plan_and_limits() {
    let limits = ResourceLimits::default()
        .with_cpu_seconds(10)
        .with_max_file_mb(5);
    let report = run_sh(&Sandbox::new(limits), "true").await;

    assert_eq!(report.limits, limits);
    assert_eq!(report.plan.entries().len(), 2);
    assert_eq!(report.outcome, TerminationOutcome::Exited(0));
}
