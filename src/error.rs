//! Error types for zencube.
//!
//! This module defines two main error categories:
//! - [`ConfigError`]: Configuration rejected during `prepare()` - no process is created
//! - [`LaunchError`]: Setup or wait failures during `run()` - the child could not be
//!   started under its limits, or could not be waited on
//!
//! A child that is killed by a limit is *not* an error. That is reported as a
//! [`TerminationOutcome`](crate::TerminationOutcome).

use std::io;
use thiserror::Error;

/// The four ceilings a [`ResourceLimits`](crate::ResourceLimits) can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    /// Accumulated CPU time, in seconds.
    Cpu,
    /// Address space, in megabytes.
    Memory,
    /// Processes owned by the executing user (or job).
    ProcessCount,
    /// Size of any single file the child writes, in megabytes.
    FileSize,
}

impl LimitKind {
    /// All kinds, in the order limits are translated and reported.
    pub const ALL: [LimitKind; 4] = [
        LimitKind::Cpu,
        LimitKind::Memory,
        LimitKind::ProcessCount,
        LimitKind::FileSize,
    ];

    /// Whether a failure to apply this limit aborts the launch.
    ///
    /// CPU and file-size ceilings decide how the child terminates, so losing
    /// them is fatal. Memory and process-count ceilings only narrow the
    /// safety margin and degrade to a warning.
    pub fn is_fatal_on_failure(self) -> bool {
        matches!(self, LimitKind::Cpu | LimitKind::FileSize)
    }

    /// Unit the caller configures this limit in.
    pub fn unit(self) -> &'static str {
        match self {
            LimitKind::Cpu => "seconds",
            LimitKind::Memory | LimitKind::FileSize => "MB",
            LimitKind::ProcessCount => "processes",
        }
    }
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitKind::Cpu => write!(f, "CPU time"),
            LimitKind::Memory => write!(f, "memory"),
            LimitKind::ProcessCount => write!(f, "process count"),
            LimitKind::FileSize => write!(f, "file size"),
        }
    }
}

/// Configuration rejected before any process is created.
///
/// All error messages are safe to print verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A limit was given a negative value
    #[error("invalid {kind} limit: {value} (must be zero or positive)")]
    NegativeLimit { kind: LimitKind, value: i64 },

    /// No command was given
    #[error("no command specified")]
    EmptyProgram,

    /// Program path or an argument contains an interior NUL byte
    #[error("{what} contains a NUL byte")]
    NulByte { what: String },
}

/// Setup or runtime failure while launching the child.
///
/// These errors carry the limit involved (when there is one) and the
/// underlying platform error.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// A CPU or file-size limit could not be applied
    #[error("failed to set {kind} limit: {reason}")]
    LimitSetup { kind: LimitKind, reason: String },

    /// The child process could not be created, or its image could not be replaced
    #[error("failed to execute '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Creating, configuring or attaching the job object failed
    #[error("job object {stage} failed: {source}")]
    JobObject {
        stage: &'static str,
        #[source]
        source: io::Error,
    },

    /// Waiting for the child failed
    #[error("wait for child {id} failed: {source}", id = display_pid(.pid))]
    WaitFailed {
        pid: Option<u32>,
        #[source]
        source: io::Error,
    },

    /// A child that could not be put under its limits could not be terminated
    #[error("failed to terminate child {id} after {cause}: {source}", id = display_pid(.pid))]
    KillFailed {
        pid: Option<u32>,
        cause: Box<LaunchError>,
        #[source]
        source: io::Error,
    },

    /// Failed to bring up the runtime that drives the wait
    #[error("runtime error: {reason}")]
    Runtime { reason: String },
}

fn display_pid(pid: &Option<u32>) -> String {
    pid.map_or_else(|| "?".to_string(), |p| p.to_string())
}

/// Combined error type for the prepare-and-run flow.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Launch(#[from] LaunchError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(LimitKind::Cpu.is_fatal_on_failure());
        assert!(LimitKind::FileSize.is_fatal_on_failure());
        assert!(!LimitKind::Memory.is_fatal_on_failure());
        assert!(!LimitKind::ProcessCount.is_fatal_on_failure());
    }

    #[test]
    fn test_messages_name_the_limit() {
        let err = ConfigError::NegativeLimit {
            kind: LimitKind::Cpu,
            value: -5,
        };
        assert_eq!(
            err.to_string(),
            "invalid CPU time limit: -5 (must be zero or positive)"
        );

        let err = LaunchError::LimitSetup {
            kind: LimitKind::FileSize,
            reason: "Operation not permitted".to_string(),
        };
        assert!(err.to_string().contains("file size"));
    }

    #[test]
    fn test_wait_failed_without_pid() {
        let err = LaunchError::WaitFailed {
            pid: None,
            source: io::Error::from(io::ErrorKind::Other),
        };
        assert!(err.to_string().starts_with("wait for child ? failed"));
    }

    #[test]
    fn test_kill_failure_keeps_the_original_cause() {
        let err = LaunchError::KillFailed {
            pid: Some(42),
            cause: Box::new(LaunchError::JobObject {
                stage: "assignment",
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            }),
            source: io::Error::from(io::ErrorKind::Other),
        };
        let message = err.to_string();
        assert!(message.starts_with("failed to terminate child 42 after job object assignment failed"));
    }
}
