//! Termination classification.
//!
//! The platform wait status is first lowered to a [`RawTermination`], then
//! [`classify`] maps it, together with the configured limits, to a
//! [`TerminationOutcome`]. `classify` is pure so every rule can be exercised
//! without spawning anything.

use crate::error::LimitKind;
use crate::limits::ResourceLimits;
use std::fmt;
use std::time::Duration;

/// Exit status reported for every non-`Exited` outcome and for setup failures.
pub const FAILURE_EXIT_CODE: i32 = 1;

#[cfg(unix)]
const SIGKILL: i32 = libc::SIGKILL;
#[cfg(unix)]
const SIGXCPU: i32 = libc::SIGXCPU;
#[cfg(unix)]
const SIGXFSZ: i32 = libc::SIGXFSZ;

// POSIX numbering, so classification still compiles (and is testable) off Unix.
#[cfg(not(unix))]
const SIGKILL: i32 = 9;
#[cfg(not(unix))]
const SIGXCPU: i32 = 24;
#[cfg(not(unix))]
const SIGXFSZ: i32 = 25;

/// Terminal state of a child, as reported by the platform wait primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTermination {
    /// The child exited on its own.
    Exited(i32),
    /// The child was terminated by a signal.
    ///
    /// `cpu_time` is the CPU time charged to the child, when the launcher
    /// could measure it.
    Signaled {
        signal: i32,
        core_dumped: bool,
        cpu_time: Option<Duration>,
    },
    /// The child is stopped, not terminated.
    Stopped(i32),
    /// The child's job ended it; `cpu_exhausted` is set when job accounting
    /// shows the CPU ceiling was reached.
    JobTerminated { code: u32, cpu_exhausted: bool },
    /// A wait status none of the above describe.
    Unknown(i32),
}

#[cfg(unix)]
impl From<std::process::ExitStatus> for RawTermination {
    fn from(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        if let Some(code) = status.code() {
            RawTermination::Exited(code)
        } else if let Some(signal) = status.signal() {
            RawTermination::Signaled {
                signal,
                core_dumped: status.core_dumped(),
                cpu_time: None,
            }
        } else if let Some(signal) = status.stopped_signal() {
            RawTermination::Stopped(signal)
        } else {
            RawTermination::Unknown(status.into_raw())
        }
    }
}

/// How a launched child ended.
///
/// Anything other than `Exited` is an expected result of constrained
/// execution, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// Ran to completion with its own exit status.
    Exited(i32),

    /// Terminated because a configured limit was exceeded.
    ///
    /// `signal` is the terminating signal on Unix and the exit code on
    /// Windows. Memory kills are inferred, see [`classify`].
    KilledByLimit { kind: LimitKind, signal: i32 },

    /// Terminated by a signal not attributable to a configured limit.
    KilledBySignal { signal: i32, core_dumped: bool },

    /// Stopped rather than terminated. The child is not resumed.
    Stopped { signal: i32 },

    /// Wait status could not be interpreted.
    Unknown { raw: i32 },
}

impl TerminationOutcome {
    /// Exit status the runner itself should report.
    ///
    /// The child's own code on normal completion, [`FAILURE_EXIT_CODE`]
    /// otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            TerminationOutcome::Exited(code) => *code,
            _ => FAILURE_EXIT_CODE,
        }
    }

    /// Returns `true` if the child exited with status 0.
    pub fn success(&self) -> bool {
        matches!(self, TerminationOutcome::Exited(0))
    }

    /// Returns `true` if a limit violation ended the child.
    pub fn is_limit_violation(&self) -> bool {
        matches!(self, TerminationOutcome::KilledByLimit { .. })
    }

    /// Human-readable classification, including the configured ceiling for
    /// limit kills.
    pub fn describe(&self, limits: &ResourceLimits) -> String {
        match *self {
            TerminationOutcome::KilledByLimit {
                kind: LimitKind::Memory,
                signal,
            } => format!(
                "killed by {} (possibly by the {} MB memory limit)",
                signal_name(signal),
                limits.memory_mb
            ),
            TerminationOutcome::KilledByLimit { kind, signal } => format!(
                "resource limit violated: {kind} limit of {} {} exceeded ({})",
                limits.get(kind),
                kind.unit(),
                signal_name(signal)
            ),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for TerminationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TerminationOutcome::Exited(code) => write!(f, "exited normally with status {code}"),
            TerminationOutcome::KilledByLimit { kind, signal } => {
                write!(f, "{kind} limit exceeded ({})", signal_name(signal))
            }
            TerminationOutcome::KilledBySignal {
                signal,
                core_dumped,
            } => {
                write!(f, "terminated by signal {signal} ({})", signal_name(signal))?;
                if core_dumped {
                    write!(f, ", core dumped")?;
                }
                Ok(())
            }
            TerminationOutcome::Stopped { signal } => {
                write!(f, "stopped by signal {signal} ({})", signal_name(signal))
            }
            TerminationOutcome::Unknown { raw } => write!(f, "ended with unknown status {raw}"),
        }
    }
}

/// Map a raw termination to an outcome.
///
/// Rules, in order:
/// - normal exit keeps the child's own code;
/// - `SIGXCPU` is a CPU limit kill, `SIGXFSZ` a file-size limit kill;
/// - `SIGKILL` after the child used at least its CPU ceiling is a CPU limit
///   kill (the hard CPU limit is enforced with `SIGKILL`);
/// - `SIGKILL` while a memory ceiling is configured is reported as a memory
///   limit kill. This is a guess: the signal is indistinguishable from a
///   `SIGKILL` sent for any other reason, and an address-space ceiling
///   usually shows up as failed allocations rather than a kill;
/// - any other signal is reported as such;
/// - a job that ended with its CPU accounting at or past the ceiling is a CPU
///   limit kill, otherwise it is treated as a normal exit.
pub fn classify(raw: RawTermination, limits: &ResourceLimits) -> TerminationOutcome {
    match raw {
        RawTermination::Exited(code) => TerminationOutcome::Exited(code),
        RawTermination::Signaled { signal, .. } if signal == SIGXCPU => {
            TerminationOutcome::KilledByLimit {
                kind: LimitKind::Cpu,
                signal,
            }
        }
        RawTermination::Signaled { signal, .. } if signal == SIGXFSZ => {
            TerminationOutcome::KilledByLimit {
                kind: LimitKind::FileSize,
                signal,
            }
        }
        RawTermination::Signaled {
            signal, cpu_time, ..
        } if signal == SIGKILL && cpu_ceiling_reached(cpu_time, limits) => {
            TerminationOutcome::KilledByLimit {
                kind: LimitKind::Cpu,
                signal,
            }
        }
        RawTermination::Signaled { signal, .. }
            if signal == SIGKILL && limits.configured(LimitKind::Memory).is_some() =>
        {
            TerminationOutcome::KilledByLimit {
                kind: LimitKind::Memory,
                signal,
            }
        }
        RawTermination::Signaled {
            signal,
            core_dumped,
            ..
        } => TerminationOutcome::KilledBySignal {
            signal,
            core_dumped,
        },
        RawTermination::Stopped(signal) => TerminationOutcome::Stopped { signal },
        RawTermination::JobTerminated {
            code,
            cpu_exhausted: true,
        } => TerminationOutcome::KilledByLimit {
            kind: LimitKind::Cpu,
            signal: code as i32,
        },
        RawTermination::JobTerminated { code, .. } => TerminationOutcome::Exited(code as i32),
        RawTermination::Unknown(raw) => TerminationOutcome::Unknown { raw },
    }
}

fn cpu_ceiling_reached(cpu_time: Option<Duration>, limits: &ResourceLimits) -> bool {
    match (cpu_time, limits.configured(LimitKind::Cpu)) {
        (Some(used), Some(seconds)) => used >= Duration::from_secs(seconds),
        _ => false,
    }
}

/// Conventional name of a signal number, or `"unknown signal"`.
pub fn signal_name(signal: i32) -> &'static str {
    match signal {
        s if s == SIGXCPU => "SIGXCPU",
        s if s == SIGXFSZ => "SIGXFSZ",
        s if s == SIGKILL => "SIGKILL",
        #[cfg(unix)]
        s if s == libc::SIGSEGV => "SIGSEGV",
        #[cfg(unix)]
        s if s == libc::SIGABRT => "SIGABRT",
        #[cfg(unix)]
        s if s == libc::SIGTERM => "SIGTERM",
        #[cfg(unix)]
        s if s == libc::SIGINT => "SIGINT",
        #[cfg(unix)]
        s if s == libc::SIGHUP => "SIGHUP",
        #[cfg(unix)]
        s if s == libc::SIGPIPE => "SIGPIPE",
        #[cfg(unix)]
        s if s == libc::SIGBUS => "SIGBUS",
        #[cfg(unix)]
        s if s == libc::SIGFPE => "SIGFPE",
        #[cfg(unix)]
        s if s == libc::SIGILL => "SIGILL",
        #[cfg(unix)]
        s if s == libc::SIGSTOP => "SIGSTOP",
        #[cfg(unix)]
        s if s == libc::SIGTSTP => "SIGTSTP",
        _ => "unknown signal",
    }
}
