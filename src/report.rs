//! Launch report.

use crate::limits::ResourceLimits;
use crate::outcome::TerminationOutcome;
use crate::timer::format_elapsed;
use crate::translate::LimitPlan;
use std::time::Duration;

/// Result of one launch: what ran, how it ended, and how long it took.
#[derive(Debug, Clone)]
pub struct LaunchReport {
    /// Process identifier of the child.
    pub pid: Option<u32>,

    /// How the child terminated.
    pub outcome: TerminationOutcome,

    /// Time from spawn to wait completion, `None` if unknown.
    pub elapsed: Option<Duration>,

    /// Limits the child was launched under.
    pub limits: ResourceLimits,

    /// How each limit was translated.
    pub plan: LimitPlan,
}

impl LaunchReport {
    /// Exit status the runner should report: the child's own code on normal
    /// completion, the failure sentinel otherwise.
    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }

    /// Check if the child exited successfully (code 0).
    pub fn success(&self) -> bool {
        self.outcome.success()
    }

    /// Elapsed time in fractional seconds, if known.
    pub fn elapsed_secs(&self) -> Option<f64> {
        self.elapsed.map(|d| d.as_secs_f64())
    }

    /// Human-readable classification of the outcome.
    pub fn describe(&self) -> String {
        self.outcome.describe(&self.limits)
    }

    /// Elapsed time formatted for display.
    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed)
    }
}
