//! Platform launch backends.
//!
//! Two structurally different mechanisms start a child with its limits in
//! place before the target program runs:
//!
//! - [`ForkExecLauncher`] (Unix): fork, apply rlimits in the child through a
//!   pre-exec hook, then replace the child's image with the target program.
//! - [`JobObjectLauncher`] (Windows): create and configure a job object, create
//!   the process, then assign it to the job.
//!
//! The backend is picked at build time through [`NativeLauncher`], never per
//! call.

use crate::error::LaunchError;
use crate::outcome::RawTermination;
use crate::request::LaunchRequest;
use crate::translate::LimitPlan;
use std::future::Future;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::{ForkExecChild, ForkExecLauncher};
#[cfg(windows)]
pub use windows::{JobObjectChild, JobObjectLauncher};

/// The launcher for the platform this crate was built for.
#[cfg(unix)]
pub type NativeLauncher = ForkExecLauncher;

/// The launcher for the platform this crate was built for.
#[cfg(windows)]
pub type NativeLauncher = JobObjectLauncher;

/// Starts exactly one child process with a [`LimitPlan`] attached.
pub trait PlatformLauncher {
    /// Handle to the running child.
    type Child: LaunchedChild;

    /// Short backend name, for logs.
    const NAME: &'static str;

    /// Spawn `request` with `plan` applied before the program's code runs.
    ///
    /// On error no child is left running and any partially created OS
    /// resource has been released.
    fn spawn(&self, request: &LaunchRequest, plan: &LimitPlan) -> Result<Self::Child, LaunchError>;
}

/// A running child, exclusively owned until it has been waited on.
pub trait LaunchedChild {
    /// Process identifier, if the child has not been reaped yet.
    fn id(&self) -> Option<u32>;

    /// Block until the child terminates.
    ///
    /// Waits exactly once, without timeout or retry. Consumes the handle so
    /// the process handle is released on every path.
    fn wait(self) -> impl Future<Output = Result<RawTermination, LaunchError>>;
}
