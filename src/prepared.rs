//! Prepared launch ready for execution.
//!
//! This module contains `PreparedLaunch`, which can only be created
//! by `Sandbox::prepare()`. Every child therefore starts from a validated
//! request and an already translated limit plan.

use crate::error::{Error, LaunchError};
use crate::launcher::{LaunchedChild, NativeLauncher, PlatformLauncher};
use crate::limits::ResourceLimits;
use crate::outcome::classify;
use crate::report::LaunchReport;
use crate::request::LaunchRequest;
use crate::timer::Timer;
use crate::translate::LimitPlan;
use tracing::{debug, info};

/// A validated launch ready for execution.
///
/// This type cannot be constructed outside of `zencube`.
/// The only way to create it is via `Sandbox::prepare()`.
#[derive(Debug, Clone)]
pub struct PreparedLaunch {
    pub(crate) request: LaunchRequest,
    pub(crate) limits: ResourceLimits,
    pub(crate) plan: LimitPlan,
}

impl PreparedLaunch {
    /// Launch the child with the platform's native launcher and wait for it.
    ///
    /// Suspends exactly once, at the wait, with no timeout. Only a configured
    /// CPU ceiling bounds how long that can take.
    ///
    /// # Errors
    ///
    /// - `LaunchError::SpawnFailed` if the process couldn't be started
    /// - `LaunchError::JobObject` if the job object couldn't be set up
    /// - `LaunchError::WaitFailed` if waiting for the child failed
    ///
    /// A child killed by a limit is not an error; see
    /// [`LaunchReport::outcome`].
    pub async fn run(self) -> Result<LaunchReport, Error> {
        self.run_with(&NativeLauncher::default()).await
    }

    /// Launch the child with a specific launcher.
    pub async fn run_with<L: PlatformLauncher>(self, launcher: &L) -> Result<LaunchReport, Error> {
        let PreparedLaunch {
            request,
            limits,
            plan,
        } = self;

        debug!(
            target: "zencube::launch",
            command = %request.display_command(),
            backend = L::NAME,
            "starting command"
        );

        let timer = Timer::start();
        let child = launcher.spawn(&request, &plan)?;
        let pid = child.id();
        info!(target: "zencube::launch", pid, "child process created");

        let raw = child.wait().await?;
        let elapsed = timer.elapsed();
        let outcome = classify(raw, &limits);

        debug!(
            target: "zencube::launch",
            pid,
            ?raw,
            outcome = %outcome,
            exit_code = outcome.exit_code(),
            elapsed_secs = elapsed.map(|d| d.as_secs_f64()),
            "child process terminated"
        );

        Ok(LaunchReport {
            pid,
            outcome,
            elapsed,
            limits,
            plan,
        })
    }

    /// Execute the launch synchronously.
    ///
    /// Drives the wait on a fresh current-thread runtime. When called from
    /// inside a runtime, that runtime lives on a scoped helper thread since
    /// runtimes cannot nest.
    pub fn run_sync(self) -> Result<LaunchReport, Error> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return std::thread::scope(|s| s.spawn(|| block_on_fresh(self)).join())
                .unwrap_or_else(|_| {
                    Err(LaunchError::Runtime {
                        reason: "launch thread panicked".to_string(),
                    }
                    .into())
                });
        }
        block_on_fresh(self)
    }

    /// Get the request.
    pub fn request(&self) -> &LaunchRequest {
        &self.request
    }

    /// Get the limits.
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Get the translated limits.
    pub fn plan(&self) -> &LimitPlan {
        &self.plan
    }
}

fn block_on_fresh(launch: PreparedLaunch) -> Result<LaunchReport, Error> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| LaunchError::Runtime {
            reason: format!("failed to create runtime: {e}"),
        })?;
    rt.block_on(launch.run())
}
