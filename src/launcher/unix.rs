//! Fork-then-exec backend.

use super::{LaunchedChild, PlatformLauncher};
use crate::error::{LaunchError, LimitKind};
use crate::outcome::RawTermination;
use crate::request::LaunchRequest;
use crate::rlimit::{self, HardCeiling, Resource};
use crate::translate::LimitPlan;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Launches through `fork()` + `execvp()`, applying rlimits in between.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForkExecLauncher;

/// A child started by [`ForkExecLauncher`].
#[derive(Debug)]
pub struct ForkExecChild {
    child: Child,
    /// CPU time of already reaped children when this one was spawned.
    cpu_baseline: Option<Duration>,
}

/// An rlimit resolved in the parent, so the child only has to call setrlimit.
#[derive(Debug, Clone, Copy)]
struct NativeRlimit {
    resource: Resource,
    soft: libc::rlim_t,
    hard: libc::rlim_t,
    fatal: bool,
}

fn native_rlimits(plan: &LimitPlan) -> [Option<NativeRlimit>; 4] {
    let mut out = [None; 4];
    let resolved = plan.enforced().filter_map(|entry| {
        let resource = rlimit::resource_for(entry.kind)?;
        let hard = if entry.kind == LimitKind::Cpu {
            rlimit::cpu_hard_value(entry.native, HardCeiling::current(resource))
        } else {
            rlimit::native(entry.native)
        };
        Some(NativeRlimit {
            resource,
            soft: rlimit::native(entry.native),
            hard,
            fatal: entry.kind.is_fatal_on_failure(),
        })
    });
    for (slot, limit) in out.iter_mut().zip(resolved) {
        *slot = Some(limit);
    }
    out
}

/// Runs in the forked child. CPU and file-size failures abort the exec;
/// memory and process-count failures are dropped since nothing can be
/// reported from here. A hard value above the soft one is retried as equal
/// before giving up.
fn apply_in_child(rlimits: &[Option<NativeRlimit>]) -> io::Result<()> {
    for limit in rlimits.iter().flatten() {
        let mut result = rlimit::set_rlimit(limit.resource, limit.soft, limit.hard);
        if result.is_err() && limit.hard != limit.soft {
            result = rlimit::set_rlimit(limit.resource, limit.soft, limit.soft);
        }
        if let Err(e) = result {
            if limit.fatal {
                return Err(e);
            }
        }
    }
    Ok(())
}

impl PlatformLauncher for ForkExecLauncher {
    type Child = ForkExecChild;

    const NAME: &'static str = "fork-exec";

    fn spawn(&self, request: &LaunchRequest, plan: &LimitPlan) -> Result<ForkExecChild, LaunchError> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let rlimits = native_rlimits(plan);
        if rlimits.iter().any(Option::is_some) {
            // SAFETY: pre_exec runs between fork() and execve() in the child.
            // The closure only calls setrlimit, which is async-signal-safe, on
            // Copy data moved into it; nothing is allocated or locked.
            unsafe {
                cmd.pre_exec(move || apply_in_child(&rlimits));
            }
        }

        let cpu_baseline = rlimit::children_cpu_time();

        // A failed exec or pre-exec hook makes the child exit immediately; the
        // error comes back here and the child is reaped by the standard library.
        let child = cmd.spawn().map_err(|source| LaunchError::SpawnFailed {
            program: request.program.display().to_string(),
            source,
        })?;

        Ok(ForkExecChild {
            child,
            cpu_baseline,
        })
    }
}

impl ForkExecChild {
    /// CPU time charged to this child after it was reaped.
    ///
    /// Measured as the growth of this process's reaped-children usage, so
    /// children reaped concurrently by other tasks are counted too.
    fn cpu_used(&self) -> Option<Duration> {
        let after = rlimit::children_cpu_time()?;
        after.checked_sub(self.cpu_baseline?)
    }
}

impl LaunchedChild for ForkExecChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(mut self) -> Result<RawTermination, LaunchError> {
        let pid = self.child.id();
        let status = self
            .child
            .wait()
            .await
            .map_err(|source| LaunchError::WaitFailed { pid, source })?;

        let raw = match RawTermination::from(status) {
            RawTermination::Signaled {
                signal,
                core_dumped,
                ..
            } => RawTermination::Signaled {
                signal,
                core_dumped,
                cpu_time: self.cpu_used(),
            },
            other => other,
        };
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ResourceLimits;
    use crate::translate::translate_limits;

    #[test]
    fn test_apply_in_child_nothing_to_do() {
        assert!(apply_in_child(&[None, None, None, None]).is_ok());
    }

    #[test]
    fn test_native_rlimits_empty_plan() {
        let rlimits = native_rlimits(&LimitPlan::default());
        assert!(rlimits.iter().all(Option::is_none));
    }

    #[test]
    fn test_native_rlimits_carry_fatality() {
        let limits = ResourceLimits::default()
            .with_cpu_seconds(5)
            .with_memory_mb(128);
        let plan = translate_limits(&limits).unwrap();
        let rlimits: Vec<_> = native_rlimits(&plan).into_iter().flatten().collect();

        let cpu = rlimits
            .iter()
            .find(|l| Some(l.resource) == rlimit::resource_for(LimitKind::Cpu))
            .unwrap();
        assert_eq!(cpu.soft, 5);
        assert!(cpu.hard == 5 || cpu.hard == 6, "{}", cpu.hard);
        assert!(cpu.fatal);

        if let Some(mem) = rlimits
            .iter()
            .find(|l| Some(l.resource) == rlimit::resource_for(LimitKind::Memory))
        {
            assert_eq!(mem.soft, 128 * 1024 * 1024);
            assert_eq!(mem.hard, mem.soft);
            assert!(!mem.fatal);
        }
    }
}
