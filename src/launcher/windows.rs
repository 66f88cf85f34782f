//! Job-object backend.
//!
//! Windows has no fork, so limits live on a job object the process is
//! assigned to. Only CPU time and memory are enforced this way; the
//! translator has already marked process-count and file-size ceilings as
//! skipped.
//!
//! When a job is needed the process is created suspended, assigned, and only
//! then resumed, so none of its code runs outside the job.

use super::{LaunchedChild, PlatformLauncher};
use crate::error::{LaunchError, LimitKind};
use crate::outcome::RawTermination;
use crate::request::LaunchRequest;
use crate::translate::LimitPlan;
use std::ffi::c_void;
use std::io;
use std::mem;
use std::process::Stdio;
use std::ptr;
use tokio::process::{Child, Command};
use windows_sys::Win32::Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE};
use windows_sys::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Thread32First, Thread32Next, TH32CS_SNAPTHREAD, THREADENTRY32,
};
use windows_sys::Win32::System::JobObjects::{
    AssignProcessToJobObject, CreateJobObjectW, JobObjectBasicAccountingInformation,
    JobObjectExtendedLimitInformation, QueryInformationJobObject, SetInformationJobObject,
    JOBOBJECT_BASIC_ACCOUNTING_INFORMATION, JOBOBJECT_EXTENDED_LIMIT_INFORMATION,
    JOB_OBJECT_LIMIT_JOB_TIME, JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
    JOB_OBJECT_LIMIT_PROCESS_MEMORY,
};
use windows_sys::Win32::System::Threading::{
    OpenThread, ResumeThread, CREATE_SUSPENDED, THREAD_SUSPEND_RESUME,
};

/// Owned job object handle, closed on drop.
///
/// The job kills whatever is still assigned to it when the handle closes.
#[derive(Debug)]
struct JobObject {
    handle: HANDLE,
}

// SAFETY: a job handle is a kernel object reference, usable from any thread.
unsafe impl Send for JobObject {}

impl JobObject {
    fn create() -> io::Result<Self> {
        // SAFETY: null security attributes and an anonymous name are allowed.
        let handle = unsafe { CreateJobObjectW(ptr::null(), ptr::null()) };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { handle })
    }

    fn set_limits(&self, cpu_ticks: Option<u64>, memory_bytes: Option<u64>) -> io::Result<()> {
        // SAFETY: the all-zero bit pattern is a valid value of this plain C struct.
        let mut info: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = unsafe { mem::zeroed() };
        let basic = &mut info.BasicLimitInformation;
        basic.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;

        if let Some(ticks) = cpu_ticks {
            basic.LimitFlags |= JOB_OBJECT_LIMIT_JOB_TIME;
            basic.PerJobUserTimeLimit = i64::try_from(ticks).unwrap_or(i64::MAX);
        }

        if let Some(bytes) = memory_bytes {
            basic.LimitFlags |= JOB_OBJECT_LIMIT_PROCESS_MEMORY;
            info.ProcessMemoryLimit = usize::try_from(bytes).unwrap_or(usize::MAX);
        }

        // SAFETY: info is a live JOBOBJECT_EXTENDED_LIMIT_INFORMATION and the
        // length passed is its exact size.
        let ok = unsafe {
            SetInformationJobObject(
                self.handle,
                JobObjectExtendedLimitInformation,
                ptr::addr_of!(info).cast::<c_void>(),
                mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn assign(&self, process: HANDLE) -> io::Result<()> {
        // SAFETY: both handles are open for the duration of the call.
        if unsafe { AssignProcessToJobObject(self.handle, process) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// User-mode CPU time charged to the job, in 100 ns ticks.
    fn user_time_ticks(&self) -> io::Result<u64> {
        // SAFETY: the all-zero bit pattern is a valid value of this plain C struct.
        let mut info: JOBOBJECT_BASIC_ACCOUNTING_INFORMATION = unsafe { mem::zeroed() };
        // SAFETY: info is writable and the length passed is its exact size.
        let ok = unsafe {
            QueryInformationJobObject(
                self.handle,
                JobObjectBasicAccountingInformation,
                ptr::addr_of_mut!(info).cast::<c_void>(),
                mem::size_of::<JOBOBJECT_BASIC_ACCOUNTING_INFORMATION>() as u32,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(u64::try_from(info.TotalUserTime).unwrap_or(0))
    }
}

impl Drop for JobObject {
    fn drop(&mut self) {
        // SAFETY: handle came from CreateJobObjectW and is closed exactly once.
        unsafe {
            CloseHandle(self.handle);
        }
    }
}

/// Owned kernel handle, closed on drop.
struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        // SAFETY: the handle is open and closed exactly once.
        unsafe {
            CloseHandle(self.0);
        }
    }
}

/// Resume every thread of a process created with `CREATE_SUSPENDED`.
///
/// A freshly created suspended process has exactly one thread; it is found
/// through a thread snapshot since the process API only hands back the
/// process handle.
fn resume_process(pid: u32) -> io::Result<()> {
    // SAFETY: flags and process id are plain values.
    let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0) };
    if snapshot == INVALID_HANDLE_VALUE {
        return Err(io::Error::last_os_error());
    }
    let snapshot = OwnedHandle(snapshot);

    // SAFETY: the all-zero bit pattern is a valid value of this plain C struct.
    let mut entry: THREADENTRY32 = unsafe { mem::zeroed() };
    entry.dwSize = mem::size_of::<THREADENTRY32>() as u32;

    let mut resumed = 0usize;
    // SAFETY: snapshot is open and entry is writable with dwSize set.
    let mut more = unsafe { Thread32First(snapshot.0, &mut entry) } != 0;
    while more {
        if entry.th32OwnerProcessID == pid {
            // SAFETY: the thread id comes from the snapshot.
            let thread = unsafe { OpenThread(THREAD_SUSPEND_RESUME, 0, entry.th32ThreadID) };
            if thread.is_null() {
                return Err(io::Error::last_os_error());
            }
            let thread = OwnedHandle(thread);
            // SAFETY: thread is open with THREAD_SUSPEND_RESUME access.
            if unsafe { ResumeThread(thread.0) } == u32::MAX {
                return Err(io::Error::last_os_error());
            }
            resumed += 1;
        }
        // SAFETY: as for Thread32First.
        more = unsafe { Thread32Next(snapshot.0, &mut entry) } != 0;
    }

    if resumed == 0 {
        return Err(io::Error::other(format!("no thread found for process {pid}")));
    }
    Ok(())
}

/// Terminate a child that never made it into its job and report why.
///
/// The child was created suspended, so it has not run any code.
fn abandon(mut child: Child, stage: &'static str, source: io::Error) -> LaunchError {
    let pid = child.id();
    match child.start_kill() {
        Ok(()) => LaunchError::JobObject { stage, source },
        Err(kill) => LaunchError::KillFailed {
            pid,
            cause: Box::new(LaunchError::JobObject { stage, source }),
            source: kill,
        },
    }
}

/// Exit code of a job-owned child, lowered with its CPU accounting.
fn lower_job_status(code: Option<i32>, cpu_exhausted: bool) -> RawTermination {
    match code {
        Some(code) => RawTermination::JobTerminated {
            code: code as u32,
            cpu_exhausted,
        },
        None => RawTermination::Unknown(-1),
    }
}

/// Launches with `CreateProcess` and enforces limits through a job object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobObjectLauncher;

/// A child started by [`JobObjectLauncher`].
#[derive(Debug)]
pub struct JobObjectChild {
    child: Child,
    job: Option<JobObject>,
    cpu_ticks: Option<u64>,
}

fn enforced_native(plan: &LimitPlan, kind: LimitKind) -> Option<u64> {
    plan.get(kind)
        .filter(|entry| entry.is_enforced())
        .map(|entry| entry.native)
}

impl PlatformLauncher for JobObjectLauncher {
    type Child = JobObjectChild;

    const NAME: &'static str = "job-object";

    fn spawn(&self, request: &LaunchRequest, plan: &LimitPlan) -> Result<JobObjectChild, LaunchError> {
        let cpu_ticks = enforced_native(plan, LimitKind::Cpu);
        let memory_bytes = enforced_native(plan, LimitKind::Memory);

        let job = if cpu_ticks.is_some() || memory_bytes.is_some() {
            let job = JobObject::create().map_err(|source| LaunchError::JobObject {
                stage: "creation",
                source,
            })?;
            job.set_limits(cpu_ticks, memory_bytes)
                .map_err(|source| LaunchError::JobObject {
                    stage: "configuration",
                    source,
                })?;
            Some(job)
        } else {
            None
        };

        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if job.is_some() {
            cmd.creation_flags(CREATE_SUSPENDED);
        }

        let child = cmd.spawn().map_err(|source| LaunchError::SpawnFailed {
            program: request.program.display().to_string(),
            source,
        })?;

        if let Some(job) = &job {
            let assigned = child
                .raw_handle()
                .ok_or_else(|| io::Error::other("process handle already released"))
                .and_then(|process| job.assign(process));
            if let Err(source) = assigned {
                return Err(abandon(child, "assignment", source));
            }

            let resumed = child
                .id()
                .ok_or_else(|| io::Error::other("process already reaped"))
                .and_then(resume_process);
            if let Err(source) = resumed {
                return Err(abandon(child, "resume", source));
            }
        }

        Ok(JobObjectChild {
            child,
            job,
            cpu_ticks,
        })
    }
}

impl LaunchedChild for JobObjectChild {
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

        let Some(job) = &self.job else {
            return Ok(status
                .code()
                .map_or(RawTermination::Unknown(-1), RawTermination::Exited));
        };

        let cpu_exhausted = match self.cpu_ticks {
            Some(limit) => job.user_time_ticks().map_or(false, |used| used >= limit),
            None => false,
        };

        Ok(lower_job_status(status.code(), cpu_exhausted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ResourceLimits;
    use crate::translate::translate_limits;

    #[test]
    fn test_missing_code_is_unknown() {
        assert_eq!(lower_job_status(None, false), RawTermination::Unknown(-1));
        assert_eq!(lower_job_status(None, true), RawTermination::Unknown(-1));
        assert_eq!(
            lower_job_status(Some(3), false),
            RawTermination::JobTerminated {
                code: 3,
                cpu_exhausted: false
            }
        );
    }

    #[tokio::test]
    async fn test_suspended_child_runs_after_assignment() {
        let limits = ResourceLimits::default()
            .with_cpu_seconds(30)
            .with_memory_mb(256);
        let plan = translate_limits(&limits).unwrap();
        let request = LaunchRequest::new("cmd", ["/C", "exit 3"]);

        let child = JobObjectLauncher.spawn(&request, &plan).unwrap();
        assert!(child.job.is_some());

        let raw = child.wait().await.unwrap();
        assert_eq!(
            raw,
            RawTermination::JobTerminated {
                code: 3,
                cpu_exhausted: false
            }
        );
    }

    #[tokio::test]
    async fn test_no_job_without_enforced_limits() {
        let limits = ResourceLimits::default().with_max_processes(4);
        let plan = translate_limits(&limits).unwrap();
        let request = LaunchRequest::new("cmd", ["/C", "exit 0"]);

        let child = JobObjectLauncher.spawn(&request, &plan).unwrap();
        assert!(child.job.is_none());
        assert_eq!(child.wait().await.unwrap(), RawTermination::Exited(0));
    }
}
