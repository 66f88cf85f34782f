//! # zencube
//!
//! Run a command under resource ceilings and report how it ended.
//!
//! `zencube` launches one external command as a child process with CPU time,
//! memory, process count and file size ceilings in place before the command's
//! own code runs, waits for it, and classifies how it terminated.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zencube::{LaunchRequest, Sandbox, TerminationOutcome};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Define the limits
//! let sandbox = Sandbox::builder()
//!     .cpu_seconds(5)
//!     .memory_mb(256)
//!     .build();
//!
//! // Validate the request and translate the limits
//! let prepared = sandbox.prepare(LaunchRequest::new("/bin/echo", ["hello"]))?;
//! for warning in prepared.plan().warnings() {
//!     eprintln!("{} limit not fully enforced: {:?}", warning.kind, warning.status);
//! }
//!
//! // Run and classify
//! let report = prepared.run().await?;
//! match report.outcome {
//!     TerminationOutcome::Exited(code) => println!("exited with {code}"),
//!     other => println!("{}", other.describe(&report.limits)),
//! }
//! std::process::exit(report.exit_code());
//! # }
//! ```
//!
//! ## Design Principles
//!
//! - **Limits before code**: ceilings are attached before the target program
//!   starts (pre-exec hook on Unix, job object on Windows)
//! - **Verbatim argv**: no shell, no expansion, no quoting
//! - **Outcomes are data**: a limit kill is a [`TerminationOutcome`], not an error
//! - **Availability over strictness**: memory and process-count ceilings that
//!   cannot be enforced are warnings; CPU and file-size ceilings are required
//! - **No formatting in the core**: structured `tracing` events and a
//!   [`LaunchReport`] let the caller render its own output
//!
//! ## Platform Support
//!
//! | Limit | Unix | Windows |
//! |-------|------|---------|
//! | CPU time | `RLIMIT_CPU` (`SIGXCPU`) | job user-time limit |
//! | Memory | `RLIMIT_AS` (weak on macOS) | job per-process memory |
//! | Process count | `RLIMIT_NPROC` (per user) | not enforced, warned |
//! | File size | `RLIMIT_FSIZE` (`SIGXFSZ`) | not enforced, warned |

#[cfg(not(any(unix, windows)))]
compile_error!("zencube supports Unix and Windows hosts only.");

mod error;
mod launcher;
mod limits;
mod outcome;
mod prepared;
mod report;
mod request;
#[cfg(unix)]
mod rlimit;
mod sandbox;
mod timer;
mod translate;

// Public API
pub use error::{ConfigError, Error, LaunchError, LimitKind};
pub use launcher::{LaunchedChild, NativeLauncher, PlatformLauncher};
#[cfg(unix)]
pub use launcher::{ForkExecChild, ForkExecLauncher};
#[cfg(windows)]
pub use launcher::{JobObjectChild, JobObjectLauncher};
pub use limits::ResourceLimits;
pub use outcome::{classify, signal_name, RawTermination, TerminationOutcome, FAILURE_EXIT_CODE};
pub use prepared::PreparedLaunch;
pub use report::LaunchReport;
pub use request::LaunchRequest;
pub use sandbox::{Sandbox, SandboxBuilder};
pub use timer::{format_elapsed, Timer};
pub use translate::{translate_limits, LimitEntry, LimitPlan, LimitStatus};
