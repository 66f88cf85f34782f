//! zencube CLI - run a command under resource limits

use clap::error::ErrorKind;
use clap::Parser;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use zencube::{
    LaunchRequest, LimitStatus, PreparedLaunch, ResourceLimits, Sandbox, FAILURE_EXIT_CODE,
};

#[cfg(unix)]
const PLATFORM_NOTES: &str = "\
Platform Notes:
  Unix/Linux/macOS: POSIX resource limits (setrlimit) applied before exec.
  Resource limit signals:
    SIGXCPU - CPU time limit exceeded
    SIGKILL - CPU limit when the CPU ceiling was used up (hard limit),
              otherwise a memory limit kill when --mem is set (a guess)
    SIGXFSZ - File size limit exceeded

Examples:
  zencube /bin/echo Hello
  zencube --cpu=5 /bin/sleep 10
  zencube --mem=256 --cpu=10 ./memory_test";

#[cfg(windows)]
const PLATFORM_NOTES: &str = "\
Platform Notes:
  Windows: CPU and memory limits are enforced through a job object.
  --procs and --fsize are accepted but not enforced.

Examples:
  zencube cmd /c dir
  zencube --cpu=5 ping -n 30 127.0.0.1";

#[derive(Parser, Debug)]
#[command(name = "zencube")]
#[command(author, version, about = "Execute a command as a child process with enforced resource limits")]
#[command(after_help = PLATFORM_NOTES)]
struct Cli {
    /// Limit CPU time in seconds (0 = unlimited)
    #[arg(long = "cpu", value_name = "SECONDS", default_value_t = 0, allow_negative_numbers = true)]
    cpu: i64,

    /// Limit memory in megabytes (0 = unlimited)
    #[arg(long = "mem", value_name = "MB", default_value_t = 0, allow_negative_numbers = true)]
    mem: i64,

    /// Limit number of processes (0 = unlimited)
    #[arg(long = "procs", value_name = "COUNT", default_value_t = 0, allow_negative_numbers = true)]
    procs: i64,

    /// Limit file size in megabytes (0 = unlimited)
    #[arg(long = "fsize", value_name = "MB", default_value_t = 0, allow_negative_numbers = true)]
    fsize: i64,

    /// Command to run, followed by its arguments (passed verbatim)
    #[arg(
        value_name = "COMMAND",
        required = true,
        num_args = 1..,
        trailing_var_arg = true
    )]
    command: Vec<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("zencube=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}

/// Render the active limits. Weakened and skipped limits were already
/// reported as warnings during translation.
fn render_limits(prepared: &PreparedLaunch) {
    let plan = prepared.plan();
    if plan.is_empty() {
        info!("No resource limits applied (unlimited)");
        return;
    }

    for entry in plan.entries() {
        if entry.status == LimitStatus::Applied {
            info!("{} limit set to {} {}", entry.kind, entry.requested, entry.kind.unit());
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return exit_code(FAILURE_EXIT_CODE);
        }
    };

    init_tracing();

    let limits = match ResourceLimits::try_from_signed(cli.cpu, cli.mem, cli.procs, cli.fsize) {
        Ok(limits) => limits,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code(FAILURE_EXIT_CODE);
        }
    };

    let request = match LaunchRequest::from_argv(cli.command) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code(FAILURE_EXIT_CODE);
        }
    };

    info!("Starting command: {}", request.display_command());

    let prepared = match Sandbox::new(limits).prepare(request) {
        Ok(prepared) => prepared,
        Err(e) => {
            error!("{e}");
            return exit_code(FAILURE_EXIT_CODE);
        }
    };

    render_limits(&prepared);

    let report = match prepared.run().await {
        Ok(report) => report,
        Err(e) => {
            error!("{e}");
            return exit_code(FAILURE_EXIT_CODE);
        }
    };

    if report.outcome.is_limit_violation() {
        warn!("Process {}", report.describe());
    } else {
        info!("Process {}", report.describe());
    }
    info!("Execution time: {}", report.elapsed_display());

    exit_code(report.exit_code())
}

/// `ExitCode` carries 8 bits, matching what a Unix parent can observe.
fn exit_code(code: i32) -> ExitCode {
    ExitCode::from((code & 0xff) as u8)
}
