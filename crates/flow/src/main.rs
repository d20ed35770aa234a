//! # Driver
//!
//! Parses the CLI, attaches to or launches the target, wires the Exception
//! Port's pump to the Tracer Core, and runs the two-thread concurrency
//! model: this thread blocks in a `waitpid` loop on the target while a
//! dedicated thread blocks in the Exception Port's `pump`. See
//! `flow_core::tracer` and `flow_core::platform::macos::exception` for the
//! pieces this wires together.

use std::fs::File;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use flow_core::platform::macos::constants;
use flow_core::prelude::*;
use flow_utils::{init_logging, init_logging_file_only, init_logging_with_level, LogFormat, LogLevel, LoggingError};

/// Basic-block execution tracer for Mach/XNU targets.
#[derive(Parser, Debug)]
#[command(name = "flow", about = "Basic-block execution tracer for Mach/XNU targets.")]
struct Cli
{
    /// Attach to an existing pid instead of launching `program`.
    #[arg(short = 'a', long = "attach", conflicts_with = "cpu_type", value_name = "PID")]
    attach: Option<libc::pid_t>,

    /// Launch through the platform launcher instead of `posix_spawn` directly.
    #[arg(short = 's', long = "spawn-suspended")]
    spawn_suspended: bool,

    /// Restrict a fat binary to one architecture slice when launching.
    #[arg(short = 'c', long = "cpu-type", value_parser = ["i386", "x86_64"], value_name = "ARCH")]
    cpu_type: Option<String>,

    /// Trace log output path. Defaults to `Flow_<pid>.log`.
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    output: Option<PathBuf>,

    /// Logging verbosity (error, warn, info, debug, trace).
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Logging output format (pretty, json).
    #[arg(long = "log-format")]
    log_format: Option<String>,

    /// Program to launch, followed by its arguments.
    #[arg(trailing_var_arg = true)]
    program: Vec<String>,
}

/// Top-level driver error: wraps the two error types the CLI layer can hit
/// plus its own usage-validation failures.
#[derive(Debug, thiserror::Error)]
enum DriverError
{
    #[error(transparent)]
    Flow(#[from] flow_core::error::FlowError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error("{0}")]
    Usage(String),
}

fn main()
{
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("flow: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), DriverError>
{
    if cli.spawn_suspended {
        return Err(DriverError::Usage(
            "-s/--spawn-suspended selects the platform-launcher path, which is not yet implemented".to_string(),
        ));
    }

    if cli.attach.is_some() && !cli.program.is_empty() {
        return Err(DriverError::Usage("-a/--attach cannot be combined with a program to launch".to_string()));
    }
    if cli.attach.is_none() && cli.program.is_empty() {
        return Err(DriverError::Usage("expected either -a PID or a program to launch".to_string()));
    }

    let target = if let Some(pid) = cli.attach {
        Target::attach(ProcessId(pid as u32))?
    } else {
        let cpu_type_pref = match cli.cpu_type.as_deref() {
            Some("x86_64") => Some(constants::CPU_TYPE_X86_64),
            Some("i386") => Some(constants::CPU_TYPE_X86),
            Some(other) => return Err(DriverError::Usage(format!("unknown -c value: {other}"))),
            None => None,
        };
        let (program, args) = cli.program.split_first().expect("validated non-empty above");
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Target::spawn_suspended(program, &args, cpu_type_pref)?
    };

    let launching = cli.attach.is_none();
    let output_path = cli.output.unwrap_or_else(|| PathBuf::from(format!("Flow_{}.log", target.pid())));
    init_tracer_logging(&cli, launching, &output_path)?;

    tracing::info!(pid = %target.pid(), architecture = %target.architecture(), output = %output_path.display(), "starting trace");

    let result = trace(target, launching, &output_path);
    if let Err(ref err) = result {
        tracing::error!(%err, "trace run ended with an error");
    }
    result
}

/// Install the exception port, run the tracer to completion, and tear
/// everything back down.
///
/// `launching` distinguishes the two ways `target` can have arrived here:
/// spawned (already suspended by `posix_spawn`) or attached (still running,
/// so it needs its own suspend window while ptrace/the exception port are
/// installed).
fn trace(target: Target, launching: bool, output_path: &std::path::Path) -> Result<(), DriverError>
{
    let pid = u32::from(target.pid()) as libc::pid_t;
    let task_port = target.task_port();

    let suspend_guard = if launching { None } else { Some(target.suspend_guard()?) };

    target.ptrace_attach_exc()?;

    install_cancel_signal_handler().map_err(flow_core::error::FlowError::from)?;

    let exception_port = Arc::new(ExceptionPort::attach(task_port)?);

    match suspend_guard {
        Some(guard) => guard.resume()?,
        None => target.resume()?,
    }

    let writer = File::create(output_path).map_err(flow_core::error::FlowError::from)?;
    let mut tracer = Tracer::new(target, writer)?;

    let pump_port = Arc::clone(&exception_port);
    let (tid_tx, tid_rx) = std::sync::mpsc::channel();
    let pump_handle = std::thread::Builder::new()
        .name("flow-exception-pump".to_string())
        .spawn(move || {
            let _ = tid_tx.send(unsafe { libc::pthread_self() });
            let pump_result = pump_port.pump(|record: &ExceptionRecord| {
                if record.forwarded_signal().is_some() {
                    return ExceptionAction::Resume;
                }
                match tracer.on_exception(record.thread) {
                    Ok(()) => ExceptionAction::Resume,
                    Err(err) => {
                        tracing::error!(%err, "tracer step failed, aborting target");
                        ExceptionAction::Abort
                    }
                }
            });
            if let Err(err) = tracer.ptrace_detach() {
                tracing::warn!(%err, "ptrace detach failed");
            }
            pump_result
        })
        .map_err(flow_core::error::FlowError::IoFailure)?;

    let pump_thread = tid_rx.recv().ok();

    wait_for_target(pid);

    if let Some(pump_thread) = pump_thread {
        unsafe {
            libc::pthread_kill(pump_thread, libc::SIGUSR1);
        }
    }

    match pump_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(%err, "exception pump returned an error"),
        Err(_) => tracing::warn!("exception pump thread panicked"),
    }

    match Arc::try_unwrap(exception_port) {
        Ok(port) => {
            if let Err(err) = port.detach() {
                tracing::warn!(%err, "failed to fully restore prior exception ports");
            }
        }
        Err(_) => tracing::warn!("exception port still shared at teardown, skipping detach"),
    }

    Ok(())
}

/// Block until the target process exits, draining wait-status changes in
/// between. Stops (delivered via the Exception Port, not this loop) show up
/// here as `WIFSTOPPED` and are simply waited past again.
fn wait_for_target(pid: libc::pid_t)
{
    loop {
        let mut status: libc::c_int = 0;
        let result = unsafe { libc::waitpid(pid, &mut status, 0) };
        if result == -1 {
            let err = std::io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::ECHILD) => return,
                Some(libc::EINTR) => continue,
                _ => {
                    tracing::warn!(%err, "waitpid failed");
                    return;
                }
            }
        }

        if libc::WIFEXITED(status) || libc::WIFSIGNALED(status) {
            tracing::info!(pid, status, "target process ended");
            return;
        }
    }
}

extern "C" fn noop_signal_handler(_: libc::c_int) {}

/// Install a real (non-`SIG_IGN`) handler for `SIGUSR1` so delivering it to
/// the blocked pump thread interrupts `mach_msg` with `MACH_RCV_INTERRUPTED`
/// instead of being silently swallowed.
fn install_cancel_signal_handler() -> std::io::Result<()>
{
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = noop_signal_handler as usize;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGUSR1, &action, std::ptr::null_mut()) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

fn init_tracer_logging(cli: &Cli, launching: bool, output_path: &std::path::Path) -> Result<(), LoggingError>
{
    let level = cli.log_level.as_deref().map(|s| LogLevel::from_str(s).unwrap_or(LogLevel::Info));
    let format = cli.log_format.as_deref().map(|s| LogFormat::from_str(s).unwrap_or(LogFormat::Pretty));

    if launching {
        let mut log_path = output_path.to_path_buf();
        log_path.set_extension("driver.log");
        init_logging_file_only(log_path, level)
    } else if level.is_some() || format.is_some() {
        init_logging_with_level(level.unwrap_or(LogLevel::Info), format.unwrap_or(LogFormat::Pretty))
    } else {
        init_logging()
    }
}
