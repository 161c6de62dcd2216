//! Process spawning with full output capture.
//!
//! Provides:
//! - async [`capture`] for callers already inside a tokio runtime
//! - a blocking [`run_on_worker`] that runs the same work on a dedicated
//!   thread with its own runtime
//! - a single fallback substitution when the program cannot be found

use std::io;
use std::path::Path;
use std::process::ExitStatus;
use std::thread;

use tokio::process::Child;
use tracing::{debug, info, warn};

use super::drain::{Captured, Stream, StreamMultiplexer};
use crate::command::{piped_command, CommandSpec};
use crate::error::{CmdError, Result};

/// Exit code the fallback reports, the shell's "command not found".
pub const NOT_FOUND_EXIT_CODE: i32 = 127;

const WORKER_THREAD_NAME: &str = "test-cmd-worker";

/// Result from a completed process.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// Process id of the child that actually ran.
    pub pid: u32,

    /// Exit status of the process.
    pub status: ExitStatus,

    /// Everything written to stdout and stderr.
    pub output: Captured,

    /// Whether the requested program could not be found and the fallback
    /// ran in its place.
    pub not_found: bool,
}

impl ProcessResult {
    /// Check if the process exited successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// The exit code, or `-1` when the process was killed by a signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }
}

/// The deterministic stand-in used when a program cannot be found.
pub fn fallback_command() -> (&'static str, [&'static str; 2]) {
    if cfg!(windows) {
        ("cmd", ["/C", "exit 127"])
    } else {
        ("sh", ["-c", "exit 127"])
    }
}

/// Spawn the command, capture both streams and wait for it to exit.
///
/// A missing program is not an error: the fallback command runs instead,
/// the lookup failure is written to the captured stderr and
/// [`ProcessResult::not_found`] is set. Every other spawn failure,
/// including a working directory that does not exist, is returned as
/// [`CmdError::Spawn`].
///
/// # Example
///
/// ```rust,no_run
/// use test_cmd::process::capture;
/// use test_cmd::CommandSpec;
///
/// #[tokio::main]
/// async fn main() -> test_cmd::Result<()> {
///     let result = capture(&CommandSpec::new("ls").arg("-la")).await?;
///
///     println!("Exit code: {}", result.code());
///     println!("Output:\n{}", String::from_utf8_lossy(&result.output.stdout));
///     Ok(())
/// }
/// ```
pub async fn capture(spec: &CommandSpec) -> Result<ProcessResult> {
    debug!(program = %spec.program, args = ?spec.args, "spawning process");

    // A missing cwd also fails the spawn with ENOENT; it must not be
    // mistaken for a missing program.
    if let Some(ref dir) = spec.working_dir {
        check_working_dir(dir)
            .await
            .map_err(|source| CmdError::spawn(&spec.program, source))?;
    }

    let (child, seed, not_found) = match spec.to_command().spawn() {
        Ok(child) => (child, Captured::default(), false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(
                program = %spec.program,
                error = %e,
                "program not found; running fallback command"
            );
            let (program, args) = fallback_command();
            let child = piped_command(program, &args[..])
                .spawn()
                .map_err(|source| CmdError::spawn(program, source))?;
            let seed = Captured {
                stdout: Vec::new(),
                stderr: format!("{}: {e}\n", spec.program).into_bytes(),
            };
            (child, seed, true)
        }
        Err(e) => return Err(CmdError::spawn(&spec.program, e)),
    };

    let result = wait_and_drain(child, seed, not_found, spec.buffer_size).await?;

    info!(
        program = %spec.program,
        pid = result.pid,
        exit_code = result.code(),
        success = result.success(),
        not_found = result.not_found,
        "process exited"
    );

    Ok(result)
}

async fn check_working_dir(dir: &Path) -> io::Result<()> {
    let meta = tokio::fs::metadata(dir).await.map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("working directory {}: {e}", dir.display()),
        )
    })?;
    if meta.is_dir() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("working directory {} is not a directory", dir.display()),
        ))
    }
}

/// Drain the child's streams while waiting for it to exit.
async fn wait_and_drain(
    mut child: Child,
    seed: Captured,
    not_found: bool,
    buffer_size: usize,
) -> Result<ProcessResult> {
    // Only `None` once the child has been reaped, which cannot have happened yet
    let pid = child.id().unwrap_or_default();

    let mut mux = StreamMultiplexer::new(buffer_size);
    if let Some(stdout) = child.stdout.take() {
        mux.attach(Stream::Stdout, stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        mux.attach(Stream::Stderr, stderr);
    }

    // Streams may outlive the child (detached grandchildren keep the pipes
    // open), so the drain finishes on EOF, not on exit.
    let (status, output) = tokio::join!(child.wait(), mux.drain(seed));
    let status = status.map_err(|source| CmdError::wait(pid, source))?;

    Ok(ProcessResult {
        pid,
        status,
        output,
        not_found,
    })
}

/// Run [`capture`] to completion on a dedicated worker thread and block the
/// calling thread until it finishes.
///
/// The worker owns a current-thread runtime, so this is safe to call from
/// inside another runtime.
pub fn run_on_worker(spec: CommandSpec) -> Result<ProcessResult> {
    let program = spec.program.clone();

    let handle = thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(CmdError::runtime)?;
            runtime.block_on(capture(&spec))
        })
        .map_err(CmdError::worker)?;

    handle
        .join()
        .map_err(|_| CmdError::WorkerPanicked { program })?
}
