//! The lazily-spawned command handle.
//!
//! A [`Cmd`] does nothing until one of its result accessors is called. The
//! first accessor spawns the program on a worker thread and blocks until the
//! run is over; the outcome is memoized and every later call reads it back
//! without spawning again.

mod callbacks;

use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use tracing::debug;

use crate::command::CommandSpec;
use crate::error::{CmdError, Result};
use crate::process::{run_on_worker, ProcessResult, Stream};
use crate::report::Report;

/// Lifecycle of a [`Cmd`]. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    NotStarted,
    Running,
    Completed,
}

/// A command whose output is captured on first use.
///
/// The run is over once the child has exited *and* both of its output
/// streams are closed. A child that leaves a background process holding its
/// stdout or stderr (a daemon, `sleep 60 &`) keeps every accessor blocked
/// until that process exits or closes them; redirect such processes away
/// from the inherited streams (`> /dev/null 2>&1`) when starting them.
///
/// # Example
///
/// ```rust,no_run
/// use test_cmd::cmd;
///
/// fn main() -> test_cmd::Result<()> {
///     let ls = cmd("ls", ["-la"]);
///
///     assert!(ls.success()?);
///     println!("{}", ls.stdout_string()?);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Cmd {
    spec: CommandSpec,
    started: AtomicBool,
    outcome: OnceLock<Result<ProcessResult>>,
}

impl Cmd {
    /// Create a handle for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self::from_spec(CommandSpec::new(program))
    }

    /// Create a handle from a prepared spec.
    pub const fn from_spec(spec: CommandSpec) -> Self {
        Self {
            spec,
            started: AtomicBool::new(false),
            outcome: OnceLock::new(),
        }
    }

    /// The command this handle runs.
    pub const fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Current lifecycle stage. Never triggers a spawn.
    pub fn state(&self) -> ExecutionState {
        if self.outcome.get().is_some() {
            ExecutionState::Completed
        } else if self.started.load(Ordering::Acquire) {
            ExecutionState::Running
        } else {
            ExecutionState::NotStarted
        }
    }

    // === Builder ===
    //
    // Every builder method fails with `AlreadySpawned` once a result has
    // been asked for; the spawned process keeps the spec it started with.

    /// Append an argument.
    ///
    /// # Errors
    ///
    /// [`CmdError::AlreadySpawned`] once the command has been spawned.
    pub fn arg(self, arg: impl Into<String>) -> Result<Self> {
        self.edit(|spec| spec.arg(arg))
    }

    /// Append several arguments, in order.
    ///
    /// # Errors
    ///
    /// [`CmdError::AlreadySpawned`] once the command has been spawned.
    pub fn args<I, S>(self, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edit(|spec| spec.args(args))
    }

    /// Run the program in `dir`. A `dir` that does not exist makes the run
    /// fail with [`CmdError::Spawn`].
    ///
    /// # Errors
    ///
    /// [`CmdError::AlreadySpawned`] once the command has been spawned.
    pub fn working_dir(self, dir: impl Into<std::path::PathBuf>) -> Result<Self> {
        self.edit(|spec| spec.working_dir(dir))
    }

    /// Set an environment variable for the program.
    ///
    /// # Errors
    ///
    /// [`CmdError::AlreadySpawned`] once the command has been spawned.
    pub fn env(self, key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        self.edit(|spec| spec.env(key, value))
    }

    /// Set several environment variables for the program.
    ///
    /// # Errors
    ///
    /// [`CmdError::AlreadySpawned`] once the command has been spawned.
    pub fn envs<I, K, V>(self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.edit(|spec| spec.envs(vars))
    }

    /// Remove an environment variable for the program.
    ///
    /// # Errors
    ///
    /// [`CmdError::AlreadySpawned`] once the command has been spawned.
    pub fn env_remove(self, key: impl Into<String>) -> Result<Self> {
        self.edit(|spec| spec.env_remove(key))
    }

    /// Start the program with an empty environment.
    ///
    /// # Errors
    ///
    /// [`CmdError::AlreadySpawned`] once the command has been spawned.
    pub fn env_clear(self) -> Result<Self> {
        self.edit(CommandSpec::env_clear)
    }

    /// Capacity of the channel between the stream readers and the
    /// collector.
    ///
    /// # Errors
    ///
    /// [`CmdError::AlreadySpawned`] once the command has been spawned.
    pub fn buffer_size(self, size: usize) -> Result<Self> {
        self.edit(|spec| spec.buffer_size(size))
    }

    fn edit(mut self, f: impl FnOnce(CommandSpec) -> CommandSpec) -> Result<Self> {
        if *self.started.get_mut() {
            return Err(CmdError::AlreadySpawned {
                program: self.spec.program,
            });
        }
        self.spec = f(self.spec);
        Ok(self)
    }

    // === Results ===
    //
    // Every accessor returns the memoized fatal error, if the run had one,
    // instead of a value.

    /// Wait for the run and return its full result.
    ///
    /// Every other accessor goes through here.
    ///
    /// # Errors
    ///
    /// A fatal failure (the program exists but could not be started, the
    /// working directory is missing, the wait failed, the worker died). It
    /// is memoized like a normal result and returned on every call.
    pub fn result(&self) -> Result<&ProcessResult> {
        self.outcome
            .get_or_init(|| self.start())
            .as_ref()
            .map_err(Clone::clone)
    }

    fn start(&self) -> Result<ProcessResult> {
        self.started.store(true, Ordering::Release);
        debug!(program = %self.spec.program, "starting command");
        run_on_worker(self.spec.clone())
    }

    /// Everything the program wrote to stdout.
    ///
    /// # Errors
    ///
    /// The fatal run error, see [`Cmd::result`].
    pub fn stdout(&self) -> Result<&[u8]> {
        Ok(&self.result()?.output.stdout)
    }

    /// Everything the program wrote to stderr.
    ///
    /// # Errors
    ///
    /// The fatal run error, see [`Cmd::result`].
    pub fn stderr(&self) -> Result<&[u8]> {
        Ok(&self.result()?.output.stderr)
    }

    /// Stdout decoded as UTF-8, with invalid sequences replaced.
    ///
    /// # Errors
    ///
    /// The fatal run error, see [`Cmd::result`].
    pub fn stdout_string(&self) -> Result<String> {
        Ok(String::from_utf8_lossy(self.stdout()?).into_owned())
    }

    /// Stderr decoded as UTF-8, with invalid sequences replaced.
    ///
    /// # Errors
    ///
    /// The fatal run error, see [`Cmd::result`].
    pub fn stderr_string(&self) -> Result<String> {
        Ok(String::from_utf8_lossy(self.stderr()?).into_owned())
    }

    /// Lines of one stream, each including its trailing newline if it had
    /// one.
    ///
    /// # Errors
    ///
    /// The fatal run error, see [`Cmd::result`].
    pub fn each_line(&self, stream: Stream) -> Result<impl Iterator<Item = &[u8]>> {
        let buf = self.result()?.output.get(stream);
        Ok(buf.split_inclusive(|b| *b == b'\n'))
    }

    /// Process id of the child that ran.
    ///
    /// # Errors
    ///
    /// The fatal run error, see [`Cmd::result`].
    pub fn pid(&self) -> Result<u32> {
        Ok(self.result()?.pid)
    }

    /// Full exit status of the child.
    ///
    /// # Errors
    ///
    /// The fatal run error, see [`Cmd::result`].
    pub fn status(&self) -> Result<ExitStatus> {
        Ok(self.result()?.status)
    }

    /// Exit code of the child, `-1` if it was killed by a signal.
    ///
    /// # Errors
    ///
    /// The fatal run error, see [`Cmd::result`].
    pub fn exit_status(&self) -> Result<i32> {
        Ok(self.result()?.code())
    }

    /// Whether the child exited with status zero.
    ///
    /// # Errors
    ///
    /// The fatal run error, see [`Cmd::result`].
    pub fn success(&self) -> Result<bool> {
        Ok(self.result()?.success())
    }

    /// Whether the program could not be found and the fallback ran instead.
    ///
    /// # Errors
    ///
    /// The fatal run error, see [`Cmd::result`].
    pub fn not_found(&self) -> Result<bool> {
        Ok(self.result()?.not_found)
    }

    /// Serializable snapshot of the run, for diagnostics.
    ///
    /// # Errors
    ///
    /// The fatal run error, see [`Cmd::result`].
    pub fn report(&self) -> Result<Report> {
        Ok(Report::new(&self.spec, self.result()?))
    }
}

impl From<CommandSpec> for Cmd {
    fn from(spec: CommandSpec) -> Self {
        Self::from_spec(spec)
    }
}
