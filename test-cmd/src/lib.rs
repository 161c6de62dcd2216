//! test-cmd - capture everything a child process writes.
//!
//! Spawns a program, drains its stdout and stderr concurrently into memory
//! and exposes the bytes, pid and exit status through a lazy handle. The
//! program only runs when a result is first asked for, and only once.
//!
//! ```rust,no_run
//! use test_cmd::cmd;
//!
//! fn main() -> test_cmd::Result<()> {
//!     let ruby = cmd("ruby", ["-e", "warn 42"]);
//!     assert_eq!(ruby.stderr()?, b"42\n");
//!
//!     ruby.on_success(|c| println!("pid {} ok", c.pid().unwrap()))?
//!         .on_failure(|c| eprintln!("{}", c.stderr_string().unwrap()))?;
//!     Ok(())
//! }
//! ```
//!
//! A program that cannot be found is not an error: the run completes with
//! exit status 127, the lookup failure in stderr and [`Cmd::not_found`]
//! reporting `true`.

pub mod cmd;
pub mod command;
pub mod error;
pub mod logging;
pub mod process;
pub mod report;

pub use cmd::{Cmd, ExecutionState};
pub use command::CommandSpec;
pub use error::{CmdError, Result};
pub use process::{ProcessResult, Stream};
pub use report::Report;

/// Create a handle for `program` with initial arguments.
pub fn cmd<I, S>(program: impl Into<String>, args: I) -> Cmd
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Cmd::from_spec(CommandSpec::new(program).args(args))
}
