//! Crate-wide error type.
//!
//! Errors raised while a command runs are memoized together with the rest of
//! the outcome and handed back on every accessor call, so `CmdError` is
//! `Clone` and keeps its io sources behind an `Arc`.

use std::io;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CmdError {
    #[error("cannot modify command '{program}': it has already been spawned")]
    AlreadySpawned { program: String },

    #[error("failed to spawn process: {program}")]
    Spawn {
        program: String,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to wait for process {pid} to exit")]
    Wait {
        pid: u32,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to build worker runtime")]
    Runtime(#[source] Arc<io::Error>),

    #[error("failed to start worker thread")]
    Worker(#[source] Arc<io::Error>),

    #[error("worker thread panicked while running '{program}'")]
    WorkerPanicked { program: String },
}

impl CmdError {
    pub(crate) fn spawn(program: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn wait(pid: u32, source: io::Error) -> Self {
        Self::Wait {
            pid,
            source: Arc::new(source),
        }
    }

    pub(crate) fn runtime(source: io::Error) -> Self {
        Self::Runtime(Arc::new(source))
    }

    pub(crate) fn worker(source: io::Error) -> Self {
        Self::Worker(Arc::new(source))
    }
}

pub type Result<T> = std::result::Result<T, CmdError>;
