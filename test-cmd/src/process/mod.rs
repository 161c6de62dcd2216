//! Spawning and output capture.
//!
//! [`spawn`] launches the child and waits for it, [`drain`] reads stdout and
//! stderr concurrently while it runs.

mod drain;
mod spawn;

pub use drain::{Captured, Stream, StreamChunk, StreamMultiplexer};
pub use spawn::{
    capture, fallback_command, run_on_worker, ProcessResult, NOT_FOUND_EXIT_CODE,
};
