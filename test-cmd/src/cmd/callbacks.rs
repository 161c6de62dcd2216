//! Success and failure callbacks.

use super::Cmd;
use crate::error::Result;

impl Cmd {
    /// Run `callback` if the command exits successfully.
    ///
    /// Spawns the command if it has not run yet. Returns the handle whether
    /// or not the callback fired, so it chains with [`Cmd::on_failure`].
    /// A panic inside `callback` is not caught.
    ///
    /// # Errors
    ///
    /// The memoized fatal error if the process could not be run; neither
    /// branch fires in that case.
    pub fn on_success<F>(&self, callback: F) -> Result<&Self>
    where
        F: FnOnce(&Self),
    {
        if self.success()? {
            callback(self);
        }
        Ok(self)
    }

    /// Run `callback` if the command exits with a failure, including when
    /// the program was not found.
    ///
    /// # Errors
    ///
    /// The fatal run error, see [`Cmd::result`]; the callback does not run.
    pub fn on_failure<F>(&self, callback: F) -> Result<&Self>
    where
        F: FnOnce(&Self),
    {
        if !self.success()? {
            callback(self);
        }
        Ok(self)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::cell::Cell;

    use crate::{cmd, Cmd, CmdError};

    #[test]
    fn test_success_branch() {
        let ok = Cell::new(0);
        let failed = Cell::new(0);
        let c = cmd("sh", ["-c", "exit 0"]);

        let returned = c
            .on_success(|_| ok.set(ok.get() + 1))
            .unwrap()
            .on_failure(|_| failed.set(failed.get() + 1))
            .unwrap();

        assert_eq!(ok.get(), 1);
        assert_eq!(failed.get(), 0);
        assert!(std::ptr::eq(returned, &c));
    }

    #[test]
    fn test_failure_branch() {
        let ok = Cell::new(0);
        let failed = Cell::new(0);
        let c = cmd("sh", ["-c", "exit 1"]);

        let returned = c
            .on_success(|_| ok.set(ok.get() + 1))
            .unwrap()
            .on_failure(|_| failed.set(failed.get() + 1))
            .unwrap();

        assert_eq!(ok.get(), 0);
        assert_eq!(failed.get(), 1);
        assert!(std::ptr::eq(returned, &c));
    }

    #[test]
    fn test_callback_sees_handle() {
        let mut seen = None;
        cmd("sh", ["-c", "echo 42 >&2; exit 5"])
            .on_failure(|c| seen = Some((c.exit_status().unwrap(), c.stderr_string().unwrap())))
            .unwrap();

        assert_eq!(seen, Some((5, "42\n".to_string())));
    }

    #[test]
    fn test_missing_program_takes_failure_branch() {
        let mut failed = false;
        Cmd::new("no-such-program-for-callbacks")
            .on_success(|_| panic!("success callback fired"))
            .unwrap()
            .on_failure(|c| failed = c.not_found().unwrap())
            .unwrap();

        assert!(failed);
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn test_callback_panic_propagates() {
        let _ = cmd("sh", ["-c", "true"]).on_success(|_| panic!("boom"));
    }

    #[test]
    fn test_fatal_error_skips_callbacks() {
        let dir = tempfile::tempdir().unwrap();
        let c = Cmd::new(dir.path().to_string_lossy());

        let result = c.on_success(|_| panic!("success")).map(|_| ());
        assert!(matches!(result, Err(CmdError::Spawn { .. })));
        let result = c.on_failure(|_| panic!("failure")).map(|_| ());
        assert!(matches!(result, Err(CmdError::Spawn { .. })));
    }
}
