//! Description of a program to run.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Default capacity of the channel the stream readers feed.
pub const DEFAULT_BUFFER_SIZE: usize = 64;

/// Program, arguments and process configuration for a single run.
///
/// `CommandSpec` is a plain value. The [`Cmd`](crate::Cmd) handle owns one
/// and refuses edits once it has been spawned; the spawner only ever sees a
/// frozen copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to execute.
    pub program: String,

    /// Arguments passed to the program, in order.
    pub args: Vec<String>,

    /// Working directory for the process.
    pub working_dir: Option<PathBuf>,

    /// Environment variables to set (merged with current env).
    pub env: BTreeMap<String, String>,

    /// Environment variables to remove.
    pub env_remove: Vec<String>,

    /// Whether to clear the environment before adding env vars.
    pub env_clear: bool,

    /// Capacity of the channel between stream readers and the aggregator.
    pub buffer_size: usize,
}

impl CommandSpec {
    /// Create a spec for the given program with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            env_remove: Vec::new(),
            env_clear: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set multiple environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.env.insert(k.into(), v.into());
        }
        self
    }

    /// Remove an environment variable.
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    /// Clear the environment before setting variables.
    pub fn env_clear(mut self) -> Self {
        self.env_clear = true;
        self
    }

    /// Set the reader channel capacity. Zero is bumped to one.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Build the tokio command for this spec, with stdin closed and both
    /// output streams piped.
    pub(crate) fn to_command(&self) -> tokio::process::Command {
        let mut cmd = piped_command(&self.program, &self.args);

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        if self.env_clear {
            cmd.env_clear();
        }

        for key in &self.env_remove {
            cmd.env_remove(key);
        }

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        cmd
    }
}

/// A bare command with stdin closed and stdout/stderr piped.
pub(crate) fn piped_command<S: AsRef<str>>(program: &str, args: &[S]) -> tokio::process::Command {
    use std::process::Stdio;

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args.iter().map(AsRef::as_ref));
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_append_in_order() {
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .args(["echo $0", "first"]);

        assert_eq!(spec.program, "sh");
        assert_eq!(spec.args, vec!["-c", "echo $0", "first"]);
    }

    #[test]
    fn test_env_and_dir() {
        let spec = CommandSpec::new("env")
            .env("A", "1")
            .env("A", "2")
            .env_remove("HOME")
            .env_clear()
            .working_dir("/tmp");

        assert_eq!(spec.env.get("A").map(String::as_str), Some("2"));
        assert_eq!(spec.env_remove, vec!["HOME"]);
        assert!(spec.env_clear);
        assert_eq!(spec.working_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_envs_merge_with_env() {
        let spec = CommandSpec::new("env")
            .env("KEEP", "yes")
            .envs([("A", "1"), ("B", "2")])
            .envs(vec![("A".to_string(), "3".to_string())]);

        assert_eq!(spec.env.len(), 3);
        assert_eq!(spec.env["A"], "3");
        assert_eq!(spec.env["B"], "2");
        assert_eq!(spec.env["KEEP"], "yes");
    }

    #[test]
    fn test_buffer_size_never_zero() {
        assert_eq!(CommandSpec::new("true").buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(CommandSpec::new("true").buffer_size(0).buffer_size, 1);
    }
}
