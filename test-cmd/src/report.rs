//! Serializable summary of a finished run.

use serde::Serialize;

use crate::command::CommandSpec;
use crate::process::ProcessResult;

/// What ran and what came out of it, for printing when an assertion fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub program: String,
    pub args: Vec<String>,
    pub pid: u32,
    pub exit_status: i32,
    pub success: bool,
    pub not_found: bool,
    pub stdout: String,
    pub stderr: String,
}

impl Report {
    /// Summarize `result` as produced by running `spec`.
    pub fn new(spec: &CommandSpec, result: &ProcessResult) -> Self {
        Self {
            program: spec.program.clone(),
            args: spec.args.clone(),
            pid: result.pid,
            exit_status: result.code(),
            success: result.success(),
            not_found: result.not_found,
            stdout: String::from_utf8_lossy(&result.output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&result.output.stderr).into_owned(),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use serde_json::Value;

    use crate::cmd;

    #[test]
    fn test_report_fields() {
        let c = cmd("sh", ["-c", "echo out; echo err >&2; exit 2"]);
        let report = c.report().unwrap();

        assert_eq!(report.program, "sh");
        assert_eq!(report.args[0], "-c");
        assert_eq!(report.pid, c.pid().unwrap());
        assert_eq!(report.exit_status, 2);
        assert!(!report.success);
        assert!(!report.not_found);
        assert_eq!(report.stdout, "out\n");
        assert_eq!(report.stderr, "err\n");
    }

    #[test]
    fn test_report_json() {
        let report = cmd("sh", ["-c", "printf hi"]).report().unwrap();
        let json: Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["program"], "sh");
        assert_eq!(json["stdout"], "hi");
        assert_eq!(json["exit_status"], 0);
        assert_eq!(json["success"], true);
    }
}
