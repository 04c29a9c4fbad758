//! Process execution for terraform commands
//!
//! The driver never spawns processes itself; it hands a [`CommandSpec`] to a
//! [`CommandExecutor`]. [`SystemExecutor`] runs the real binary, tests plug in
//! scripted executors.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

/// A fully resolved command invocation
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// The terraform subcommand (first argument), e.g. `apply`
    pub fn subcommand(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }

    /// Command line for logs, with sensitive `-var` values masked
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        for arg in &self.args {
            match arg.split_once('=') {
                Some((name, _)) if tfprobe_common::DeploymentVariables::is_sensitive(name) => {
                    parts.push(format!("{}=***", name));
                }
                _ => parts.push(arg.clone()),
            }
        }
        parts.join(" ")
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr, the text retry patterns are matched against
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        if self.stdout.is_empty() {
            return self.stderr.clone();
        }
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Runs commands on behalf of the terraform driver
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, spec: &CommandSpec) -> HarnessResult<CommandOutput>;
}

/// Executor backed by `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn execute(&self, spec: &CommandSpec) -> HarnessResult<CommandOutput> {
        debug!("Running: {} (in {})", spec.display(), spec.working_dir.display());
        let start = Instant::now();

        let output = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| HarnessError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        // Killed by a signal: no exit code, treat as a generic failure.
        let exit_code = output.status.code().unwrap_or(-1);

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(program: &str, args: &[&str]) -> CommandSpec {
        CommandSpec {
            program: PathBuf::from(program),
            args: args.iter().map(|s| s.to_string()).collect(),
            working_dir: std::env::temp_dir(),
            env: vec![("TFPROBE_TEST_VAR".into(), "hello".into())],
        }
    }

    #[test]
    fn test_display_masks_sensitive_vars() {
        let s = spec(
            "terraform",
            &["apply", "-var", "sql_administrator_password=P@ss", "-var", "prefix=test"],
        );
        let line = s.display();
        assert!(line.contains("sql_administrator_password=***"));
        assert!(line.contains("prefix=test"));
        assert!(!line.contains("P@ss"));
        assert_eq!(s.subcommand(), "apply");
    }

    #[test]
    fn test_combined_output() {
        let out = CommandOutput {
            exit_code: 1,
            stdout: "out".into(),
            stderr: "err".into(),
            ..Default::default()
        };
        assert_eq!(out.combined(), "out\nerr");
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_executor_captures_output_and_env() {
        let out = SystemExecutor
            .execute(&spec("sh", &["-c", "echo $TFPROBE_TEST_VAR; echo oops >&2; exit 3"]))
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[test]
    fn test_system_executor_missing_binary() {
        let err = SystemExecutor
            .execute(&spec("tfprobe-definitely-not-a-binary", &[]))
            .unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
    }
}
