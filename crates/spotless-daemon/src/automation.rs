//! AppleScript automation executor.
//!
//! One `osascript` process per call, blocking the calling task until the
//! interpreter exits. Calls against Spotify routinely take hundreds of
//! milliseconds; nothing here retries. The next wake-up is the retry.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to launch {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("{command} produced no output")]
    EmptyOutput { command: String },
    #[error("unexpected output from {command}: {output:?}")]
    UnexpectedOutput { command: String, output: String },
}

/// Spawn a process and capture its output without judging the exit status.
/// Callers that care about particular exit codes (pgrep) inspect it
/// themselves.
pub async fn capture(binary: &Path, args: &[&str]) -> Result<std::process::Output, ExecError> {
    Command::new(binary)
        .args(args)
        .output()
        .await
        .map_err(|source| ExecError::Spawn {
            command: binary.display().to_string(),
            source,
        })
}

#[derive(Debug, Clone)]
pub struct ScriptRunner {
    binary: PathBuf,
}

impl ScriptRunner {
    pub fn new() -> Self {
        Self {
            binary: spotless_core::platform::osascript_binary(),
        }
    }

    #[cfg(test)]
    pub fn with_binary(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Run a script and return its trimmed stdout. Imperative commands
    /// (`play`, `set sound volume …`) legitimately print nothing, so an
    /// empty result is not an error here.
    pub async fn run(&self, script: &str) -> Result<String, ExecError> {
        let command = self.binary.display().to_string();
        let output = capture(&self.binary, &["-e", script]).await?;
        if !output.status.success() {
            return Err(ExecError::CommandFailed {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("osascript ok ({} bytes out)", stdout.len());
        Ok(stdout)
    }

    /// Run a query script; empty stdout is a failure.
    pub async fn run_expecting_output(&self, script: &str) -> Result<String, ExecError> {
        let out = self.run(script).await?;
        if out.is_empty() {
            return Err(ExecError::EmptyOutput {
                command: self.binary.display().to_string(),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let runner = ScriptRunner::with_binary(PathBuf::from("/nonexistent/osascript"));
        match runner.run("whatever").await {
            Err(ExecError::Spawn { .. }) => {}
            other => panic!("expected spawn error, got {:?}", other),
        }
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_captures_stdout() {
        // echo prints its arguments, standing in for the interpreter
        let runner = ScriptRunner::with_binary(PathBuf::from("/bin/echo"));
        let out = runner.run("hello world").await.unwrap();
        assert!(out.contains("hello world"));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_silent_success_fails_queries_only() {
        let runner = ScriptRunner::with_binary(PathBuf::from("/bin/true"));
        assert_eq!(runner.run("anything").await.unwrap(), "");
        match runner.run_expecting_output("anything").await {
            Err(ExecError::EmptyOutput { .. }) => {}
            other => panic!("expected empty-output error, got {:?}", other),
        }
    }
}
