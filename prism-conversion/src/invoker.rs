//! External tool invocation
//!
//! Every processor operation ends up here: spawn a program with an explicit
//! argument vector, wait for it, and turn a nonzero exit into a [`ToolError`].
//! Programs are never run through a shell, so file paths containing shell
//! metacharacters are passed through untouched.

use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Failure of an external program
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program could not be started
    #[error("failed to spawn '{program}' {args:?}: {source}")]
    Spawn {
        program: String,
        args: Vec<String>,
        #[source]
        source: std::io::Error,
    },

    /// The program ran but exited unsuccessfully
    #[error("'{program}' {args:?} exited with code {}: {}", display_code(.code), trimmed(.stderr))]
    Exit {
        program: String,
        args: Vec<String>,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The run was cancelled while the program was running; the child was killed
    #[error("'{program}' was cancelled")]
    Cancelled { program: String },
}

fn display_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none (terminated by signal)".to_string())
}

fn trimmed(output: &str) -> &str {
    output.trim()
}

/// Runs external programs on behalf of the processors
///
/// Abstracted so tests can script tool output without spawning processes.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Runs `program` with `args` and returns its standard output
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<String, ToolError>;

    /// Runs `program` with `args`, discarding its output
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), ToolError> {
        self.run(program, args, cancel).await.map(|_| ())
    }
}

/// Invoker backed by real child processes
#[derive(Debug, Clone, Default)]
pub struct CommandInvoker;

impl CommandInvoker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolInvoker for CommandInvoker {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled {
                program: program.to_string(),
            });
        }

        debug!("Running {} {:?}", program, args);

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: program.to_string(),
                args: args.to_vec(),
                source,
            })?;

        // Dropping the wait future drops the child, and kill_on_drop kills it.
        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|source| ToolError::Spawn {
                program: program.to_string(),
                args: args.to_vec(),
                source,
            })?,
            _ = cancel.cancelled() => {
                debug!("Cancelled {} while running, child killed", program);
                return Err(ToolError::Cancelled {
                    program: program.to_string(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", program, stderr.trim());
        }

        if !output.status.success() {
            debug!(
                "Command failed: program={} exit_code={:?} stdout='{}' stderr='{}'",
                program,
                output.status.code(),
                stdout.trim(),
                stderr.trim()
            );
            return Err(ToolError::Exit {
                program: program.to_string(),
                args: args.to_vec(),
                code: output.status.code(),
                stdout,
                stderr,
            });
        }

        debug!(
            "Command completed successfully: program={}, stdout_len={}",
            program,
            stdout.len()
        );

        Ok(stdout)
    }
}

/// Checks that a program can be started at all
///
/// Used at startup to warn early about missing tools.
pub async fn probe(
    invoker: &dyn ToolInvoker,
    program: &str,
    version_arg: &str,
) -> Result<String, ToolError> {
    let output = invoker
        .run(program, &[version_arg.to_string()], &CancellationToken::new())
        .await?;
    Ok(output.lines().next().unwrap_or_default().trim().to_string())
}
