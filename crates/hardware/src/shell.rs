// SPDX-License-Identifier: Apache-2.0

//! Thin wrapper around host tool invocations.

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to spawn {program}: {source}")]
    Spawn { program: String, source: std::io::Error },

    #[error("{program} exited with code {code}. stdout: {stdout}. stderr: {stderr}")]
    Failed { program: String, code: i32, stdout: String, stderr: String },
}

impl ShellError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Spawn { .. } => -1,
            Self::Failed { code, .. } => *code,
        }
    }
}

/// Run a host tool and capture its output. Non-zero exit is an error.
pub async fn execute(program: &str, args: &[&str]) -> Result<CommandOutput, ShellError> {
    debug!(program, ?args, "executing");
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ShellError::Spawn { program: program.to_string(), source })?;
    collect(program, output)
}

/// Run a host tool, feeding `input` on stdin.
pub async fn execute_with_stdin(
    program: &str,
    args: &[&str],
    input: &str,
) -> Result<CommandOutput, ShellError> {
    use tokio::io::AsyncWriteExt;

    debug!(program, ?args, "executing with stdin");
    let mut child = Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ShellError::Spawn { program: program.to_string(), source })?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .await
            .map_err(|source| ShellError::Spawn { program: program.to_string(), source })?;
    }
    let output = child
        .wait_with_output()
        .await
        .map_err(|source| ShellError::Spawn { program: program.to_string(), source })?;
    collect(program, output)
}

fn collect(program: &str, output: std::process::Output) -> Result<CommandOutput, ShellError> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        return Err(ShellError::Failed {
            program: program.to_string(),
            code: output.status.code().unwrap_or(-1),
            stdout,
            stderr,
        });
    }
    Ok(CommandOutput { stdout, stderr })
}
