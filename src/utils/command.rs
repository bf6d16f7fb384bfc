//! Utilities for running local commands with timeouts
//!
//! Every `juju` invocation goes through here, including `juju ssh` and
//! `juju scp`, so a timed-out child is killed rather than left running.

use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, error};

/// Errors produced while running a local command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Failed to execute {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Command '{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Command '{command}' failed with exit code {exit_code}: {stderr}")]
    Failed {
        command: String,
        exit_code: i32,
        stderr: String,
    },
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Render a command line for logs and error messages
pub fn display_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Run a command with a timeout, returning its output whatever the exit code
///
/// The child is killed if the timeout elapses. Works both inside a tokio
/// runtime (from a blocking thread) and outside of one.
pub fn run_command(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, CommandError> {
    let command_line = display_command(program, args);
    debug!("Running command: {}", command_line);

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let wait = async {
        let child = cmd.spawn().map_err(|e| CommandError::Spawn {
            program: program.to_string(),
            reason: e.to_string(),
        })?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output.map_err(|e| CommandError::Spawn {
                program: program.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(CommandError::Timeout {
                command: command_line.clone(),
                timeout,
            }),
        }
    };

    let output = match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle.block_on(wait)?,
        Err(_) => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CommandError::Spawn {
                program: program.to_string(),
                reason: format!("Failed to start runtime: {}", e),
            })?
            .block_on(wait)?,
    };

    let result = CommandOutput {
        // Signal-terminated children have no code
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };

    if !result.stdout.is_empty() {
        debug!("Command output: {}", result.stdout.trim_end());
    }

    Ok(result)
}

/// Run a command and treat a non-zero exit code as an error
pub fn run_command_checked(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, CommandError> {
    let output = run_command(program, args, timeout)?;

    if !output.success() {
        let command = display_command(program, args);
        error!("Command failed: {}", command);
        error!("Stderr: {}", output.stderr.trim_end());
        return Err(CommandError::Failed {
            command,
            exit_code: output.exit_code,
            stderr: output.stderr.trim_end().to_string(),
        });
    }

    Ok(output)
}
