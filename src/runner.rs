//! External command execution.
//!
//! This module contains the `CommandRunner` seam used by the report composer and
//! `ProcessRunner`, its implementation on top of `tokio::process`. Commands run
//! one at a time and are awaited to completion; their combined stdout and
//! stderr are captured through an anonymous temporary file.

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::debug;

/// A program and its arguments, ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Splits a shell-style command string into program and arguments.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts =
            shell_words::split(raw).with_context(|| format!("failed to parse command {raw:?}"))?;
        if parts.is_empty() {
            bail!("command is empty");
        }
        let program = parts.remove(0);
        Ok(Self {
            program,
            args: parts,
        })
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(&self.program).chain(self.args.iter());
        f.write_str(&shell_words::join(words))
    }
}

/// Outcome of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command exited with status zero.
    pub success: bool,
    /// Combined output, present only when the caller asked for it.
    pub captured_text: Option<String>,
}

/// Exit status and combined output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub text: String,
}

/// Runs external commands to completion.
pub trait CommandRunner {
    /// Runs `command` and returns its exit status with the combined
    /// stdout/stderr text in write order.
    ///
    /// A program that cannot be spawned is reported as a failed run whose text
    /// names the error. Only failures of the capture itself are returned as
    /// `Err`.
    async fn run(&mut self, command: &CommandLine) -> Result<CommandOutput>;
}

/// Spawns real child processes.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(&mut self, command: &CommandLine) -> Result<CommandOutput> {
        debug!(%command, "running command");
        let mut capture = tempfile::tempfile().context("failed to create capture file")?;
        let stderr = capture
            .try_clone()
            .context("failed to duplicate capture file handle")?;
        let stdout = capture
            .try_clone()
            .context("failed to duplicate capture file handle")?;

        let mut child = Command::new(&command.program);
        child
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);

        let status = match child.status().await {
            Ok(status) => status,
            Err(err) => {
                debug!(%command, error = %err, "command failed to start");
                return Ok(CommandOutput {
                    success: false,
                    text: format!("failed to run `{}`: {}\n", command, err),
                });
            }
        };
        let text = read_capture(&mut capture)?;
        debug!(%command, code = ?status.code(), bytes = text.len(), "command finished");
        Ok(CommandOutput {
            success: status.success(),
            text,
        })
    }
}

fn read_capture(file: &mut File) -> Result<String> {
    file.seek(SeekFrom::Start(0))
        .context("failed to rewind capture file")?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .context("failed to read capture file")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
