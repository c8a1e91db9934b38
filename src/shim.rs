//! Execution shim: runs one external invocation and reports how it exited.
//!
//! Settings never spawn processes themselves. They describe an [`Invocation`]
//! and hand it to a [`CommandRunner`], which keeps process handling (sudo,
//! stdio, Ctrl+C) in one place and lets tests substitute a scripted runner.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::interrupt::Interrupted;
use crate::output::Output;

/// A single external command, described but not yet run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Needs root; run through `sudo -n` unless we already are root
    pub privileged: bool,
    /// Inherits the terminal (used for password prompts)
    pub interactive: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            privileged: false,
            interactive: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// Program and arguments joined by spaces, without any sudo prefix.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.privileged {
            write!(f, "sudo ")?;
        }
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// What a finished invocation left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Short description of a failure, for error messages.
    pub fn failure_summary(&self) -> String {
        let code = self
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exit {}", code)
        } else {
            format!("exit {}: {}", code, stderr)
        }
    }
}

#[cfg(test)]
impl CommandOutput {
    /// A zero exit with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A non-zero exit with no output.
    pub fn failed(code: i32) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }
}

/// Runs invocations. Implementations must not retry.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;

    /// True iff the invocation exits zero.
    async fn succeeds(&self, invocation: &Invocation) -> Result<bool> {
        Ok(self.run(invocation).await?.success)
    }
}

/// Runner that spawns real processes.
pub struct SystemRunner {
    sudo: String,
    is_root: bool,
    cancel: CancellationToken,
    output: Output,
}

impl SystemRunner {
    /// A runner that prefixes privileged invocations with `sudo -n` until
    /// told otherwise by [`SystemRunner::with_root`].
    pub fn new(sudo: impl Into<String>, cancel: CancellationToken, output: Output) -> Self {
        Self {
            sudo: sudo.into(),
            is_root: false,
            cancel,
            output,
        }
    }

    /// Run privileged invocations directly; set once the host is known to run as root.
    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut cmd = if invocation.privileged && !self.is_root {
            let mut sudo = Command::new(&self.sudo);
            if !invocation.interactive {
                // Credentials were cached up front; never prompt mid-run
                sudo.arg("-n");
            }
            sudo.arg(&invocation.program);
            sudo
        } else {
            Command::new(&invocation.program)
        };
        cmd.args(&invocation.args);

        if invocation.interactive {
            cmd.stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        } else {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        if self.cancel.is_cancelled() {
            return Err(Interrupted.into());
        }

        self.output.verbose(&format!("$ {}", invocation));

        let child = self
            .command(invocation)
            .spawn()
            .with_context(|| format!("Failed to execute `{}`", invocation.command_line()))?;

        // Dropping the wait future kills the child (kill_on_drop)
        let finished = tokio::select! {
            result = child.wait_with_output() => result
                .with_context(|| format!("Failed to wait for {}", invocation.program))?,
            _ = self.cancel.cancelled() => return Err(Interrupted.into()),
        };

        let output = CommandOutput {
            success: finished.status.success(),
            code: finished.status.code(),
            stdout: String::from_utf8_lossy(&finished.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&finished.stderr).into_owned(),
        };

        if !output.success {
            self.output
                .verbose(&format!("  -> {}", output.failure_summary()));
        }

        Ok(output)
    }
}
