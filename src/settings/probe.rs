//! Generic probes over status-printing system tools.

use anyhow::{bail, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use crate::registry::{Check, Remedy};
use crate::shim::{CommandRunner, Invocation};

/// A fixed command line, declared statically in the checklist.
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    pub program: &'static str,
    pub args: &'static [&'static str],
    pub privileged: bool,
}

impl Probe {
    pub const fn new(program: &'static str, args: &'static [&'static str]) -> Self {
        Self {
            program,
            args,
            privileged: false,
        }
    }

    pub const fn root(program: &'static str, args: &'static [&'static str]) -> Self {
        Self {
            program,
            args,
            privileged: true,
        }
    }

    pub fn invocation(&self) -> Invocation {
        Invocation::new(self.program)
            .args(self.args.iter().copied())
            .privileged(self.privileged)
    }
}

fn switch_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(enabled|disabled|on|off)\b").expect("switch regex is valid")
    })
}

/// Read an on/off state from a tool's status line.
///
/// Handles the phrasing of `socketfilterfw`, `spctl`, `fdesetup`,
/// `systemsetup` and `csrutil`. The first state word wins, so
/// "FileVault is Off, but will be enabled after the next restart" is off.
pub fn parse_switch(text: &str) -> Option<bool> {
    let word = switch_regex().captures(text)?.get(1)?.as_str();
    match word.to_ascii_lowercase().as_str() {
        "enabled" | "on" => Some(true),
        "disabled" | "off" => Some(false),
        _ => None,
    }
}

/// Passes when the probe exits zero and reports the wanted state.
pub struct SwitchIs {
    pub probe: Probe,
    pub want: bool,
}

impl SwitchIs {
    pub const fn on(probe: Probe) -> Self {
        Self { probe, want: true }
    }

    pub const fn off(probe: Probe) -> Self {
        Self { probe, want: false }
    }
}

#[async_trait]
impl Check for SwitchIs {
    async fn check(&self, runner: &dyn CommandRunner) -> Result<bool> {
        let output = runner.run(&self.probe.invocation()).await?;
        if !output.success {
            return Ok(false);
        }
        // Some tools (spctl) print their status on stderr
        let state = parse_switch(&output.stdout).or_else(|| parse_switch(&output.stderr));
        Ok(state == Some(self.want))
    }

    fn privileged(&self) -> bool {
        self.probe.privileged
    }
}

/// Passes when the probe exits zero.
pub struct ExitsZero(pub Probe);

#[async_trait]
impl Check for ExitsZero {
    async fn check(&self, runner: &dyn CommandRunner) -> Result<bool> {
        runner.succeeds(&self.0.invocation()).await
    }

    fn privileged(&self) -> bool {
        self.0.privileged
    }
}

/// Runs each step in order, stopping at the first failure.
pub struct RunSteps(pub &'static [Probe]);

#[async_trait]
impl Remedy for RunSteps {
    async fn remediate(&self, runner: &dyn CommandRunner) -> Result<()> {
        for step in self.0 {
            let invocation = step.invocation();
            let output = runner.run(&invocation).await?;
            if !output.success {
                bail!("`{}` failed ({})", invocation, output.failure_summary());
            }
        }
        Ok(())
    }

    fn privileged(&self) -> bool {
        self.0.iter().any(|step| step.privileged)
    }
}
