//! Mode dispatcher: turns a command plus optional index into registry runs.
//!
//! Audit and fix runs walk the selected entries in registry order, one at a
//! time. Per-entry failures (a probe that exits non-zero, a program that is
//! not installed, a fix that errors) become [`RunResult`]s and never stop the
//! loop. Only cancellation ends a run early.

use anyhow::Result;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::exit_codes;
use crate::interrupt::{is_interrupted, Interrupted};
use crate::preconditions::Host;
use crate::registry::{IndexError, Registry, Selection, SettingEntry};
use crate::shim::CommandRunner;

/// Environment variable that makes every confirmation prompt answer "no".
pub const NON_INTERACTIVE_ENV: &str = "LOCKDOWN_NON_INTERACTIVE";

/// What the user asked for, decided once before anything runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Audit(Selection),
    Fix { selection: Selection, force: bool },
}

impl Action {
    /// Fix action for a raw index argument; index errors are fatal.
    pub fn fix(registry: &Registry, raw: Option<&str>, force: bool) -> Result<Self, IndexError> {
        Ok(Action::Fix {
            selection: registry.select(raw)?,
            force,
        })
    }

    pub fn audit(registry: &Registry, raw: Option<&str>) -> Result<Self, IndexError> {
        registry.select(raw).map(Action::Audit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Audit,
    Fix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    Fixed,
    FixFailed,
    /// Audit failed and the setting has no fix
    Unfixable,
    /// Not evaluated on this host or excluded by config
    Skipped,
}

/// Outcome of one entry within one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub index: usize,
    pub name: &'static str,
    pub title: &'static str,
    pub outcome: Outcome,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RunResult {
    pub fn new(index: usize, entry: &SettingEntry, outcome: Outcome) -> Self {
        Self {
            index,
            name: entry.name,
            title: entry.title,
            outcome,
            passed: matches!(outcome, Outcome::Passed | Outcome::Fixed),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Counters folded from a run's results. Skipped entries only count as skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    /// Entries whose audit failed (for fix runs: entries that needed fixing)
    pub failed: usize,
    pub fixed: usize,
    pub unfixable: usize,
    pub fix_failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn from_results(results: &[RunResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            summary.record(result);
            summary
        })
    }

    pub fn record(&mut self, result: &RunResult) {
        if result.outcome == Outcome::Skipped {
            self.skipped += 1;
            return;
        }
        self.total += 1;
        match result.outcome {
            Outcome::Passed | Outcome::Skipped => {}
            Outcome::Failed => self.failed += 1,
            Outcome::Fixed => {
                self.failed += 1;
                self.fixed += 1;
            }
            Outcome::Unfixable => {
                self.failed += 1;
                self.unfixable += 1;
            }
            Outcome::FixFailed => {
                self.failed += 1;
                self.fix_failed += 1;
            }
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Every entry that needed fixing was fixed.
    pub fn all_fixed(&self) -> bool {
        self.fixed == self.failed
    }

    pub fn exit_code(&self, mode: Mode) -> i32 {
        let ok = match mode {
            Mode::Audit => self.all_passed(),
            Mode::Fix => self.all_fixed(),
        };
        if ok {
            exit_codes::PASSED
        } else {
            exit_codes::SETTINGS_FAILED
        }
    }
}

/// Everything a run needs, borrowed for its duration.
pub struct RunContext<'a> {
    pub registry: &'a Registry,
    pub runner: &'a dyn CommandRunner,
    pub host: &'a Host,
    pub cancel: CancellationToken,
    /// Names excluded from whole-registry runs
    pub skip: &'a [String],
}

impl RunContext<'_> {
    /// Entries the selection covers that will actually be evaluated.
    pub fn runnable(&self, selection: Selection) -> Vec<(usize, &SettingEntry)> {
        self.registry
            .selected(selection)
            .into_iter()
            .filter(|(_, entry)| self.skip_reason(selection, entry).is_none())
            .collect()
    }

    fn skip_reason(&self, selection: Selection, entry: &SettingEntry) -> Option<String> {
        if selection == Selection::All && self.skip.iter().any(|name| name == entry.name) {
            return Some("skipped by settings.skip in config".to_string());
        }
        if !entry.requirement.is_met(self.host) {
            return Some(format!("not applicable ({})", entry.requirement.describe()));
        }
        None
    }
}

/// Audit (and in fix mode, remediate) each selected entry in order.
///
/// `on_result` sees each result as soon as it is known, so partial progress
/// is visible even if the run is interrupted.
pub async fn run(
    ctx: &RunContext<'_>,
    mode: Mode,
    selection: Selection,
    mut on_result: impl FnMut(&RunResult),
) -> Result<Vec<RunResult>> {
    let mut results = Vec::new();

    for (index, entry) in ctx.registry.selected(selection) {
        if ctx.cancel.is_cancelled() {
            return Err(Interrupted.into());
        }

        let result = match ctx.skip_reason(selection, entry) {
            Some(reason) => RunResult::new(index, entry, Outcome::Skipped).with_detail(reason),
            None => evaluate(ctx.runner, index, entry, mode).await?,
        };

        on_result(&result);
        results.push(result);
    }

    Ok(results)
}

/// Run one entry. Only an interrupt escapes as `Err`.
async fn evaluate(
    runner: &dyn CommandRunner,
    index: usize,
    entry: &SettingEntry,
    mode: Mode,
) -> Result<RunResult> {
    let audit_error = match entry.audit.check(runner).await {
        Ok(true) => return Ok(RunResult::new(index, entry, Outcome::Passed)),
        Ok(false) => None,
        Err(e) if is_interrupted(&e) => return Err(e),
        Err(e) => Some(format!("{:#}", e)),
    };

    let failed = |outcome| {
        let result = RunResult::new(index, entry, outcome);
        match &audit_error {
            Some(detail) => result.with_detail(detail.clone()),
            None => result,
        }
    };

    if mode == Mode::Audit {
        return Ok(failed(Outcome::Failed));
    }

    let Some(fix) = &entry.fix else {
        return Ok(failed(Outcome::Unfixable));
    };

    match fix.remediate(runner).await {
        Ok(()) => Ok(RunResult::new(index, entry, Outcome::Fixed)),
        Err(e) if is_interrupted(&e) => Err(e),
        Err(e) => Ok(RunResult::new(index, entry, Outcome::FixFailed).with_detail(format!("{:#}", e))),
    }
}

/// Yes/no question before a fix run mutates anything.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Terminal prompt, default answer "no".
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(confirmation_error)
    }
}

/// Ctrl+C at the prompt arrives as a read error, since the terminal is in raw mode.
fn confirmation_error(err: dialoguer::Error) -> anyhow::Error {
    match err {
        dialoguer::Error::IO(e) if e.kind() == std::io::ErrorKind::Interrupted => Interrupted.into(),
        other => anyhow::Error::new(other).context("Failed to read confirmation"),
    }
}

/// Always declines. Used when nobody can answer the prompt.
pub struct Decline;

impl Confirm for Decline {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Whether prompts can be shown: stdin is a terminal and
/// `LOCKDOWN_NON_INTERACTIVE` is not set to a truthy value.
pub fn prompts_allowed() -> bool {
    use std::io::IsTerminal;

    let forced_off = std::env::var(NON_INTERACTIVE_ENV)
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);
    !forced_off && std::io::stdin().is_terminal()
}
