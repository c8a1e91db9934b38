//! `lockdown fix [index]` and `lockdown fix-force [index]`

use anyhow::Result;
use colored::Colorize;

use super::{ensure_credentials, Privileges};
use crate::dispatch::{self, Confirm, Mode, RunContext, RunSummary, NON_INTERACTIVE_ENV};
use crate::exit_codes;
use crate::interrupt::setup_ctrlc_handler;
use crate::output::Output;
use crate::registry::Selection;
use crate::report::{format_result, format_summary};

pub async fn fix(
    ctx: &RunContext<'_>,
    selection: Selection,
    force: bool,
    confirm: &dyn Confirm,
    privileges: &Privileges,
    output: &Output,
) -> Result<i32> {
    if !force {
        let prompt = match selection {
            Selection::All => "Audit every setting and change the ones that fail?".to_string(),
            Selection::One(index) => format!(
                "Audit setting {} ({}) and change it if it fails?",
                index,
                ctx.registry.get(index)?.title
            ),
        };
        if !confirm.confirm(&prompt)? {
            println!("Aborted.");
            output.info(&format!(
                "Hint: use `lockdown fix-force` (or answer the prompt in a terminal without {}=1) to apply fixes.",
                NON_INTERACTIVE_ENV
            ));
            return Ok(exit_codes::SETTINGS_FAILED);
        }
    }

    ensure_credentials(ctx, selection, Mode::Fix, privileges, output).await?;
    setup_ctrlc_handler(ctx.cancel.clone());

    let results = dispatch::run(ctx, Mode::Fix, selection, |result| {
        output.data(&format_result(result));
    })
    .await?;
    let summary = RunSummary::from_results(&results);

    output.data("");
    output.data(&format_summary(&summary, Mode::Fix));
    if summary.unfixable > 0 {
        output.info(&format!(
            "{} Settings marked unfixable must be changed by hand (System Settings or recoveryOS).",
            "⚠".yellow()
        ));
    }

    Ok(summary.exit_code(Mode::Fix))
}
