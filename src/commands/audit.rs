//! `lockdown audit [index]`

use anyhow::Result;

use super::{ensure_credentials, Privileges};
use crate::dispatch::{self, Mode, RunContext, RunSummary};
use crate::interrupt::setup_ctrlc_handler;
use crate::output::{schema, Envelope, Output, RunReport};
use crate::registry::Selection;
use crate::report::{format_result, format_summary};

pub async fn audit(
    ctx: &RunContext<'_>,
    selection: Selection,
    privileges: &Privileges,
    output: &Output,
) -> Result<i32> {
    ensure_credentials(ctx, selection, Mode::Audit, privileges, output).await?;
    setup_ctrlc_handler(ctx.cancel.clone());

    let human = !output.is_json();
    let results = dispatch::run(ctx, Mode::Audit, selection, |result| {
        if human {
            output.data(&format_result(result));
        }
    })
    .await?;
    let summary = RunSummary::from_results(&results);

    if output.is_json() {
        let report = RunReport {
            mode: Mode::Audit,
            results: &results,
            summary: &summary,
        };
        output.json(&Envelope::new(schema::AUDIT, summary.all_passed(), report))?;
    } else {
        output.data("");
        output.data(&format_summary(&summary, Mode::Audit));
    }

    Ok(summary.exit_code(Mode::Audit))
}
