//! Command implementations for lockdown CLI.
//!
//! Each command returns the process exit code; fatal errors propagate as
//! `Err` and are mapped to exit codes in `main`.

mod audit;
mod fix;
mod list;

pub use audit::audit;
pub use fix::fix;
pub use list::list;

use anyhow::Result;

use crate::dispatch::{Mode, RunContext};
use crate::output::Output;
use crate::preconditions::{self, PreconditionError};
use crate::registry::Selection;

/// How privileged invocations get root.
#[derive(Debug, Clone)]
pub struct Privileges {
    pub sudo: String,
    pub is_root: bool,
}

/// Cache sudo credentials once if any entry about to run needs root.
///
/// A refusal is fatal for fix runs. Audit runs continue; the privileged
/// probes fail and are reported per setting.
pub(crate) async fn ensure_credentials(
    ctx: &RunContext<'_>,
    selection: Selection,
    mode: Mode,
    privileges: &Privileges,
    output: &Output,
) -> Result<()> {
    if privileges.is_root {
        return Ok(());
    }
    let fixing = mode == Mode::Fix;
    let needs_root = ctx
        .runnable(selection)
        .iter()
        .any(|(_, entry)| entry.needs_privilege(fixing));
    if !needs_root {
        return Ok(());
    }

    output.info("Some settings need administrator rights; sudo may ask for your password.");
    if preconditions::cache_credentials(ctx.runner, &privileges.sudo).await? {
        return Ok(());
    }

    match mode {
        Mode::Fix => Err(PreconditionError::CredentialsUnavailable.into()),
        Mode::Audit => {
            output.warn("Could not cache sudo credentials; privileged checks will fail.");
            Ok(())
        }
    }
}
