//! Checks about the account running lockdown.

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::registry::Check;
use crate::shim::{CommandRunner, Invocation};

/// Whether a group list from `id -Gn` includes `admin`.
pub fn is_admin(groups: &str) -> bool {
    groups.split_whitespace().any(|group| group == "admin")
}

/// The current user is a standard (non-admin) account.
pub struct StandardUser;

#[async_trait]
impl Check for StandardUser {
    async fn check(&self, runner: &dyn CommandRunner) -> Result<bool> {
        let invocation = Invocation::new("id").arg("-Gn");
        let output = runner.run(&invocation).await?;
        if !output.success {
            bail!("`{}` failed ({})", invocation, output.failure_summary());
        }
        Ok(!is_admin(&output.stdout))
    }
}
