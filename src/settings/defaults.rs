//! Preference-database settings read and written through `defaults`.

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::registry::{Check, Remedy};
use crate::shim::{CommandRunner, Invocation};

/// Value a preference key must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pref {
    Bool(bool),
    Str(&'static str),
}

impl Pref {
    /// Compare against `defaults read` output.
    fn matches(&self, raw: &str) -> bool {
        let raw = raw.trim();
        match self {
            Pref::Bool(want) => parse_bool(raw) == Some(*want),
            Pref::Str(want) => raw == *want,
        }
    }

    fn write_args(&self) -> [String; 2] {
        match self {
            Pref::Bool(value) => ["-bool".to_string(), value.to_string()],
            Pref::Str(value) => ["-string".to_string(), value.to_string()],
        }
    }
}

/// `defaults read` prints booleans as 1/0; plists written by hand may say
/// true/false or YES/NO.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// One or more keys in a single preference domain that must all hold `value`.
#[derive(Debug, Clone, Copy)]
pub struct Defaults {
    pub domain: &'static str,
    pub keys: &'static [&'static str],
    pub value: Pref,
    /// System domains under /Library need root to write
    pub privileged: bool,
}

impl Defaults {
    pub const fn user(domain: &'static str, keys: &'static [&'static str], value: Pref) -> Self {
        Self {
            domain,
            keys,
            value,
            privileged: false,
        }
    }

    pub const fn system(domain: &'static str, keys: &'static [&'static str], value: Pref) -> Self {
        Self {
            domain,
            keys,
            value,
            privileged: true,
        }
    }

    fn read(&self, key: &str) -> Invocation {
        Invocation::new("defaults").args(["read", self.domain, key])
    }

    fn write(&self, key: &str) -> Invocation {
        Invocation::new("defaults")
            .args(["write", self.domain, key])
            .args(self.value.write_args())
            .privileged(self.privileged)
    }
}

/// Reading works unprivileged; a missing key reads as non-compliant.
#[async_trait]
impl Check for Defaults {
    async fn check(&self, runner: &dyn CommandRunner) -> Result<bool> {
        for key in self.keys {
            let output = runner.run(&self.read(key)).await?;
            if !output.success || !self.value.matches(&output.stdout) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl Remedy for Defaults {
    async fn remediate(&self, runner: &dyn CommandRunner) -> Result<()> {
        for key in self.keys {
            let invocation = self.write(key);
            let output = runner.run(&invocation).await?;
            if !output.success {
                bail!("`{}` failed ({})", invocation, output.failure_summary());
            }
        }
        Ok(())
    }

    fn privileged(&self) -> bool {
        self.privileged
    }
}
