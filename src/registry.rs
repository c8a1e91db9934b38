//! Setting registry: the fixed, ordered checklist.
//!
//! An entry's index is its position in the registry. Indices are what users
//! type (`lockdown audit 3`), so the order never changes during a run and the
//! registry has no mutation operations.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;

use crate::preconditions::Host;
use crate::shim::CommandRunner;

/// Read-only evaluation of whether a setting satisfies policy.
#[async_trait]
pub trait Check: Send + Sync {
    async fn check(&self, runner: &dyn CommandRunner) -> Result<bool>;

    /// Whether the check needs root.
    fn privileged(&self) -> bool {
        false
    }
}

/// State-mutating action that brings a setting into compliance.
#[async_trait]
pub trait Remedy: Send + Sync {
    async fn remediate(&self, runner: &dyn CommandRunner) -> Result<()>;

    /// Whether the remedy needs root.
    fn privileged(&self) -> bool {
        false
    }
}

/// Hardware a setting needs before it can be evaluated at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Requirement {
    #[default]
    Any,
    /// Intel Mac without an Apple T2 chip (firmware is user-checkable)
    IntelWithoutT2,
}

impl Requirement {
    pub fn is_met(&self, host: &Host) -> bool {
        match self {
            Requirement::Any => true,
            Requirement::IntelWithoutT2 => host.is_intel() && !host.has_t2,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Requirement::Any => "any Mac",
            Requirement::IntelWithoutT2 => "requires an Intel Mac without a T2 chip",
        }
    }
}

/// One checkable, optionally fixable unit of system configuration.
pub struct SettingEntry {
    /// Stable identifier, unique within the registry
    pub name: &'static str,
    /// Human-readable label
    pub title: &'static str,
    pub requirement: Requirement,
    pub audit: Box<dyn Check>,
    pub fix: Option<Box<dyn Remedy>>,
}

impl SettingEntry {
    pub fn new(name: &'static str, title: &'static str, audit: impl Check + 'static) -> Self {
        Self {
            name,
            title,
            requirement: Requirement::Any,
            audit: Box::new(audit),
            fix: None,
        }
    }

    pub fn with_fix(mut self, fix: impl Remedy + 'static) -> Self {
        self.fix = Some(Box::new(fix));
        self
    }

    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requirement = requirement;
        self
    }

    pub fn is_fixable(&self) -> bool {
        self.fix.is_some()
    }

    /// Whether auditing (and, for fix runs, fixing) this entry needs root.
    pub fn needs_privilege(&self, fixing: bool) -> bool {
        self.audit.privileged() || (fixing && self.fix.as_ref().is_some_and(|f| f.privileged()))
    }
}

impl fmt::Debug for SettingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingEntry")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("requirement", &self.requirement)
            .field("fixable", &self.is_fixable())
            .finish()
    }
}

/// Rejected index argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    NotANumber { input: String, len: usize },
    OutOfRange { input: String, len: usize },
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::NotANumber { input, len } => write!(
                f,
                "'{}' is not a valid index (expected a number from 0 to {})",
                input,
                len.saturating_sub(1)
            ),
            IndexError::OutOfRange { input, len } if *len == 0 => {
                write!(f, "Index {} is out of range: no settings are registered", input)
            }
            IndexError::OutOfRange { input, len } => write!(
                f,
                "Index {} is out of range (valid: 0-{}). Run `lockdown list` to see indices.",
                input,
                len - 1
            ),
        }
    }
}

impl std::error::Error for IndexError {}

/// Which entries a run touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    All,
    One(usize),
}

/// The ordered, immutable collection of settings.
#[derive(Debug)]
pub struct Registry {
    entries: Vec<SettingEntry>,
}

impl Registry {
    /// Build a registry, rejecting duplicate names.
    pub fn new(entries: Vec<SettingEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.name) {
                bail!("Duplicate setting name in registry: {}", entry.name);
            }
        }
        Ok(Self { entries })
    }

    /// The built-in macOS checklist.
    pub fn builtin() -> Result<Self> {
        Self::new(crate::settings::builtin())
    }

    pub fn list(&self) -> &[SettingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&SettingEntry, IndexError> {
        self.entries.get(index).ok_or_else(|| IndexError::OutOfRange {
            input: index.to_string(),
            len: self.entries.len(),
        })
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Parse a user-supplied index. Negative numbers are out of range; there
    /// is no "all" sentinel (omit the index to select everything).
    pub fn parse_index(&self, raw: &str) -> Result<usize, IndexError> {
        let input = raw.trim();
        let len = self.entries.len();
        let value: i64 = input.parse().map_err(|_| IndexError::NotANumber {
            input: input.to_string(),
            len,
        })?;

        if value < 0 || value as u64 >= len as u64 {
            return Err(IndexError::OutOfRange {
                input: input.to_string(),
                len,
            });
        }
        Ok(value as usize)
    }

    pub fn select(&self, raw: Option<&str>) -> Result<Selection, IndexError> {
        match raw {
            None => Ok(Selection::All),
            Some(raw) => self.parse_index(raw).map(Selection::One),
        }
    }

    /// Entries picked by a selection, with their indices, in registry order.
    pub fn selected(&self, selection: Selection) -> Vec<(usize, &SettingEntry)> {
        match selection {
            Selection::All => self.entries.iter().enumerate().collect(),
            Selection::One(index) => self
                .entries
                .get(index)
                .map(|entry| vec![(index, entry)])
                .unwrap_or_default(),
        }
    }
}
