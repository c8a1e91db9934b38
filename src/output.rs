//! Output layer for lockdown CLI.
//!
//! Centralizes stdout/stderr separation and human vs JSON output modes.
//! - stdout: data (the "answer" - setting list, per-setting results, JSON)
//! - stderr: diagnostics (progress, verbose invocation log, human-mode errors)

use serde::Serialize;
use std::io::{self, Write};

use crate::dispatch::{Mode, RunResult, RunSummary};
use crate::registry::{Registry, Requirement};

/// Output mode for the CLI
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Output helper that centralizes all CLI output
#[derive(Debug, Clone)]
pub struct Output {
    pub mode: OutputMode,
    pub quiet: bool,
    pub verbose: bool,
}

impl Output {
    pub fn new(json: bool, quiet: bool, verbose: bool) -> Self {
        Self {
            mode: if json {
                OutputMode::Json
            } else {
                OutputMode::Human
            },
            quiet,
            verbose,
        }
    }

    /// Write data to stdout (the command's "answer")
    pub fn data(&self, message: &str) {
        println!("{}", message);
    }

    /// Write JSON data to stdout
    /// Returns error if serialization fails (should be propagated to become JSON error)
    pub fn json<T: Serialize>(&self, data: &T) -> Result<(), serde_json::Error> {
        let json = serde_json::to_string_pretty(data)?;
        println!("{}", json);
        Ok(())
    }

    /// Write a diagnostic/progress message to stderr
    /// Suppressed in JSON mode and when --quiet is set
    pub fn info(&self, message: &str) {
        if self.mode == OutputMode::Json || self.quiet {
            return;
        }
        eprintln!("{}", message);
    }

    /// Write a verbose diagnostic message to stderr
    /// Only shown with --verbose in human mode
    pub fn verbose(&self, message: &str) {
        if self.mode == OutputMode::Json || self.quiet || !self.verbose {
            return;
        }
        eprintln!("{}", message);
    }

    /// Write a warning to stderr
    /// Shown in human mode unless --quiet, suppressed in JSON mode
    pub fn warn(&self, message: &str) {
        if self.mode == OutputMode::Json || self.quiet {
            return;
        }
        eprintln!("{}", message);
    }

    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Flush stdout (useful before exiting)
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

// =============================================================================
// JSON Response Types
// =============================================================================

/// Schema version for JSON outputs.
/// Follows semver: breaking=major, additive=minor, bugfix=patch.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Tool version from Cargo.toml.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema IDs for JSON outputs.
pub mod schema {
    pub const ERROR: &str = "lockdown.error";
    pub const LIST: &str = "lockdown.list";
    pub const AUDIT: &str = "lockdown.audit";
}

/// JSON error response using envelope structure (written to stdout with non-zero exit).
#[derive(Debug, Serialize)]
pub struct JsonError {
    pub ok: bool,
    pub schema_id: &'static str,
    pub schema_version: &'static str,
    pub tool_version: &'static str,
    pub generated_at: String,
    pub errors: Vec<JsonErrorInfo>,
    /// Always null for error responses
    pub data: Option<()>,
}

#[derive(Debug, Serialize)]
pub struct JsonErrorInfo {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl JsonError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_code("internal_error", message)
    }

    /// Error with a machine-readable code (`invalid_index`, `precondition_failed`, ...)
    pub fn with_code(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            schema_id: schema::ERROR,
            schema_version: SCHEMA_VERSION,
            tool_version: TOOL_VERSION,
            generated_at: chrono::Utc::now().to_rfc3339(),
            errors: vec![JsonErrorInfo {
                code,
                message: message.into(),
                details: None,
            }],
            data: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        if let Some(first) = self.errors.first_mut() {
            first.details = Some(details.into());
        }
        self
    }

    /// Print this error as JSON to stdout
    /// Panics if serialization fails (should never happen for JsonError)
    pub fn print(&self) {
        let json =
            serde_json::to_string_pretty(self).expect("JsonError serialization should never fail");
        println!("{}", json);
    }
}

/// Versioned envelope for successful JSON output.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub ok: bool,
    pub schema_id: &'static str,
    pub schema_version: &'static str,
    pub tool_version: &'static str,
    /// ISO 8601 timestamp when this output was generated
    pub generated_at: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(schema_id: &'static str, ok: bool, data: T) -> Self {
        Self {
            ok,
            schema_id,
            schema_version: SCHEMA_VERSION,
            tool_version: TOOL_VERSION,
            generated_at: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }
}

/// One row of `lockdown list --json`
#[derive(Debug, Serialize)]
pub struct ListEntry {
    pub index: usize,
    pub name: &'static str,
    pub title: &'static str,
    pub fixable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub count: usize,
    pub settings: Vec<ListEntry>,
}

impl ListResponse {
    pub fn from_registry(registry: &Registry) -> Self {
        let settings: Vec<ListEntry> = registry
            .list()
            .iter()
            .enumerate()
            .map(|(index, entry)| ListEntry {
                index,
                name: entry.name,
                title: entry.title,
                fixable: entry.is_fixable(),
                requires: (entry.requirement != Requirement::Any)
                    .then(|| entry.requirement.describe()),
            })
            .collect();
        Self {
            count: registry.len(),
            settings,
        }
    }
}

/// Payload of `lockdown audit --json`
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub mode: Mode,
    pub results: &'a [RunResult],
    pub summary: &'a RunSummary,
}

// =============================================================================
// Meta UX JSON Response Types (--help, --version)
// =============================================================================

/// JSON response for --help flag
#[derive(Debug, Serialize)]
pub struct HelpResponse {
    pub ok: bool,
    pub help: String,
}

impl HelpResponse {
    pub fn new(help_text: String) -> Self {
        Self {
            ok: true,
            help: help_text,
        }
    }

    pub fn print(&self) {
        let json = serde_json::to_string_pretty(self)
            .expect("HelpResponse serialization should never fail");
        println!("{}", json);
    }
}

/// JSON response for --version flag
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub ok: bool,
    pub version: String,
}

impl VersionResponse {
    pub fn new(version: String) -> Self {
        Self { ok: true, version }
    }

    pub fn print(&self) {
        let json = serde_json::to_string_pretty(self)
            .expect("VersionResponse serialization should never fail");
        println!("{}", json);
    }
}
