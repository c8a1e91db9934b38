//! Human-readable rendering of setting lists and run results.

use colored::Colorize;

use crate::dispatch::{Mode, Outcome, RunResult, RunSummary};
use crate::registry::{Registry, Requirement};

pub fn format_list(registry: &Registry) -> String {
    if registry.is_empty() {
        return "No settings registered.\n".to_string();
    }
    let mut out = String::new();
    for (index, entry) in registry.list().iter().enumerate() {
        out.push_str(&format!("{:>2}  {} ({})", index, entry.title, entry.name));
        if !entry.is_fixable() {
            out.push_str(&format!("  {}", "[audit only]".dimmed()));
        }
        if entry.requirement != Requirement::Any {
            out.push_str(&format!("  [{}]", entry.requirement.describe()).dimmed().to_string());
        }
        out.push('\n');
    }
    out
}

fn icon(outcome: Outcome) -> String {
    match outcome {
        Outcome::Passed | Outcome::Fixed => "✓".green().to_string(),
        Outcome::Failed | Outcome::FixFailed => "✗".red().to_string(),
        Outcome::Unfixable => "⚠".yellow().to_string(),
        Outcome::Skipped => "-".dimmed().to_string(),
    }
}

pub fn format_result(result: &RunResult) -> String {
    let head = format!("{} [{}] {}", icon(result.outcome), result.index, result.title);
    let note = match result.outcome {
        Outcome::Passed | Outcome::Failed => None,
        Outcome::Fixed => Some("fixed".to_string()),
        Outcome::FixFailed => Some("fix failed".to_string()),
        Outcome::Unfixable => Some("no automatic fix, change it manually".to_string()),
        Outcome::Skipped => Some("skipped".to_string()),
    };

    match (note, result.detail.as_deref()) {
        (None, None) => head,
        (None, Some(detail)) => format!("{} ({})", head, detail),
        (Some(note), None) => format!("{}: {}", head, note),
        (Some(note), Some(detail)) => format!("{}: {} ({})", head, note, detail),
    }
}

pub fn format_summary(summary: &RunSummary, mode: Mode) -> String {
    let mut lines = Vec::new();

    if summary.total == 0 {
        lines.push("No settings evaluated".yellow().bold().to_string());
    } else if summary.all_passed() {
        lines.push("All settings passed!".green().bold().to_string());
    } else {
        match mode {
            Mode::Audit => lines.push(
                format!("{}/{} settings failed", summary.failed, summary.total)
                    .red()
                    .bold()
                    .to_string(),
            ),
            Mode::Fix => {
                lines.push(format!(
                    "{}/{} settings needed fixing",
                    summary.failed, summary.total
                ));
                lines.push(format!("  {} fixed", summary.fixed));
                lines.push(format!("  {} unfixable", summary.unfixable));
                if summary.fix_failed > 0 {
                    lines.push(format!("  {} fix failed", summary.fix_failed));
                }
            }
        }
    }

    if summary.skipped > 0 {
        lines.push(format!("{} skipped", summary.skipped).dimmed().to_string());
    }

    lines.join("\n")
}
