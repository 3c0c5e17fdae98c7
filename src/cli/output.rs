//! CLI output formatting

use crate::{
    core::{error::CompositionError, operation::OperationDescriptor, state::RunStatus},
    execution::{BatchPlan, BatchReport},
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over `total` runs
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a run status for display
pub fn format_run_status(status: &RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed { cause } => format!("{}: {}", style("FAILED").red(), style(cause).dim()),
        RunStatus::Skipped => style("SKIPPED").dim().to_string(),
    }
}

fn status_icon(status: &RunStatus) -> Emoji<'static, 'static> {
    match status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed { .. } => CROSS,
        RunStatus::Skipped => SKIP,
        RunStatus::Pending | RunStatus::Running => SPINNER,
    }
}

/// Dry-run listing: the count, then every pending run with its index
pub fn format_plan(plan: &BatchPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total runs: {}", plan.pending_count());
    for (index, run) in plan.pending().iter().enumerate() {
        let _ = writeln!(out, "  [{}] {}", index, run.run_id);
    }
    if plan.skipped_count() > 0 {
        let _ = writeln!(
            out,
            "{}",
            style(format!("({} already complete)", plan.skipped_count())).dim()
        );
    }
    out
}

/// Per-file summary followed by totals
pub fn format_report(report: &BatchReport) -> String {
    let mut out = String::new();
    for run in &report.runs {
        let _ = writeln!(
            out,
            "{} {} {}",
            status_icon(&run.status),
            style(&run.run_id).bold(),
            format_run_status(&run.status)
        );
        for warning in &run.warnings {
            let _ = writeln!(out, "    {} {}", WARN, style(warning).yellow());
        }
    }

    let totals = report.totals;
    let _ = write!(
        out,
        "\n{} runs: {} succeeded, {} skipped, {} failed",
        style(totals.total).cyan(),
        style(totals.succeeded).green(),
        style(totals.skipped).dim(),
        style(totals.failed).red()
    );
    if let Ok(elapsed) = report.finished_at.signed_duration_since(report.started_at).to_std() {
        let _ = write!(out, " ({})", format_duration(elapsed));
    }
    out
}

/// One line per violation
pub fn format_violations(error: &CompositionError) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", CROSS, style(error).red());
    for violation in &error.violations {
        let _ = writeln!(out, "  - {}", violation);
    }
    out
}

/// Operation listing line with its parameters
pub fn format_operation(operation: &OperationDescriptor) -> String {
    let mut out = format!(
        "{} ({} -> {})",
        style(&operation.id).bold(),
        style(operation.input).cyan(),
        style(operation.output).cyan()
    );
    if !operation.description.is_empty() {
        let _ = write!(out, "\n    {}", style(&operation.description).dim());
    }
    for param in &operation.params {
        let _ = write!(out, "\n    {}: {}", param.name, param.ty);
        if param.required {
            let _ = write!(out, " {}", style("required").yellow());
        }
        if let Some(default) = &param.default {
            let _ = write!(out, " = {}", default);
        }
        if !param.choices.is_empty() {
            let _ = write!(out, " [{}]", param.choices.join("|"));
        }
    }
    out
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
