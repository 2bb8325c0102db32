//! CLI output formatting

use crate::core::run::{Run, RunStatus};
use crate::core::stage::{StageRecord, StageStatus};
use crate::orchestrator::PipelineEvent;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over the pipeline stages
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a stage status for display
pub fn format_stage_status(status: StageStatus) -> String {
    match status {
        StageStatus::Pending => style("PENDING").dim().to_string(),
        StageStatus::Running => style("RUNNING").yellow().to_string(),
        StageStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        StageStatus::Failed => style("FAILED").red().to_string(),
        StageStatus::Skipped => style("SKIPPED").dim().to_string(),
    }
}

/// Format a run status for display
pub fn format_run_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format one stage record as a history line
pub fn format_stage_record(record: &StageRecord) -> String {
    let icon = match record.status {
        StageStatus::Succeeded => CHECK,
        StageStatus::Failed => CROSS,
        StageStatus::Running => SPINNER,
        _ => INFO,
    };

    let mut line = format!(
        "{} {} - {}",
        icon,
        style(record.stage.as_str()).bold(),
        format_stage_status(record.status)
    );

    if let (Some(started), Some(ended)) = (record.started_at, record.ended_at) {
        if let Ok(duration) = ended.signed_duration_since(started).to_std() {
            line.push_str(&format!(" ({})", style(format_duration(duration)).dim()));
        }
    }

    if let Some(error) = &record.error {
        line.push_str(&format!("\n    {}", style(error).red()));
    }

    line
}

/// Format a run summary line for the history listing
pub fn format_run_summary(run: &Run) -> String {
    let icon = match run.status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Running => SPINNER,
        _ => INFO,
    };

    let satisfied = run
        .stage_records()
        .iter()
        .filter(|r| matches!(r.status, StageStatus::Succeeded | StageStatus::Skipped))
        .count();

    format!(
        "{} {} - {} ({}/3 stages)",
        icon,
        style(run.id.as_str()).bold(),
        format_run_status(run.status),
        satisfied
    )
}

/// Format a pipeline event for display
pub fn format_pipeline_event(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::RunStarted { run_id, .. } => {
            format!("{} Starting run {}", ROCKET, style(run_id.as_str()).bold())
        }
        PipelineEvent::StageSkipped { stage } => {
            format!("{} {} (skipped)", INFO, style(stage.as_str()).dim())
        }
        PipelineEvent::StageStarted { stage } => {
            format!("{} {}", SPINNER, style(stage.as_str()).cyan())
        }
        PipelineEvent::StageCompleted {
            stage,
            elapsed_secs,
        } => format!(
            "{} {} ({})",
            CHECK,
            style(stage.as_str()).green(),
            style(format!("{elapsed_secs:.1}s")).dim()
        ),
        PipelineEvent::StageFailed { stage, error } => {
            format!("{} {}: {}", CROSS, style(stage.as_str()).red(), style(error).dim())
        }
        PipelineEvent::RunCompleted { run_id, status } => format!(
            "{} Run {} {}",
            INFO,
            style(run_id.as_str()).dim(),
            format_run_status(*status)
        ),
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
