//! CLI output formatting

use crate::core::{LoadState, Pipeline, PipelineStatus, StepStatus};
use crate::store::{MutationOutcome, StoreEvent};
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

/// Width of the inline progress gauge
const GAUGE_WIDTH: usize = 20;

/// Create a spinner shown while pipelines are being fetched
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format a step status for display
pub fn format_step_status(status: StepStatus) -> String {
    match status {
        StepStatus::NotStarted => style("NOT STARTED").dim().to_string(),
        StepStatus::Running => style("RUNNING").yellow().to_string(),
        StepStatus::Error => style("ERROR").red().to_string(),
        StepStatus::Done => style("DONE").green().to_string(),
    }
}

/// Format the store load state for display
pub fn format_load_state(state: LoadState) -> String {
    match state {
        LoadState::Idle => style("IDLE").dim().to_string(),
        LoadState::Loading => style("LOADING").yellow().to_string(),
        LoadState::Loaded => style("LOADED").green().to_string(),
        LoadState::Failed => style("FAILED").red().to_string(),
    }
}

/// Render a fixed-width gauge of finished steps
pub fn format_gauge(status: &PipelineStatus) -> String {
    if status.total == 0 {
        return style("-".repeat(GAUGE_WIDTH)).dim().to_string();
    }
    let cells = |n: usize| n * GAUGE_WIDTH / status.total;
    let done = cells(status.done);
    let error = cells(status.error);
    let running = cells(status.running);
    let rest = GAUGE_WIDTH.saturating_sub(done + error + running);

    format!(
        "{}{}{}{}",
        style("#".repeat(done)).green(),
        style("#".repeat(error)).red(),
        style(">".repeat(running)).yellow(),
        style("-".repeat(rest)).dim()
    )
}

/// Format one pipeline's aggregate for display
pub fn format_pipeline(pipeline: &Pipeline) -> String {
    let status = &pipeline.status;
    let icon = if status.error > 0 {
        CROSS
    } else if status.running > 0 {
        SPINNER
    } else if status.is_complete() {
        CHECK
    } else {
        INFO
    };

    format!(
        "{} {} [{}] {}/{} done, {} running, {} error",
        icon,
        style(&pipeline.pipeline_file).bold(),
        format_gauge(status),
        style(status.done).green(),
        status.total,
        style(status.running).yellow(),
        style(status.error).red()
    )
}

/// Format the steps of a pipeline, one line each
pub fn format_steps(pipeline: &Pipeline) -> Vec<String> {
    pipeline
        .stages
        .iter()
        .flat_map(|stage| {
            stage.steps.iter().map(move |step| {
                format!(
                    "    {} / {}: {}",
                    style(&stage.name).dim(),
                    style(&step.name).cyan(),
                    format_step_status(step.status)
                )
            })
        })
        .collect()
}

/// Format a store event for display
pub fn format_store_event(event: &StoreEvent) -> String {
    let target = event
        .pipeline_id
        .as_deref()
        .map(|id| format!(" {}", style(id).bold()))
        .unwrap_or_default();

    match &event.outcome {
        MutationOutcome::Applied => format!("{} {}{}", CHECK, style(event.command).cyan(), target),
        MutationOutcome::PipelineNotFound { pipeline_file } => format!(
            "{} {}: no pipeline {}",
            WARN,
            style(event.command).yellow(),
            style(pipeline_file).dim()
        ),
        MutationOutcome::StepNotFound { pipeline_file, step } => format!(
            "{} {}: no step {} in {}",
            WARN,
            style(event.command).yellow(),
            style(step).dim(),
            style(pipeline_file).dim()
        ),
    }
}
