//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use roster_core::{Entity, IdClass, JobProgress, MergeSummary, SubmitResult};
use roster_events::Event;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_records<'a, I>(records: I, format: OutputFormat) -> CliResult<()>
where
    I: IntoIterator<Item = &'a Entity>,
{
    let records: Vec<&Entity> = records.into_iter().collect();
    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => {
            println!("{:<16} {:<10} {:<9} NAME", "ID", "KIND", "STATE");
            for entity in records {
                println!(
                    "{:<16} {:<10} {:<9} {}",
                    entity.id.to_string(),
                    entity.kind.slug(),
                    state_to_str(entity),
                    entity.label()
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn render_submit_result(result: &SubmitResult, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(result)?,
        OutputFormat::Table => {
            render_records(&result.confirmed, format)?;
            let failed = result.failed_labels();
            println!("confirmed: {}", result.confirmed.len());
            if !failed.is_empty() {
                println!("failed: {}", failed.join(", "));
            }
        }
    }
    Ok(())
}

pub(crate) fn render_merge(job: &str, summary: &MergeSummary) {
    if summary.changed() {
        eprintln!(
            "{job}: merged results ({} updated, {} appended)",
            summary.updated, summary.appended
        );
    }
}

pub(crate) fn render_job_summary(job: &str, progress: Option<&JobProgress>) {
    let Some(progress) = progress else {
        eprintln!("{job}: no status received");
        return;
    };
    eprintln!(
        "{job}: {:.1}% complete, {} queued",
        progress.completed_percentage, progress.queued_count
    );
    for (status, count) in &progress.status_summary {
        eprintln!("  {status:<12} {count}");
    }
}

pub(crate) fn render_notification(event: &Event) -> String {
    let level = if event.is_failure() { "warn" } else { "info" };
    let message = match event {
        Event::RecordStaged { kind, label } => format!("staged {kind} '{label}'"),
        Event::StageRejected { kind, reason } => format!("{kind} not staged: {reason}"),
        Event::SubmissionConfirmed { kind, count } => {
            format!("{count} {kind} records confirmed")
        }
        Event::SubmissionPartial {
            kind,
            confirmed,
            failed,
        } => format!(
            "{confirmed} {kind} records confirmed; failed: {}",
            failed.join(", ")
        ),
        Event::SubmissionRejected { kind, conflicts } => format!(
            "{kind} submission rejected; duplicates: {}",
            conflicts.join(", ")
        ),
        Event::SubmissionFailed {
            kind,
            restored,
            message,
        } => format!("{kind} submission failed, {restored} restored to staging: {message}"),
        Event::JobProgress {
            job,
            queued,
            completed_percentage,
        } => format!("{job}: {completed_percentage:.1}% complete, {queued} queued"),
        Event::PollFailed {
            job,
            consecutive,
            message,
        } => format!("{job}: status check failed ({consecutive} in a row): {message}"),
        Event::PollEscalated { job, consecutive } => format!(
            "{job}: status checks failed {consecutive} times in a row; still retrying"
        ),
        Event::JobCompleted {
            job,
            cleanup_succeeded,
        } => {
            if *cleanup_succeeded {
                format!("{job}: completed")
            } else {
                format!("{job}: completed, cleanup failed")
            }
        }
    };
    format!("[{level}] {message}")
}

const fn state_to_str(entity: &Entity) -> &'static str {
    match (entity.is_staged, entity.id.class()) {
        (true, _) => "staged",
        (false, IdClass::Temporary) => "pending",
        (false, IdClass::Stable) => "confirmed",
    }
}
