use std::sync::Arc;

use anyhow::anyhow;
use roster_client::HttpJobStatus;
use roster_core::{JobPoller, MemorySessionStore, PollApplied, Session};

use crate::cli::JobWatchArgs;
use crate::client::{AppContext, CliError, CliResult};
use crate::commands::list::load_confirmed;
use crate::output::{render_job_summary, render_merge, render_records};

enum WatchEnd {
    Finished { cleanup_succeeded: bool },
    Interrupted,
    Closed,
}

pub(crate) async fn handle_job_watch(ctx: &AppContext, args: JobWatchArgs) -> CliResult<()> {
    let mut session = Session::begin(MemorySessionStore::new(), ctx.workspace());
    if args.preload {
        load_confirmed(ctx, session.workspace_mut(), args.kind).await?;
    }
    session.set_active_job(&args.job);

    let source = Arc::new(HttpJobStatus::new(
        Arc::clone(&ctx.transport),
        args.job.clone(),
        args.kind,
    ));
    let mut poller = JobPoller::new(source, ctx.poll)
        .with_events(ctx.bus.clone())
        .with_metrics(ctx.metrics.clone());
    let mut feed = poller
        .start()
        .ok_or_else(|| CliError::failure(anyhow!("job {} is already being polled", args.job)))?;

    let end = loop {
        tokio::select! {
            event = feed.recv() => {
                let Some(event) = event else {
                    break WatchEnd::Closed;
                };
                let applied = session.workspace_mut().apply_poll_event(event);
                ctx.flush_notifications();
                match applied {
                    PollApplied::Merged(summary) => render_merge(&args.job, &summary),
                    PollApplied::Failed | PollApplied::Escalated => {}
                    PollApplied::Finished { cleanup_succeeded } => {
                        break WatchEnd::Finished { cleanup_succeeded };
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                poller.stop();
                break WatchEnd::Interrupted;
            }
        }
    };

    session.clear_active_job();
    render_job_summary(&args.job, session.workspace().job_progress());
    render_records(session.workspace().collection().iter(), ctx.output)?;

    match end {
        WatchEnd::Finished {
            cleanup_succeeded: true,
        } => Ok(()),
        WatchEnd::Finished {
            cleanup_succeeded: false,
        } => Err(CliError::failure(anyhow!(
            "job {} completed but cleanup failed",
            args.job
        ))),
        WatchEnd::Interrupted => Err(CliError::failure(anyhow!(
            "stopped watching job {} before it completed",
            args.job
        ))),
        WatchEnd::Closed => Err(CliError::failure(anyhow!(
            "poll loop for job {} ended unexpectedly",
            args.job
        ))),
    }
}
