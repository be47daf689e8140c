//! Argument parsing, configuration layering and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use roster_config::{ConfigLoader, RosterConfig};
use roster_core::EntityKind;
use roster_telemetry::{LogFormat, LoggingConfig, init_logging, log_format_from_config};

use crate::client::{AppContext, CliError, CliResult};
use crate::commands::jobs::handle_job_watch;
use crate::commands::list::handle_list;
use crate::commands::submit::handle_submit;

/// Parses CLI arguments, executes the requested command and prints any
/// pending notifications. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let print_metrics = cli.print_metrics;

    let ctx = match prepare(&cli) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };

    let result = dispatch(cli.command, &ctx).await;
    ctx.flush_notifications();

    if print_metrics {
        match ctx.metrics.render() {
            Ok(text) => print!("{text}"),
            Err(err) => eprintln!("warning: failed to render metrics: {err}"),
        }
    }

    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

fn prepare(cli: &Cli) -> CliResult<AppContext> {
    let config = load_config(cli)?;
    let format =
        log_format_from_config(config.logging.format.as_deref()).unwrap_or_else(LogFormat::infer);
    if let Err(err) = init_logging(&LoggingConfig {
        level: &config.logging.level,
        format,
        build_sha: option_env!("ROSTER_BUILD_SHA").unwrap_or("dev"),
    }) {
        eprintln!("warning: logging disabled: {err}");
    }
    tracing::debug!(build = roster_telemetry::build_sha(), api = %config.api.url, "roster starting");
    AppContext::from_config(&config, cli.output)
}

fn load_config(cli: &Cli) -> CliResult<RosterConfig> {
    let mut loader = ConfigLoader::from_process_env();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let mut config = loader
        .load()
        .map_err(|err| CliError::validation(format!("configuration error: {}", err.detail())))?;

    if let Some(url) = &cli.api_url {
        config.api.url.clone_from(url);
    }
    if let Some(key) = &cli.api_key {
        config.api.api_key = Some(key.clone());
    }
    if let Some(timeout) = cli.timeout {
        config.api.timeout_secs = timeout;
    }
    if let Some(interval) = cli.poll_interval_ms {
        config.polling.interval_ms = interval;
    }
    roster_config::validate(&config)
        .map_err(|err| CliError::validation(format!("configuration error: {}", err.detail())))?;
    Ok(config)
}

async fn dispatch(command: Command, ctx: &AppContext) -> CliResult<()> {
    match command {
        Command::Ls(args) => handle_list(ctx, args).await,
        Command::Submit(args) => handle_submit(ctx, args).await,
        Command::Job(JobCommand::Watch(args)) => handle_job_watch(ctx, args).await,
    }
}

/// Parse an entity kind from its slug or collection path.
pub(crate) fn parse_kind(input: &str) -> Result<EntityKind, String> {
    input.parse::<EntityKind>().map_err(|err| {
        format!(
            "unknown kind '{}' (expected unit, sub-unit, grouping, item or person)",
            err.value
        )
    })
}

#[derive(Parser)]
#[command(name = "roster", about = "Stage, submit and watch Roster catalog batches")]
pub(crate) struct Cli {
    #[arg(long, global = true, env = "ROSTER_CONFIG", help = "YAML configuration file")]
    pub(crate) config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the catalog base URL")]
    pub(crate) api_url: Option<String>,
    #[arg(long, global = true, help = "Override the key_id:secret credential")]
    pub(crate) api_key: Option<String>,
    #[arg(long, global = true, help = "Override the HTTP timeout in seconds")]
    pub(crate) timeout: Option<u64>,
    #[arg(long, global = true, help = "Override the job poll interval in milliseconds")]
    pub(crate) poll_interval_ms: Option<u64>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[arg(long, global = true, help = "Print Prometheus metrics before exiting")]
    pub(crate) print_metrics: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// List confirmed records of one kind.
    #[command(alias = "list")]
    Ls(ListArgs),
    /// Stage records from a JSON or YAML file and submit them in bulk.
    Submit(SubmitArgs),
    /// Background job operations.
    #[command(subcommand)]
    Job(JobCommand),
}

#[derive(Subcommand)]
pub(crate) enum JobCommand {
    /// Poll a job until it completes, merging its results.
    Watch(JobWatchArgs),
}

#[derive(Args)]
pub(crate) struct ListArgs {
    #[arg(long, value_parser = parse_kind)]
    pub(crate) kind: EntityKind,
}

#[derive(Args)]
pub(crate) struct SubmitArgs {
    #[arg(long, value_parser = parse_kind)]
    pub(crate) kind: EntityKind,
    #[arg(long, help = "JSON array or YAML list of records")]
    pub(crate) file: PathBuf,
}

#[derive(Args)]
pub(crate) struct JobWatchArgs {
    pub(crate) job: String,
    #[arg(long, value_parser = parse_kind, default_value = "item")]
    pub(crate) kind: EntityKind,
    #[arg(long, help = "Load confirmed records of the kind before polling")]
    pub(crate) preload: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}
