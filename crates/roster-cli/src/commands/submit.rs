use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use roster_core::{BatchSubmitter, Fields};
use serde_json::Value;

use crate::cli::SubmitArgs;
use crate::client::{AppContext, CliError, CliResult, stage_error, submit_error};
use crate::commands::list::load_confirmed;
use crate::output::render_submit_result;

type RawRecord = BTreeMap<String, Value>;

pub(crate) async fn handle_submit(ctx: &AppContext, args: SubmitArgs) -> CliResult<()> {
    let records = read_records(&args.file)?;
    if records.is_empty() {
        return Err(CliError::validation(format!(
            "{} contains no records",
            args.file.display()
        )));
    }

    let mut workspace = ctx.workspace();
    load_confirmed(ctx, &mut workspace, args.kind).await?;

    let rejected: Vec<String> = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            workspace
                .stage(args.kind, Fields::from(record))
                .err()
                .map(|err| stage_error(index + 1, &err).display_message())
        })
        .collect();
    if !rejected.is_empty() {
        return Err(CliError::validation(format!(
            "{} records rejected; nothing submitted:\n  {}",
            rejected.len(),
            rejected.join("\n  ")
        )));
    }

    let submitter = BatchSubmitter::new(Arc::clone(&ctx.catalog));
    let result = submitter
        .submit(&mut workspace, args.kind)
        .await
        .map_err(|err| submit_error(&err))?;
    render_submit_result(&result, ctx.output)?;

    if result.failed.is_empty() {
        Ok(())
    } else {
        Err(CliError::failure(anyhow!(
            "{} of {} records were not confirmed: {}",
            result.failed.len(),
            result.failed.len() + result.confirmed.len(),
            result.failed_labels().join(", ")
        )))
    }
}

/// Read a JSON array or YAML sequence of field maps. Files ending in `.json`
/// are parsed strictly as JSON; anything else goes through the YAML parser.
pub(crate) fn read_records(path: &Path) -> CliResult<Vec<RawRecord>> {
    let raw = fs::read_to_string(path).map_err(|err| {
        CliError::validation(format!("failed to read {}: {err}", path.display()))
    })?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&raw).map_err(|err| {
            CliError::validation(format!("invalid JSON in {}: {err}", path.display()))
        })
    } else {
        serde_yaml::from_str(&raw).map_err(|err| {
            CliError::validation(format!("invalid YAML in {}: {err}", path.display()))
        })
    }
}
