use roster_core::{CatalogService, EntityKind, Workspace};

use crate::cli::ListArgs;
use crate::client::{AppContext, CliResult, catalog_error};
use crate::output::render_records;

pub(crate) async fn handle_list(ctx: &AppContext, args: ListArgs) -> CliResult<()> {
    let mut workspace = ctx.workspace();
    load_confirmed(ctx, &mut workspace, args.kind).await?;
    render_records(workspace.collection().of_kind(args.kind), ctx.output)
}

/// Replace the workspace's confirmed records of `kind` with the catalog listing.
pub(crate) async fn load_confirmed(
    ctx: &AppContext,
    workspace: &mut Workspace,
    kind: EntityKind,
) -> CliResult<()> {
    let records = ctx
        .catalog
        .list(kind)
        .await
        .map_err(|err| catalog_error(&err))?;
    tracing::debug!(kind = %kind, count = records.len(), "confirmed records loaded");
    workspace.load_confirmed(kind, records);
    Ok(())
}
