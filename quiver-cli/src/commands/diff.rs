//! `quiver diff` command - Show schema changes without writing a migration.

use std::path::Path;

use quiver_migrate::{Plan, StateAdapter, StateResources, generate_migration_file};

use crate::cli::DiffArgs;
use crate::commands::{Project, print_changes};
use crate::error::CliResult;
use crate::output::{self, success, warn};

/// Run the diff command
pub async fn run(args: DiffArgs, config_path: &Path) -> CliResult<()> {
    output::header("Diff");

    let project = Project::load(config_path, args.schema.as_deref())?;
    let schema = project.schema()?;
    let engine = project.engine();

    let pending = engine.pending().await?;
    if !pending.is_empty() {
        warn(&format!(
            "{} unapplied migration(s); state does not include them yet",
            pending.len()
        ));
        for name in &pending {
            output::list_item(name);
        }
        output::newline();
    }

    let state = StateResources::partition(engine.adapter().list_resources().await?);
    let plan = Plan::compute(&schema, &state)?;

    if plan.is_empty() {
        success("No changes");
        return Ok(());
    }

    output::info(&plan.summary());
    output::newline();
    print_changes(&generate_migration_file(&plan));

    Ok(())
}
