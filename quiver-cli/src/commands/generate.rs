//! `quiver generate` command - Write a migration file from schema changes.

use std::path::Path;

use quiver_migrate::GenerateOutcome;

use crate::cli::GenerateArgs;
use crate::commands::{Project, print_changes};
use crate::error::CliResult;
use crate::output::{self, success};

/// Run the generate command
pub async fn run(args: GenerateArgs, config_path: &Path) -> CliResult<()> {
    output::header("Generate Migration");

    let project = Project::load(config_path, args.schema.as_deref())?;
    output::kv("Schema", &project.paths.schema.display().to_string());
    output::kv("Migrations", &project.paths.migrations.display().to_string());
    output::newline();

    let schema = project.schema()?;
    let engine = project.engine();
    engine.initialize().await?;

    match engine.generate(&schema, args.name.as_deref()).await? {
        GenerateOutcome::NoChanges => {
            success("No changes to apply");
        }
        GenerateOutcome::Written { name, file, .. } => {
            success(&format!("Created migration file {name}"));
            output::newline();
            print_changes(&file);
            output::dim("Run `quiver migrate apply` to apply it");
        }
    }

    Ok(())
}
