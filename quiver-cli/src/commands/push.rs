//! `quiver push` command - Replace remote resources with the schema.

use std::path::Path;

use quiver_migrate::{MigrationError, existing_resources, push_schema};

use crate::cli::PushArgs;
use crate::commands::Project;
use crate::error::{CliError, CliResult};
use crate::output::{self, ConsoleObserver, success, warn};

/// Run the push command
pub async fn run(args: PushArgs, config_path: &Path) -> CliResult<()> {
    output::header("Push");

    let project = Project::load(config_path, args.schema.as_deref())?;
    let schema = project.schema()?;
    output::kv("Schema", &project.paths.schema.display().to_string());
    output::newline();

    let service = project.config.search_service()?;
    let existing = existing_resources(&schema, &service).await?;
    if !existing.is_empty() {
        output::section("Existing resources");
        for resource in &existing {
            output::list_item(&resource.to_string());
        }
        output::newline();

        if !args.force {
            return Err(CliError::Command(
                "resources would be overwritten; rerun with --force to replace them".to_string(),
            ));
        }
        warn("Replacing existing resources");
    }

    let secrets = project.config.secret_resolver()?;
    let report = match push_schema(&schema, &service, &secrets, &ConsoleObserver, args.force).await {
        Ok(report) => report,
        Err(MigrationError::WouldOverwrite(names)) => {
            return Err(CliError::Command(format!(
                "resources appeared while pushing: {}",
                names.join(", ")
            )));
        }
        Err(error) => return Err(error.into()),
    };

    output::newline();
    success(&format!(
        "Pushed {} resource(s), {} replaced",
        report.created.len(),
        report.replaced.len()
    ));
    output::dim("State was not changed; run `quiver pull` to record these resources");

    Ok(())
}
