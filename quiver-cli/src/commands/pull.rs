//! `quiver pull` command - Record live resources in state.

use std::path::Path;

use crate::cli::PullArgs;
use crate::commands::Project;
use crate::error::CliResult;
use crate::output::{self, success};

/// Run the pull command
pub async fn run(args: PullArgs, config_path: &Path) -> CliResult<()> {
    output::header("Pull");

    let project = Project::load(config_path, None)?;
    output::kv("State", &project.paths.state.display().to_string());
    output::newline();

    let engine = project.engine();
    engine.initialize().await?;

    let service = project.config.search_service()?;
    let report = engine.pull(&service, args.force).await?;

    if !report.imported.is_empty() {
        output::section("Imported");
        for resource in &report.imported {
            output::added(&resource.to_string());
        }
        output::newline();
    }
    if !report.updated.is_empty() {
        output::section("Updated");
        for resource in &report.updated {
            output::added(&format!("{resource} (checksum refreshed)"));
        }
        output::newline();
    }

    if report.has_changes() {
        success(&report.summary());
    } else {
        output::info(&report.summary());
    }
    output::dim("Data sources are not pulled; declare them and generate a migration");

    Ok(())
}
