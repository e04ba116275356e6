//! `quiver migrate` commands - Apply migrations and inspect their status.

use std::path::Path;

use quiver_migrate::{RecordStatus, ValidationStatus, detect_drift};

use crate::cli::{MigrateApplyArgs, MigrateArgs, MigrateStatusArgs, MigrateSubcommand};
use crate::commands::Project;
use crate::error::{CliError, CliResult};
use crate::output::{self, ConsoleObserver, success, warn};

/// Run the migrate command
pub async fn run(args: MigrateArgs, config_path: &Path) -> CliResult<()> {
    match args.command {
        MigrateSubcommand::Apply(apply_args) => run_apply(apply_args, config_path).await,
        MigrateSubcommand::Status(status_args) => run_status(status_args, config_path).await,
    }
}

/// Run `quiver migrate apply` - apply every pending migration
async fn run_apply(args: MigrateApplyArgs, config_path: &Path) -> CliResult<()> {
    output::header("Migrate Apply");

    let project = Project::load(config_path, args.schema.as_deref())?;
    output::kv("Migrations", &project.paths.migrations.display().to_string());
    output::kv("State", &project.paths.state.display().to_string());
    output::newline();

    let engine = project.engine();
    engine.initialize().await?;

    let status = engine.status().await?;
    let blocking = status.blocking();
    if !blocking.is_empty() {
        for result in &blocking {
            output::list_item(&format!(
                "{} {}",
                result.name,
                output::style_error(describe(result.status))
            ));
        }
        output::newline();
        return Err(CliError::Command(
            "migration history does not match local files; nothing was applied".to_string(),
        ));
    }

    if status.pending.is_empty() {
        success("No pending migrations to apply.");
        return Ok(());
    }

    output::section(&format!("{} pending migration(s)", status.pending.len()));
    for name in &status.pending {
        output::list_item(name);
    }

    if args.dry_run {
        output::newline();
        output::info("Dry run, nothing was applied");
        return Ok(());
    }

    let service = project.config.search_service()?;
    let secrets = project.config.secret_resolver()?;
    let result = engine.migrate(&service, &secrets, &ConsoleObserver).await?;

    output::newline();
    if let Some(failed) = result.failed {
        if let Some(rollback) = &failed.rollback {
            for (resource, reason) in &rollback.failures {
                warn(&format!("{resource} may still exist remotely: {reason}"));
            }
        }
        if !result.applied.is_empty() {
            output::info(&format!(
                "{} migration(s) were applied before the failure",
                result.applied.len()
            ));
        }
        return Err(failed.into_error().into());
    }

    success(&format!("Applied {} migration(s)", result.applied.len()));
    output::dim(&result.summary());

    Ok(())
}

/// Run `quiver migrate status` - show migration status
async fn run_status(args: MigrateStatusArgs, config_path: &Path) -> CliResult<()> {
    output::header("Migration Status");

    let project = Project::load(config_path, args.schema.as_deref())?;
    let engine = project.engine();
    let status = engine.status().await?;

    if status.local.is_empty() && status.records.is_empty() {
        output::info("No migrations found");
    } else {
        output::section("Migrations");
        for name in &status.local {
            let marker = match (
                status.validation_status(name),
                status.record(name).map(|r| r.status()),
            ) {
                (Some(ValidationStatus::ChecksumMismatch), _) => {
                    output::style_error("checksum mismatch")
                }
                (_, Some(RecordStatus::Succeeded)) => output::style_success("applied"),
                (_, Some(RecordStatus::Failed)) => output::style_error("failed"),
                (_, Some(RecordStatus::InProgress)) => output::style_pending("in progress"),
                (_, None) => output::style_pending("pending"),
            };
            output::list_item(&format!("{name} {marker}"));

            if let Some(logs) = status.record(name).and_then(|r| r.logs.as_deref()) {
                output::dim(&format!("      {logs}"));
            }
        }

        for result in &status.validation {
            if result.status == ValidationStatus::MissingLocally {
                output::list_item(&format!(
                    "{} {}",
                    result.name,
                    output::style_error("missing locally")
                ));
            }
        }
        output::newline();
    }

    output::info(&status.summary());

    if args.remote {
        output::newline();
        output::section("Remote");
        let service = project.config.search_service()?;
        let drift = detect_drift(engine.adapter(), &service).await?;

        if drift.is_clean() {
            success("State matches the search service");
        }
        for resource in &drift.untracked {
            warn(&format!("{resource} exists remotely but is not in state"));
        }
        for resource in &drift.missing {
            warn(&format!("{resource} is in state but missing remotely"));
        }
    }

    Ok(())
}

fn describe(status: ValidationStatus) -> &'static str {
    match status {
        ValidationStatus::Valid => "valid",
        ValidationStatus::ChecksumMismatch => "changed after it was applied",
        ValidationStatus::MissingInState => "pending",
        ValidationStatus::MissingLocally => "recorded in state but missing locally",
    }
}
