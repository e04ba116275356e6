//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CONFIG_FILE_NAME;

/// Quiver CLI - Schema-driven migrations for search services
#[derive(Parser, Debug)]
#[command(name = "quiver")]
#[command(version)]
#[command(about = "Quiver CLI - Schema-driven migrations for search services", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a migration file from schema changes
    Generate(GenerateArgs),

    /// Show schema changes without writing a migration
    Diff(DiffArgs),

    /// Apply migrations and inspect migration status
    Migrate(MigrateArgs),

    /// Replace remote resources with the schema, bypassing migrations
    Push(PushArgs),

    /// Record live indexes and indexers in state
    Pull(PullArgs),

    /// Display version information
    Version,
}

// =============================================================================
// Generate Command
// =============================================================================

/// Arguments for the `generate` command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Name for the migration (a random name is used when omitted)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Path to schema file
    #[arg(short, long)]
    pub schema: Option<PathBuf>,
}

// =============================================================================
// Diff Command
// =============================================================================

/// Arguments for the `diff` command
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Path to schema file
    #[arg(short, long)]
    pub schema: Option<PathBuf>,
}

// =============================================================================
// Migrate Command
// =============================================================================

/// Arguments for the `migrate` command
#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[command(subcommand)]
    pub command: MigrateSubcommand,
}

/// Migrate subcommands
#[derive(Subcommand, Debug)]
pub enum MigrateSubcommand {
    /// Apply every pending migration in order
    Apply(MigrateApplyArgs),

    /// Show migration status
    Status(MigrateStatusArgs),
}

/// Arguments for `migrate apply`
#[derive(Args, Debug)]
pub struct MigrateApplyArgs {
    /// List pending migrations without applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Path to schema file; migrations are read from its directory
    #[arg(short, long)]
    pub schema: Option<PathBuf>,
}

/// Arguments for `migrate status`
#[derive(Args, Debug)]
pub struct MigrateStatusArgs {
    /// Also compare state with the live search service
    #[arg(long)]
    pub remote: bool,

    /// Path to schema file; migrations are read from its directory
    #[arg(short, long)]
    pub schema: Option<PathBuf>,
}

// =============================================================================
// Push Command
// =============================================================================

/// Arguments for the `push` command
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Replace resources that already exist on the service
    #[arg(short, long)]
    pub force: bool,

    /// Path to schema file
    #[arg(short, long)]
    pub schema: Option<PathBuf>,
}

// =============================================================================
// Pull Command
// =============================================================================

/// Arguments for the `pull` command
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Refresh checksums of resources already in state
    #[arg(short, long)]
    pub force: bool,
}
