//! CLI command implementations.

pub mod diff;
pub mod generate;
pub mod migrate;
pub mod pull;
pub mod push;
pub mod version;

use std::path::Path;

use quiver_migrate::{
    BuiltResource, JsonFileStateAdapter, MigrationConfig, MigrationEngine, MigrationFile,
    ResourceChanges,
};
use quiver_schema::Schema;

use crate::config::{Config, ProjectPaths};
use crate::error::CliResult;
use crate::output;

/// Config plus the paths derived from it.
#[derive(Debug, Clone)]
pub struct Project {
    /// Loaded configuration
    pub config: Config,
    /// Resolved paths
    pub paths: ProjectPaths,
}

impl Project {
    /// Load the config file and resolve paths.
    pub fn load(config_path: &Path, schema_override: Option<&Path>) -> CliResult<Self> {
        let config = Config::load_or_default(config_path)?;
        let paths = ProjectPaths::resolve(config_path, &config, schema_override);
        Ok(Self { config, paths })
    }

    /// Load and validate the schema file.
    pub fn schema(&self) -> CliResult<Schema> {
        let schema = Schema::from_file(&self.paths.schema)?;
        schema.validate()?;

        for warning in schema.dangling_references() {
            output::warn(&warning);
        }
        Ok(schema)
    }

    /// Build the migration engine over the JSON state file.
    pub fn engine(&self) -> MigrationEngine<JsonFileStateAdapter> {
        let config = MigrationConfig::new().migrations_dir(&self.paths.migrations);
        MigrationEngine::new(config, JsonFileStateAdapter::new(&self.paths.state))
    }
}

/// Print the creates and deletes of a migration file, grouped by kind.
pub fn print_changes(file: &MigrationFile) {
    print_kind("Data sources", &file.data_sources);
    print_kind("Indexes", &file.indexes);
    print_kind("Indexers", &file.indexers);
}

fn print_kind<T: BuiltResource>(label: &str, changes: &ResourceChanges<T>) {
    if changes.is_empty() {
        return;
    }

    output::section(label);
    let replaced = changes.replaced_names();
    for reference in &changes.delete {
        output::removed(&reference.name);
    }
    for resource in &changes.create {
        if replaced.contains(&resource.name()) {
            output::added(&format!("{} (modified)", resource.name()));
        } else {
            output::added(resource.name());
        }
    }
    output::newline();
}
