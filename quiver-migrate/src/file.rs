//! Migration file building and management.
//!
//! A migration file is an immutable JSON artifact holding, for each resource
//! kind, the built resources to create and the references to delete. Files
//! live in one directory and are named `<yyyyMMddHHmmss>-<slug>.json`, so a
//! plain lexicographic sort is also the apply order.

use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use quiver_schema::{DataSourceConnection, SearchIndex, SearchIndexer};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::checksum::migration_checksum;
use crate::diff::{BuiltResource, DeclaredResource, MigrationActions, Plan};
use crate::error::{MigrateResult, MigrationError};
use crate::resource::{ResourceRef, ResourceType};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const TIMESTAMP_LEN: usize = 14;

/// Creates and deletes for one resource kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceChanges<T> {
    /// Built resources to create.
    pub create: Vec<T>,
    /// Resources to delete.
    pub delete: Vec<ResourceRef>,
}

impl<T> Default for ResourceChanges<T> {
    fn default() -> Self {
        Self {
            create: Vec::new(),
            delete: Vec::new(),
        }
    }
}

impl<T> ResourceChanges<T> {
    /// Check if there is nothing to create or delete.
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.delete.is_empty()
    }
}

impl<T: BuiltResource> ResourceChanges<T> {
    fn from_actions<D>(actions: &MigrationActions<D>) -> Self
    where
        D: DeclaredResource<Built = T>,
    {
        let create = actions
            .create
            .iter()
            .map(DeclaredResource::build)
            .chain(actions.update.iter().map(|(built, _)| built.clone()))
            .collect();

        let delete = actions
            .delete
            .iter()
            .chain(actions.update.iter().map(|(_, stale)| stale))
            .map(ResourceRef::from)
            .collect();

        Self { create, delete }
    }

    /// Names that are both deleted and created, i.e. replaced.
    pub fn replaced_names(&self) -> Vec<&str> {
        self.create
            .iter()
            .map(BuiltResource::name)
            .filter(|name| self.delete.iter().any(|r| r.name == *name))
            .collect()
    }

    fn check_kinds(&self) -> MigrateResult<()> {
        match self.delete.iter().find(|r| r.kind != T::KIND) {
            Some(r) => Err(MigrationError::migration_file(format!(
                "{} listed under {}",
                r,
                T::KIND.plural()
            ))),
            None => Ok(()),
        }
    }
}

/// The content of a migration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MigrationFile {
    /// Index changes.
    pub indexes: ResourceChanges<SearchIndex>,
    /// Indexer changes.
    pub indexers: ResourceChanges<SearchIndexer>,
    /// Data source changes.
    pub data_sources: ResourceChanges<DataSourceConnection>,
}

impl MigrationFile {
    /// Check if every kind is empty.
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty() && self.indexers.is_empty() && self.data_sources.is_empty()
    }

    /// Parse and validate migration file content.
    pub fn parse(content: &str) -> MigrateResult<Self> {
        let file: Self = serde_json::from_str(content)
            .map_err(|e| MigrationError::migration_file(e.to_string()))?;
        file.validate()?;
        Ok(file)
    }

    /// Check that delete references sit under their own kind.
    pub fn validate(&self) -> MigrateResult<()> {
        self.indexes.check_kinds()?;
        self.indexers.check_kinds()?;
        self.data_sources.check_kinds()
    }

    /// Delete references of one kind.
    pub fn deletes(&self, kind: ResourceType) -> &[ResourceRef] {
        match kind {
            ResourceType::Index => &self.indexes.delete,
            ResourceType::Indexer => &self.indexers.delete,
            ResourceType::DataSource => &self.data_sources.delete,
        }
    }

    /// Total number of creates and deletes.
    pub fn operation_count(&self) -> usize {
        self.indexes.create.len()
            + self.indexes.delete.len()
            + self.indexers.create.len()
            + self.indexers.delete.len()
            + self.data_sources.create.len()
            + self.data_sources.delete.len()
    }
}

/// Build a migration file from a plan.
///
/// Updates contribute their new built form to `create` and their stale record
/// to `delete`. Store identifiers never reach the file.
pub fn generate_migration_file(plan: &Plan) -> MigrationFile {
    MigrationFile {
        indexes: ResourceChanges::from_actions(&plan.indexes),
        indexers: ResourceChanges::from_actions(&plan.indexers),
        data_sources: ResourceChanges::from_actions(&plan.data_sources),
    }
}

/// A migration file read from disk.
#[derive(Debug, Clone)]
pub struct LocalMigration {
    /// File name, e.g. `20241002131556-imperial-dragonfly.json`.
    pub name: String,
    /// Path to the file.
    pub path: PathBuf,
    /// Parsed content.
    pub file: MigrationFile,
    /// Content checksum.
    pub checksum: String,
}

/// Migration file reader/writer.
pub struct MigrationFileManager {
    /// Directory where migrations are stored.
    migrations_dir: PathBuf,
}

impl MigrationFileManager {
    /// Create a new file manager.
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    /// Get the migrations directory.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Ensure the migrations directory exists.
    pub async fn ensure_dir(&self) -> MigrateResult<()> {
        tokio::fs::create_dir_all(&self.migrations_dir).await?;
        Ok(())
    }

    /// List migration file names in apply order.
    ///
    /// Files that do not follow the naming convention are skipped.
    pub async fn list_migration_names(&self) -> MigrateResult<Vec<String>> {
        let mut names = Vec::new();

        if !tokio::fs::try_exists(&self.migrations_dir).await? {
            return Ok(names);
        }

        let mut entries = tokio::fs::read_dir(&self.migrations_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };

            if parse_migration_name(&name).is_ok() {
                names.push(name);
            } else {
                tracing::warn!(file = %name, "skipping file that is not a migration");
            }
        }

        // Timestamp prefixes make this chronological
        names.sort();
        Ok(names)
    }

    /// Read and checksum one migration file.
    pub async fn read_migration(&self, name: &str) -> MigrateResult<LocalMigration> {
        let path = self.migrations_dir.join(name);
        let content = tokio::fs::read_to_string(&path).await?;
        let file = MigrationFile::parse(&content).map_err(|e| {
            MigrationError::migration_file(format!("{name}: {e}"))
        })?;
        let checksum = migration_checksum(&file)?;

        Ok(LocalMigration {
            name: name.to_string(),
            path,
            file,
            checksum,
        })
    }

    /// Read every migration file in order.
    pub async fn list_migrations(&self) -> MigrateResult<Vec<LocalMigration>> {
        let mut migrations = Vec::new();
        for name in self.list_migration_names().await? {
            migrations.push(self.read_migration(&name).await?);
        }
        Ok(migrations)
    }

    /// Write a new migration file and return its name and path.
    ///
    /// The file name is timestamped so it sorts after every existing
    /// migration. Existing files are never overwritten.
    pub async fn write_migration(
        &self,
        migration: &MigrationFile,
        name: Option<&str>,
    ) -> MigrateResult<(String, PathBuf)> {
        self.ensure_dir().await?;

        let existing = self.list_migration_names().await?;
        let timestamp = next_timestamp(existing.last().map(String::as_str), Utc::now().naive_utc())?;
        let slug = name.map(slugify).filter(|s| !s.is_empty()).unwrap_or_else(random_slug);
        let file_name = format!("{timestamp}-{slug}.json");
        let path = self.migrations_dir.join(&file_name);

        let mut content = serde_json::to_vec_pretty(migration)?;
        content.push(b'\n');

        let mut out = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        out.write_all(&content).await?;
        out.flush().await?;

        tracing::info!(file = %file_name, "wrote migration");
        Ok((file_name, path))
    }
}

/// Pick the timestamp for a new migration.
///
/// Uses `now` unless the newest existing migration is at or after it, in
/// which case the newest timestamp plus one second is used.
fn next_timestamp(newest: Option<&str>, now: NaiveDateTime) -> MigrateResult<String> {
    let now = now.format(TIMESTAMP_FORMAT).to_string();

    let Some(newest) = newest else {
        return Ok(now);
    };
    let (last, _) = parse_migration_name(newest)?;
    if last.as_str() < now.as_str() {
        return Ok(now);
    }

    let last = NaiveDateTime::parse_from_str(&last, TIMESTAMP_FORMAT)
        .map_err(|e| MigrationError::migration_file(format!("{newest}: {e}")))?;
    Ok((last + chrono::Duration::seconds(1))
        .format(TIMESTAMP_FORMAT)
        .to_string())
}

/// Parse a migration file name into (timestamp, slug).
pub fn parse_migration_name(name: &str) -> MigrateResult<(String, String)> {
    // Expected format: YYYYMMDDHHMMSS-slug.json
    let stem = name.strip_suffix(".json").ok_or_else(|| {
        MigrationError::InvalidMigration(format!("Migration file must be JSON: {name}"))
    })?;

    let Some((timestamp, slug)) = stem.split_once('-') else {
        return Err(MigrationError::InvalidMigration(format!(
            "Invalid migration name format: {name}"
        )));
    };

    if timestamp.len() != TIMESTAMP_LEN || !timestamp.chars().all(|c| c.is_ascii_digit()) {
        return Err(MigrationError::InvalidMigration(format!(
            "Invalid migration timestamp: {timestamp}"
        )));
    }

    if slug.is_empty() {
        return Err(MigrationError::InvalidMigration(format!(
            "Missing migration slug: {name}"
        )));
    }

    Ok((timestamp.to_string(), slug.to_string()))
}

/// Normalise a user-supplied migration name into a slug.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

const ADJECTIVES: &[&str] = &[
    "amber", "brave", "calm", "dapper", "eager", "fancy", "gentle", "hidden", "imperial",
    "jolly", "keen", "lively", "mellow", "nimble", "olive", "proud", "quiet", "rapid",
    "silent", "tidy", "upbeat", "vivid", "witty", "zesty",
];

const ANIMALS: &[&str] = &[
    "badger", "bison", "crane", "dingo", "dragonfly", "egret", "falcon", "gecko", "heron",
    "ibis", "jackal", "koala", "lemur", "marmot", "newt", "otter", "panda", "quokka",
    "raven", "salmon", "tapir", "urchin", "walrus", "yak",
];

/// A random `adjective-animal` slug.
pub fn random_slug() -> String {
    let bytes = *uuid::Uuid::new_v4().as_bytes();
    let adjective = ADJECTIVES[bytes[0] as usize % ADJECTIVES.len()];
    let animal = ANIMALS[bytes[1] as usize % ANIMALS.len()];
    format!("{adjective}-{animal}")
}
