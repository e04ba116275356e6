//! Migration history tracking.
//!
//! Compares the local migration directory against the migration records in
//! the state store to find pending migrations and detect tampering.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MigrateResult;
use crate::file::{LocalMigration, MigrationFileManager};
use crate::state::StateAdapter;

/// A record of a started, succeeded or failed migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    /// Identifier assigned by the state store.
    pub id: String,
    /// Migration file name.
    pub migration_name: String,
    /// Checksum of the migration content when it was started. Never
    /// overwritten.
    pub checksum: String,
    /// When the migration was started.
    pub started_at: DateTime<Utc>,
    /// When the migration succeeded.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Error detail for a failed migration.
    #[serde(default)]
    pub logs: Option<String>,
}

impl MigrationRecord {
    /// Derive the record's status.
    pub fn status(&self) -> RecordStatus {
        if self.finished_at.is_some() {
            RecordStatus::Succeeded
        } else if self.logs.is_some() {
            RecordStatus::Failed
        } else {
            RecordStatus::InProgress
        }
    }
}

/// Status of a migration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// Finished successfully.
    Succeeded,
    /// Halted with an error.
    Failed,
    /// Started and never finished.
    InProgress,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Succeeded => "applied",
            Self::Failed => "failed",
            Self::InProgress => "in progress",
        })
    }
}

/// Arguments for starting a migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMigration {
    /// Migration file name.
    pub migration_name: String,
    /// Content checksum.
    pub checksum: String,
}

/// Outcome of validating one migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    /// Local file and state record agree.
    Valid,
    /// The local file changed after it was started.
    ChecksumMismatch,
    /// The local file has no state record yet.
    MissingInState,
    /// A state record has no local file.
    MissingLocally,
}

impl ValidationStatus {
    /// Check whether this status must halt an apply.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ChecksumMismatch | Self::MissingLocally)
    }
}

/// Validation result for one migration name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Migration file name.
    pub name: String,
    /// Validation status.
    pub status: ValidationStatus,
}

/// Names of local migrations with no state record, in apply order.
///
/// A failed migration has a record and is therefore not pending; it is never
/// re-applied automatically.
pub async fn fetch_pending_migrations<A>(
    adapter: &A,
    files: &MigrationFileManager,
) -> MigrateResult<Vec<String>>
where
    A: StateAdapter + ?Sized,
{
    let records = adapter.list_migrations().await?;
    let local = files.list_migration_names().await?;
    Ok(pending_names(&local, &records))
}

/// Validate local files against state records.
pub async fn validate_migration_history<A>(
    adapter: &A,
    files: &MigrationFileManager,
) -> MigrateResult<Vec<ValidationResult>>
where
    A: StateAdapter + ?Sized,
{
    let records = adapter.list_migrations().await?;
    let local = files.list_migrations().await?;
    Ok(validate_against(&local, &records))
}

/// Local names that have no matching record.
pub fn pending_names(local: &[String], records: &[MigrationRecord]) -> Vec<String> {
    let applied: HashSet<&str> = records.iter().map(|r| r.migration_name.as_str()).collect();
    local
        .iter()
        .filter(|name| !applied.contains(name.as_str()))
        .cloned()
        .collect()
}

/// Compare local migrations with state records.
///
/// Local files are reported first in directory order, followed by records
/// with no local file in record order.
pub fn validate_against(
    local: &[LocalMigration],
    records: &[MigrationRecord],
) -> Vec<ValidationResult> {
    let by_name: HashMap<&str, &MigrationRecord> = records
        .iter()
        .map(|r| (r.migration_name.as_str(), r))
        .collect();

    let mut results: Vec<ValidationResult> = local
        .iter()
        .map(|migration| {
            let status = match by_name.get(migration.name.as_str()) {
                None => ValidationStatus::MissingInState,
                Some(record) if record.checksum != migration.checksum => {
                    tracing::warn!(
                        migration = %migration.name,
                        expected = %record.checksum,
                        actual = %migration.checksum,
                        "migration changed after it was applied"
                    );
                    ValidationStatus::ChecksumMismatch
                }
                Some(_) => ValidationStatus::Valid,
            };
            ValidationResult {
                name: migration.name.clone(),
                status,
            }
        })
        .collect();

    let local_names: HashSet<&str> = local.iter().map(|m| m.name.as_str()).collect();
    let mut reported = HashSet::new();
    for record in records {
        let name = record.migration_name.as_str();
        if !local_names.contains(name) && reported.insert(name) {
            results.push(ValidationResult {
                name: name.to_string(),
                status: ValidationStatus::MissingLocally,
            });
        }
    }

    results
}
