//! Migration engine implementation.

use std::path::PathBuf;
use std::time::Instant;

use quiver_schema::Schema;

use crate::diff::Plan;
use crate::error::{MigrateResult, MigrationError};
use crate::events::MigrationObserver;
use crate::file::{LocalMigration, MigrationFile, MigrationFileManager, generate_migration_file};
use crate::guards::StateResources;
use crate::history::{
    MigrationRecord, RecordStatus, ValidationResult, ValidationStatus, pending_names,
    validate_against,
};
use crate::migrator::{ApplyOutcome, ApplyReport, FailedMigration, Migrator};
use crate::pull::{PullReport, pull_resources};
use crate::secrets::SecretResolver;
use crate::service::SearchService;
use crate::state::StateAdapter;

/// Configuration for the migration engine.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Path to the migrations directory.
    pub migrations_dir: PathBuf,
    /// Whether to run in dry-run mode.
    pub dry_run: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("./migrations"),
            dry_run: false,
        }
    }
}

impl MigrationConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the migrations directory.
    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Result of generating a migration.
#[derive(Debug, Clone)]
pub enum GenerateOutcome {
    /// The schema matches state; no file was written.
    NoChanges,
    /// A migration file was written.
    Written {
        /// File name.
        name: String,
        /// Path to the file.
        path: PathBuf,
        /// File content.
        file: MigrationFile,
    },
}

/// Result of applying pending migrations.
#[derive(Debug, Default)]
pub struct MigrationResult {
    /// Migrations applied, in order.
    pub applied: Vec<ApplyReport>,
    /// Migrations that would be applied in dry-run mode.
    pub planned: Vec<String>,
    /// The migration that halted the run, if any.
    pub failed: Option<FailedMigration>,
    /// Total duration in milliseconds.
    pub duration_ms: i64,
}

impl MigrationResult {
    /// Check if every pending migration was applied.
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }

    /// Check if any migrations were applied.
    pub fn has_changes(&self) -> bool {
        !self.applied.is_empty()
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if !self.applied.is_empty() {
            parts.push(format!("{} applied", self.applied.len()));
        }

        if !self.planned.is_empty() {
            parts.push(format!("{} would be applied", self.planned.len()));
        }

        if let Some(failed) = &self.failed {
            parts.push(format!("'{}' failed", failed.name));
        }

        if parts.is_empty() {
            "No migrations applied".to_string()
        } else {
            format!("{} in {}ms", parts.join(", "), self.duration_ms)
        }
    }
}

/// Local migrations compared with state.
#[derive(Debug, Clone, Default)]
pub struct MigrationStatus {
    /// Local migration names in apply order.
    pub local: Vec<String>,
    /// Migration records in state.
    pub records: Vec<MigrationRecord>,
    /// Local migrations with no record.
    pub pending: Vec<String>,
    /// Validation results for every local file and record.
    pub validation: Vec<ValidationResult>,
}

impl MigrationStatus {
    /// Record for a migration name.
    pub fn record(&self, name: &str) -> Option<&MigrationRecord> {
        self.records.iter().find(|r| r.migration_name == name)
    }

    /// Validation status for a migration name.
    pub fn validation_status(&self, name: &str) -> Option<ValidationStatus> {
        self.validation
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.status)
    }

    /// Number of records with the given status.
    pub fn count(&self, status: RecordStatus) -> usize {
        self.records.iter().filter(|r| r.status() == status).count()
    }

    /// Validation results that block applying.
    pub fn blocking(&self) -> Vec<&ValidationResult> {
        self.validation.iter().filter(|v| v.status.is_fatal()).collect()
    }

    /// Check if there are blocking issues.
    pub fn has_blocking_issues(&self) -> bool {
        self.validation.iter().any(|v| v.status.is_fatal())
    }

    /// Get a summary of the status.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} applied", self.count(RecordStatus::Succeeded))];

        let failed = self.count(RecordStatus::Failed);
        if failed > 0 {
            parts.push(format!("{failed} failed"));
        }

        let in_progress = self.count(RecordStatus::InProgress);
        if in_progress > 0 {
            parts.push(format!("{in_progress} in progress"));
        }

        parts.push(format!("{} pending", self.pending.len()));

        let blocking = self.blocking().len();
        if blocking > 0 {
            parts.push(format!("{blocking} blocking"));
        }

        parts.join(", ")
    }
}

/// The main migration engine.
pub struct MigrationEngine<A: StateAdapter> {
    config: MigrationConfig,
    adapter: A,
    file_manager: MigrationFileManager,
}

impl<A: StateAdapter> MigrationEngine<A> {
    /// Create a new migration engine.
    pub fn new(config: MigrationConfig, adapter: A) -> Self {
        let file_manager = MigrationFileManager::new(&config.migrations_dir);
        Self {
            config,
            adapter,
            file_manager,
        }
    }

    /// The state adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// The engine configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// The migration file manager.
    pub fn file_manager(&self) -> &MigrationFileManager {
        &self.file_manager
    }

    /// Initialize the migration system.
    pub async fn initialize(&self) -> MigrateResult<()> {
        self.file_manager.ensure_dir().await?;
        self.adapter.initialize().await?;
        Ok(())
    }

    /// Names of local migrations with no state record.
    pub async fn pending(&self) -> MigrateResult<Vec<String>> {
        crate::history::fetch_pending_migrations(&self.adapter, &self.file_manager).await
    }

    /// Validate local migrations against state.
    pub async fn validate(&self) -> MigrateResult<Vec<ValidationResult>> {
        crate::history::validate_migration_history(&self.adapter, &self.file_manager).await
    }

    /// Diff a schema against state.
    ///
    /// The schema is validated first, so duplicate names never reach the
    /// plan. Refuses while any migration is pending, since state would not
    /// reflect the schema the pending files were generated from.
    pub async fn plan(&self, schema: &Schema) -> MigrateResult<Plan> {
        schema.validate()?;

        let pending = self.pending().await?;
        if !pending.is_empty() {
            return Err(MigrationError::PendingMigrations(pending));
        }

        let state = StateResources::partition(self.adapter.list_resources().await?);
        Plan::compute(schema, &state)
    }

    /// Diff a schema against state and write the migration file.
    pub async fn generate(&self, schema: &Schema, name: Option<&str>) -> MigrateResult<GenerateOutcome> {
        let plan = self.plan(schema).await?;
        let file = generate_migration_file(&plan);

        if file.is_empty() {
            tracing::info!("schema matches state, no migration written");
            return Ok(GenerateOutcome::NoChanges);
        }

        let (name, path) = self.file_manager.write_migration(&file, name).await?;
        Ok(GenerateOutcome::Written { name, path, file })
    }

    /// Apply every pending migration in order.
    ///
    /// History is validated first; a checksum mismatch or a record without a
    /// local file stops the run before anything changes. Application stops at
    /// the first failed migration.
    pub async fn migrate<S>(
        &self,
        service: &S,
        secrets: &SecretResolver,
        observer: &dyn MigrationObserver,
    ) -> MigrateResult<MigrationResult>
    where
        S: SearchService + ?Sized,
    {
        let start = Instant::now();
        let mut result = MigrationResult::default();

        let records = self.adapter.list_migrations().await?;
        let local = self.file_manager.list_migrations().await?;
        check_history(&local, &records)?;

        let names: Vec<String> = local.iter().map(|m| m.name.clone()).collect();
        let pending = pending_names(&names, &records);

        for migration in local.iter().filter(|m| pending.contains(&m.name)) {
            if self.config.dry_run {
                tracing::info!(migration = %migration.name, "[DRY RUN] would apply");
                result.planned.push(migration.name.clone());
                continue;
            }

            let outcome = Migrator::new(&migration.name, &migration.file, &self.adapter, service)
                .with_secrets(secrets.clone())
                .with_observer(observer)
                .apply()
                .await?;

            match outcome {
                ApplyOutcome::Succeeded(report) => result.applied.push(report),
                ApplyOutcome::Failed(failed) => {
                    result.failed = Some(failed);
                    break;
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as i64;
        Ok(result)
    }

    /// Record live indexes and indexers in state.
    ///
    /// See [`pull_resources`] for how existing records are treated.
    pub async fn pull<S>(&self, service: &S, force: bool) -> MigrateResult<PullReport>
    where
        S: SearchService + ?Sized,
    {
        pull_resources(&self.adapter, service, force).await
    }

    /// Get migration status.
    pub async fn status(&self) -> MigrateResult<MigrationStatus> {
        let records = self.adapter.list_migrations().await?;
        let local = self.file_manager.list_migrations().await?;
        let names: Vec<String> = local.iter().map(|m| m.name.clone()).collect();

        Ok(MigrationStatus {
            pending: pending_names(&names, &records),
            validation: validate_against(&local, &records),
            local: names,
            records,
        })
    }
}

/// Fail on the first fatal validation result.
fn check_history(local: &[LocalMigration], records: &[MigrationRecord]) -> MigrateResult<()> {
    for result in validate_against(local, records) {
        match result.status {
            ValidationStatus::ChecksumMismatch => {
                let expected = records
                    .iter()
                    .find(|r| r.migration_name == result.name)
                    .map(|r| r.checksum.clone())
                    .unwrap_or_default();
                let actual = local
                    .iter()
                    .find(|m| m.name == result.name)
                    .map(|m| m.checksum.clone())
                    .unwrap_or_default();
                return Err(MigrationError::ChecksumMismatch {
                    id: result.name,
                    expected,
                    actual,
                });
            }
            ValidationStatus::MissingLocally => {
                return Err(MigrationError::MissingLocally(result.name));
            }
            ValidationStatus::Valid | ValidationStatus::MissingInState => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopObserver;
    use crate::resource::ResourceType;
    use crate::state::MemoryStateAdapter;
    use crate::testing::FakeService;
    use quiver_schema::{FieldDefinition, IndexDefinition};
    use tempfile::TempDir;

    fn schema() -> Schema {
        Schema::new().index(
            "hotels",
            IndexDefinition::new("hotels").field("id", FieldDefinition::string().key()),
        )
    }

    fn engine(dir: &TempDir) -> MigrationEngine<MemoryStateAdapter> {
        let config = MigrationConfig::new().migrations_dir(dir.path());
        MigrationEngine::new(config, MemoryStateAdapter::new())
    }

    #[test]
    fn test_config_builder() {
        let config = MigrationConfig::new()
            .migrations_dir("./search/migrations")
            .dry_run(true);

        assert_eq!(config.migrations_dir, PathBuf::from("./search/migrations"));
        assert!(config.dry_run);
    }

    #[test]
    fn test_result_summary() {
        assert_eq!(MigrationResult::default().summary(), "No migrations applied");

        let result = MigrationResult {
            planned: vec!["1-a.json".into()],
            duration_ms: 4,
            ..Default::default()
        };
        assert_eq!(result.summary(), "1 would be applied in 4ms");
    }

    #[tokio::test]
    async fn test_generate_then_migrate() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.initialize().await.unwrap();

        let GenerateOutcome::Written { name, file, .. } =
            engine.generate(&schema(), Some("init")).await.unwrap()
        else {
            panic!("expected a migration");
        };
        assert!(name.ends_with("-init.json"));
        assert_eq!(file.indexes.create.len(), 1);

        // a pending migration blocks the next generate
        let err = engine.generate(&schema(), None).await.unwrap_err();
        assert!(matches!(err, MigrationError::PendingMigrations(ref p) if p == &vec![name.clone()]));

        let service = FakeService::new();
        let result = engine
            .migrate(&service, &SecretResolver::new(), &NoopObserver)
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.applied.len(), 1);
        assert!(service.is_live(ResourceType::Index, "hotels"));

        assert!(matches!(
            engine.generate(&schema(), None).await.unwrap(),
            GenerateOutcome::NoChanges
        ));

        let status = engine.status().await.unwrap();
        assert!(status.pending.is_empty());
        assert_eq!(status.summary(), "1 applied, 0 pending");
    }

    #[tokio::test]
    async fn test_plan_rejects_duplicate_names() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let hotels = IndexDefinition::new("hotels").field("id", FieldDefinition::string().key());
        let schema = Schema::new()
            .index("hotels", hotels.clone())
            .index("hotels_copy", hotels);

        let err = engine.generate(&schema, None).await.unwrap_err();

        assert!(matches!(err, MigrationError::InvalidSchema(_)));
        assert!(engine.file_manager().list_migrations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pull_then_generate_sees_no_changes() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let declared = schema();
        let service = FakeService::new().with_index(declared.indexes["hotels"].build());

        let report = engine.pull(&service, false).await.unwrap();
        assert_eq!(report.imported.len(), 1);

        assert!(matches!(
            engine.generate(&declared, None).await.unwrap(),
            GenerateOutcome::NoChanges
        ));
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = MigrationConfig::new().migrations_dir(dir.path()).dry_run(true);
        let engine = MigrationEngine::new(config, MemoryStateAdapter::new());
        engine.generate(&schema(), Some("init")).await.unwrap();

        let service = FakeService::new();
        let result = engine
            .migrate(&service, &SecretResolver::new(), &NoopObserver)
            .await
            .unwrap();

        assert_eq!(result.planned.len(), 1);
        assert!(service.calls().is_empty());
        assert!(engine.adapter().snapshot().migrations.is_empty());
    }

    #[tokio::test]
    async fn test_tampered_migration_blocks_apply() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.generate(&schema(), Some("init")).await.unwrap();
        let service = FakeService::new();
        engine
            .migrate(&service, &SecretResolver::new(), &NoopObserver)
            .await
            .unwrap();

        let local = engine.file_manager().list_migrations().await.unwrap();
        let mut edited = local[0].file.clone();
        edited.indexes.create[0].name = "motels".into();
        tokio::fs::write(&local[0].path, serde_json::to_vec(&edited).unwrap())
            .await
            .unwrap();

        let status = engine.status().await.unwrap();
        assert!(status.has_blocking_issues());

        let err = engine
            .migrate(&service, &SecretResolver::new(), &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn test_failed_migration_stops_run() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.generate(&schema(), Some("init")).await.unwrap();

        let service = FakeService::new().failing_create("hotels");
        let result = engine
            .migrate(&service, &SecretResolver::new(), &NoopObserver)
            .await
            .unwrap();

        assert!(!result.is_success());
        let status = engine.status().await.unwrap();
        assert_eq!(status.count(RecordStatus::Failed), 1);
        assert!(status.pending.is_empty());
        assert!(!status.has_blocking_issues());
    }
}
