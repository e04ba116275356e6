//! Applying a single migration file.
//!
//! A [`Migrator`] walks one migration through a fixed sequence:
//!
//! 1. Record the start of the migration in state, keeping the record id.
//! 2. For data sources, then indexes, then indexers: delete every listed
//!    resource remotely and from state, then create every listed resource
//!    remotely and record it in state.
//! 3. Mark the record as succeeded.
//!
//! Any failed step writes the error to the record, rolls back every resource
//! created so far in this migration and stops. The record is left unfinished.
//! Deleted resources are not recreated.

use std::future::Future;

use futures::future::join_all;
use indexmap::IndexMap;
use quiver_schema::DataSourceConnection;

use crate::checksum::migration_checksum;
use crate::diff::BuiltResource;
use crate::error::{MigrateResult, MigrationError};
use crate::events::{MigrationEvent, MigrationObserver, NoopObserver};
use crate::file::MigrationFile;
use crate::history::StartMigration;
use crate::resource::{NewResource, ResourceRef};
use crate::secrets::SecretResolver;
use crate::service::SearchService;
use crate::state::StateAdapter;

/// A migration that was applied and recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Migration file name.
    pub name: String,
    /// Id of the migration record.
    pub record_id: String,
    /// Resources deleted, in order.
    pub deleted: Vec<ResourceRef>,
    /// Resources created, in order.
    pub created: Vec<ResourceRef>,
}

/// Outcome of undoing the creates of a failed migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Number of resources rolled back.
    pub attempted: usize,
    /// Resources whose rollback failed, with the reason.
    pub failures: Vec<(ResourceRef, String)>,
}

impl RollbackReport {
    /// Check whether every rollback step succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of successful rollback steps.
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }
}

/// A migration that halted.
#[derive(Debug)]
pub struct FailedMigration {
    /// Migration file name.
    pub name: String,
    /// The resource being processed when the migration halted, if any.
    pub resource: Option<ResourceRef>,
    /// The error that halted the migration.
    pub error: MigrationError,
    /// Rollback outcome. `None` when no rollback ran.
    pub rollback: Option<RollbackReport>,
}

impl FailedMigration {
    /// Flatten into a [`MigrationError::ApplyFailed`].
    pub fn into_error(self) -> MigrationError {
        let reason = match &self.resource {
            Some(resource) => format!("{resource}: {}", self.error),
            None => self.error.to_string(),
        };
        MigrationError::ApplyFailed {
            name: self.name,
            reason,
        }
    }
}

/// Result of [`Migrator::apply`].
#[derive(Debug)]
pub enum ApplyOutcome {
    /// Every step succeeded and the record is finished.
    Succeeded(ApplyReport),
    /// A step failed.
    Failed(FailedMigration),
}

impl ApplyOutcome {
    /// Check if the migration succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

#[derive(Debug)]
struct StepError {
    resource: ResourceRef,
    error: MigrationError,
}

/// A resource created during this migration.
#[derive(Debug, Clone)]
struct RollbackEntry {
    resource: ResourceRef,
    state_written: bool,
}

/// Applies one migration file.
pub struct Migrator<'a, A: ?Sized, S: ?Sized> {
    name: String,
    migration: &'a MigrationFile,
    adapter: &'a A,
    service: &'a S,
    secrets: SecretResolver,
    observer: &'a dyn MigrationObserver,
    rollback: IndexMap<String, RollbackEntry>,
    deleted: Vec<ResourceRef>,
    created: Vec<ResourceRef>,
}

impl<'a, A, S> Migrator<'a, A, S>
where
    A: StateAdapter + ?Sized,
    S: SearchService + ?Sized,
{
    /// Create a migrator for the named migration.
    pub fn new(
        name: impl Into<String>,
        migration: &'a MigrationFile,
        adapter: &'a A,
        service: &'a S,
    ) -> Self {
        Self {
            name: name.into(),
            migration,
            adapter,
            service,
            secrets: SecretResolver::new(),
            observer: &NoopObserver,
            rollback: IndexMap::new(),
            deleted: Vec::new(),
            created: Vec::new(),
        }
    }

    /// Resolve data source secrets with this resolver.
    pub fn with_secrets(mut self, secrets: SecretResolver) -> Self {
        self.secrets = secrets;
        self
    }

    /// Report progress to an observer.
    pub fn with_observer(mut self, observer: &'a dyn MigrationObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Apply the migration.
    ///
    /// Returns `Err` only if the migration could not be started, in which
    /// case nothing was changed. Failures after that point are reported as
    /// [`ApplyOutcome::Failed`].
    pub async fn apply(mut self) -> MigrateResult<ApplyOutcome> {
        let checksum = migration_checksum(self.migration)?;
        let record = self
            .adapter
            .start_migration(StartMigration {
                migration_name: self.name.clone(),
                checksum,
            })
            .await?;

        tracing::info!(
            migration = %self.name,
            id = %record.id,
            operations = self.migration.operation_count(),
            "applying migration"
        );
        self.emit(MigrationEvent::MigrationStarted {
            name: self.name.clone(),
        });

        if let Err(step) = self.run().await {
            return Ok(ApplyOutcome::Failed(self.halt(&record.id, step).await));
        }

        if let Err(error) = self.adapter.succeed_migration(&record.id).await {
            tracing::error!(migration = %self.name, error = %error, "failed to mark migration as succeeded");
            let error =
                MigrationError::state(format!("migration succeeded but failed to write to state: {error}"));
            self.emit(MigrationEvent::MigrationErrored {
                name: self.name.clone(),
                reason: error.to_string(),
            });
            return Ok(ApplyOutcome::Failed(FailedMigration {
                name: self.name,
                resource: None,
                error,
                rollback: None,
            }));
        }

        tracing::info!(
            migration = %self.name,
            deleted = self.deleted.len(),
            created = self.created.len(),
            "migration applied"
        );
        self.emit(MigrationEvent::MigrationSucceeded {
            name: self.name.clone(),
        });

        Ok(ApplyOutcome::Succeeded(ApplyReport {
            name: self.name,
            record_id: record.id,
            deleted: self.deleted,
            created: self.created,
        }))
    }

    async fn run(&mut self) -> Result<(), StepError> {
        let migration = self.migration;
        let service = self.service;

        self.delete_all(&migration.data_sources.delete).await?;
        let secrets = self.secrets.clone();
        for data_source in &migration.data_sources.create {
            let secrets = &secrets;
            self.create(data_source, async move {
                let resolved = resolve_connection_string(data_source, secrets).await?;
                service.create_data_source(&resolved).await.map(drop)
            })
            .await?;
        }

        self.delete_all(&migration.indexes.delete).await?;
        for index in &migration.indexes.create {
            self.create(index, async move { service.create_index(index).await.map(drop) })
                .await?;
        }

        self.delete_all(&migration.indexers.delete).await?;
        for indexer in &migration.indexers.create {
            self.create(indexer, async move {
                service.create_indexer(indexer).await.map(drop)
            })
            .await?;
        }

        Ok(())
    }

    async fn delete_all(&mut self, deletes: &[ResourceRef]) -> Result<(), StepError> {
        for target in deletes {
            self.emit(MigrationEvent::Deleting(target.clone()));
            tracing::debug!(resource = %target, "deleting");

            let result = match self.service.delete_resource(target.kind, &target.name).await {
                Ok(()) => self.adapter.delete_resource(&target.name, target.kind).await,
                Err(error) => Err(error),
            };

            if let Err(error) = result {
                return Err(self.step_failed(target.clone(), error));
            }

            self.emit(MigrationEvent::Deleted(target.clone()));
            self.deleted.push(target.clone());
        }
        Ok(())
    }

    /// Create one resource remotely, then record it in state.
    ///
    /// The stored checksum is computed from `resource` as written in the
    /// migration file, never from a resolved copy.
    async fn create<R, F>(&mut self, resource: &R, submit: F) -> Result<(), StepError>
    where
        R: BuiltResource,
        F: Future<Output = MigrateResult<()>>,
    {
        let target = ResourceRef::new(R::KIND, resource.name());
        self.emit(MigrationEvent::Creating(target.clone()));
        tracing::debug!(resource = %target, "creating");

        if let Err(error) = submit.await {
            return Err(self.step_failed(target, error));
        }

        let key = target.type_name();
        self.rollback.insert(
            key.clone(),
            RollbackEntry {
                resource: target.clone(),
                state_written: false,
            },
        );

        let record = NewResource::new(R::KIND, resource.name(), resource.checksum());
        if let Err(error) = self.adapter.create_resource(record).await {
            return Err(self.step_failed(target, error));
        }

        if let Some(entry) = self.rollback.get_mut(&key) {
            entry.state_written = true;
        }

        self.emit(MigrationEvent::Created(target.clone()));
        self.created.push(target);
        Ok(())
    }

    fn step_failed(&self, resource: ResourceRef, error: MigrationError) -> StepError {
        tracing::error!(resource = %resource, error = %error, "migration step failed");
        self.emit(MigrationEvent::StepFailed {
            resource: resource.clone(),
            reason: error.to_string(),
        });
        StepError { resource, error }
    }

    /// Record the error, roll back and build the failure.
    async fn halt(mut self, id: &str, step: StepError) -> FailedMigration {
        let detail = format!("{}: {}", step.resource, step.error);
        if let Err(error) = self.adapter.error_migration(id, &detail).await {
            tracing::warn!(migration = %self.name, error = %error, "failed to record migration error");
        }

        let rollback = self.roll_back().await;

        self.emit(MigrationEvent::MigrationErrored {
            name: self.name.clone(),
            reason: detail,
        });

        FailedMigration {
            name: self.name,
            resource: Some(step.resource),
            error: step.error,
            rollback: Some(rollback),
        }
    }

    /// Undo every create registered so far.
    ///
    /// All steps are attempted even when some fail.
    async fn roll_back(&mut self) -> RollbackReport {
        let entries: Vec<RollbackEntry> = self.rollback.drain(..).map(|(_, e)| e).collect();
        self.emit(MigrationEvent::RollbackStarted {
            steps: entries.len(),
        });

        let service = self.service;
        let adapter = self.adapter;
        let results = join_all(entries.iter().map(|entry| async move {
            match service
                .delete_resource(entry.resource.kind, &entry.resource.name)
                .await
            {
                Ok(()) => {}
                Err(error) if error.is_not_found() => {
                    tracing::debug!(resource = %entry.resource, "already gone remotely");
                }
                Err(error) => return Err(error),
            }
            if entry.state_written {
                adapter
                    .delete_resource(&entry.resource.name, entry.resource.kind)
                    .await?;
            }
            Ok::<(), MigrationError>(())
        }))
        .await;

        let mut report = RollbackReport {
            attempted: entries.len(),
            failures: Vec::new(),
        };

        for (entry, result) in entries.into_iter().zip(results) {
            if let Err(error) = result {
                tracing::warn!(resource = %entry.resource, error = %error, "rollback failed");
                self.emit(MigrationEvent::RollbackStepFailed {
                    resource: entry.resource.clone(),
                    reason: error.to_string(),
                });
                report.failures.push((entry.resource, error.to_string()));
            }
        }

        self.emit(MigrationEvent::RollbackFinished {
            succeeded: report.succeeded(),
            failed: report.failures.len(),
        });
        report
    }

    fn emit(&self, event: MigrationEvent) {
        self.observer.on_event(&event);
    }
}

/// Copy of `data_source` with its connection string placeholders resolved.
pub(crate) async fn resolve_connection_string(
    data_source: &DataSourceConnection,
    secrets: &SecretResolver,
) -> MigrateResult<DataSourceConnection> {
    let mut resolved = data_source.clone();
    if let Some(connection_string) = &data_source.connection_string {
        resolved.connection_string = Some(secrets.resolve(connection_string).await?);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::ResourceChanges;
    use crate::history::RecordStatus;
    use crate::resource::{Resource, ResourceType};
    use crate::state::MemoryStateAdapter;
    use crate::testing::{Call, FakeService};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use quiver_schema::{SearchIndex, SearchIndexer, SimpleField};
    use std::collections::HashMap;

    fn index(name: &str) -> SearchIndex {
        SearchIndex::new(name, vec![SimpleField::new("id", "Edm.String").into()])
    }

    fn indexer(name: &str) -> SearchIndexer {
        SearchIndexer::new(name, "hotels-ds", "hotels")
    }

    fn data_source(name: &str) -> DataSourceConnection {
        DataSourceConnection::new(name, "azureblob", "hotels")
    }

    fn create(kind: ResourceType, name: &str) -> Call {
        Call::Create(ResourceRef::new(kind, name))
    }

    fn delete(kind: ResourceType, name: &str) -> Call {
        Call::Delete(ResourceRef::new(kind, name))
    }

    #[tokio::test]
    async fn test_apply_order() {
        let migration = MigrationFile {
            indexes: ResourceChanges {
                create: vec![index("hotels")],
                delete: vec![ResourceRef::new(ResourceType::Index, "motels")],
            },
            indexers: ResourceChanges {
                create: vec![indexer("hotels-indexer")],
                delete: vec![],
            },
            data_sources: ResourceChanges {
                create: vec![data_source("hotels-ds")],
                delete: vec![],
            },
        };
        let adapter = MemoryStateAdapter::with_resources(vec![Resource {
            id: "1".into(),
            name: "motels".into(),
            checksum: "x".into(),
            kind: ResourceType::Index,
        }]);
        let service = FakeService::new().with_live(ResourceType::Index, "motels");

        let outcome = Migrator::new("1-init.json", &migration, &adapter, &service)
            .apply()
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(
            service.calls(),
            vec![
                create(ResourceType::DataSource, "hotels-ds"),
                delete(ResourceType::Index, "motels"),
                create(ResourceType::Index, "hotels"),
                create(ResourceType::Indexer, "hotels-indexer"),
            ]
        );

        let state = adapter.snapshot();
        let mut names: Vec<_> = state.resources.iter().map(|r| r.type_name()).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["dataSource_hotels-ds", "index_hotels", "indexer_hotels-indexer"]
        );
        assert_eq!(state.migrations[0].status(), RecordStatus::Succeeded);
        assert_eq!(
            state.migrations[0].checksum,
            migration_checksum(&migration).unwrap()
        );
    }

    #[tokio::test]
    async fn test_create_failure_rolls_back() {
        let migration = MigrationFile {
            indexes: ResourceChanges {
                create: vec![index("a"), index("b"), index("c")],
                delete: vec![],
            },
            ..Default::default()
        };
        let adapter = MemoryStateAdapter::new();
        let service = FakeService::new().failing_create("c");
        let events = Mutex::new(Vec::new());
        let observer = |e: &MigrationEvent| events.lock().push(e.clone());

        let outcome = Migrator::new("1-abc.json", &migration, &adapter, &service)
            .with_observer(&observer)
            .apply()
            .await
            .unwrap();

        let ApplyOutcome::Failed(failed) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failed.resource, Some(ResourceRef::new(ResourceType::Index, "c")));
        let rollback = failed.rollback.unwrap();
        assert_eq!(rollback.attempted, 2);
        assert!(rollback.is_clean());

        assert!(!service.is_live(ResourceType::Index, "a"));
        assert!(!service.is_live(ResourceType::Index, "b"));

        let state = adapter.snapshot();
        assert!(state.resources.is_empty());
        let record = &state.migrations[0];
        assert_eq!(record.finished_at, None);
        assert!(record.logs.as_deref().unwrap().contains("cannot create c"));
        assert_eq!(record.status(), RecordStatus::Failed);

        let events = events.lock();
        assert!(events.contains(&MigrationEvent::RollbackStarted { steps: 2 }));
        assert!(matches!(events.last(), Some(MigrationEvent::MigrationErrored { .. })));
    }

    #[tokio::test]
    async fn test_failure_halts_later_kinds() {
        let migration = MigrationFile {
            data_sources: ResourceChanges {
                create: vec![data_source("ds")],
                delete: vec![],
            },
            indexes: ResourceChanges {
                create: vec![index("hotels")],
                delete: vec![],
            },
            ..Default::default()
        };
        let adapter = MemoryStateAdapter::new();
        let service = FakeService::new().failing_create("hotels");

        let outcome = Migrator::new("1-x.json", &migration, &adapter, &service)
            .apply()
            .await
            .unwrap();

        assert!(!outcome.is_success());
        assert!(!service.is_live(ResourceType::DataSource, "ds"));
        assert_eq!(
            service.calls().last(),
            Some(&delete(ResourceType::DataSource, "ds"))
        );
    }

    #[tokio::test]
    async fn test_state_write_failure_rolls_back_remote() {
        let migration = MigrationFile {
            indexes: ResourceChanges {
                create: vec![index("hotels")],
                delete: vec![],
            },
            ..Default::default()
        };
        // A record with the same name and kind makes the state write fail
        let adapter = MemoryStateAdapter::with_resources(vec![Resource {
            id: "1".into(),
            name: "hotels".into(),
            checksum: "x".into(),
            kind: ResourceType::Index,
        }]);
        let service = FakeService::new();

        let outcome = Migrator::new("1-x.json", &migration, &adapter, &service)
            .apply()
            .await
            .unwrap();

        let ApplyOutcome::Failed(failed) = outcome else {
            panic!("expected failure");
        };
        assert!(matches!(failed.error, MigrationError::State(_)));
        assert!(!service.is_live(ResourceType::Index, "hotels"));
        // the pre-existing record is untouched
        assert_eq!(adapter.snapshot().resources.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_failure_halts() {
        let migration = MigrationFile {
            indexes: ResourceChanges {
                create: vec![index("hotels")],
                delete: vec![ResourceRef::new(ResourceType::Index, "hotels")],
            },
            ..Default::default()
        };
        let adapter = MemoryStateAdapter::new();
        let service = FakeService::new()
            .with_live(ResourceType::Index, "hotels")
            .failing_delete("hotels");

        let outcome = Migrator::new("1-x.json", &migration, &adapter, &service)
            .apply()
            .await
            .unwrap();

        let ApplyOutcome::Failed(failed) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failed.rollback.as_ref().unwrap().attempted, 0);
        assert_eq!(service.calls(), vec![delete(ResourceType::Index, "hotels")]);
        assert!(
            failed
                .into_error()
                .to_string()
                .contains("index 'hotels': Search service returned 500")
        );
    }

    #[tokio::test]
    async fn test_rollback_failures_are_reported() {
        let migration = MigrationFile {
            indexes: ResourceChanges {
                create: vec![index("a"), index("b")],
                delete: vec![],
            },
            ..Default::default()
        };
        let adapter = MemoryStateAdapter::new();
        let service = FakeService::new().failing_create("b").failing_delete("a");

        let outcome = Migrator::new("1-x.json", &migration, &adapter, &service)
            .apply()
            .await
            .unwrap();

        let ApplyOutcome::Failed(failed) = outcome else {
            panic!("expected failure");
        };
        let rollback = failed.rollback.unwrap();
        assert_eq!(rollback.attempted, 1);
        assert_eq!(rollback.succeeded(), 0);
        assert_eq!(rollback.failures[0].0, ResourceRef::new(ResourceType::Index, "a"));
        // the state record stays because the remote delete failed first
        assert_eq!(adapter.snapshot().resources.len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_treats_missing_remote_as_removed() {
        let migration = MigrationFile {
            indexes: ResourceChanges {
                create: vec![index("a"), index("b")],
                delete: vec![],
            },
            ..Default::default()
        };
        let adapter = MemoryStateAdapter::new();
        let service = FakeService::new().vanishing_create("a").failing_create("b");

        let outcome = Migrator::new("1-x.json", &migration, &adapter, &service)
            .apply()
            .await
            .unwrap();

        let ApplyOutcome::Failed(failed) = outcome else {
            panic!("expected failure");
        };
        let rollback = failed.rollback.unwrap();
        assert_eq!(rollback.attempted, 1);
        assert!(rollback.is_clean());
        assert_eq!(service.calls().last(), Some(&delete(ResourceType::Index, "a")));
        // the state record is removed even though the remote delete hit a 404
        assert!(adapter.snapshot().resources.is_empty());
    }

    #[tokio::test]
    async fn test_secret_resolved_only_for_remote_create() {
        let mut ds = data_source("hotels-ds");
        ds.connection_string = Some("@kv(blob-conn)".into());
        let migration = MigrationFile {
            data_sources: ResourceChanges {
                create: vec![ds.clone()],
                delete: vec![],
            },
            ..Default::default()
        };
        let adapter = MemoryStateAdapter::new();
        let service = FakeService::new();
        let secrets = SecretResolver::new().with_store(HashMap::from([(
            "blob-conn".to_string(),
            "AccountKey=secret".to_string(),
        )]));

        let outcome = Migrator::new("1-x.json", &migration, &adapter, &service)
            .with_secrets(secrets)
            .apply()
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(
            service.data_sources.lock()[0].connection_string.as_deref(),
            Some("AccountKey=secret")
        );
        assert_eq!(adapter.snapshot().resources[0].checksum, ds.checksum());
        assert_eq!(
            migration.data_sources.create[0].connection_string.as_deref(),
            Some("@kv(blob-conn)")
        );
    }

    #[tokio::test]
    async fn test_unresolvable_secret_fails_create() {
        let mut ds = data_source("hotels-ds");
        ds.connection_string = Some("@kv(blob-conn)".into());
        let migration = MigrationFile {
            data_sources: ResourceChanges {
                create: vec![ds],
                delete: vec![],
            },
            ..Default::default()
        };
        let adapter = MemoryStateAdapter::new();
        let service = FakeService::new();

        let outcome = Migrator::new("1-x.json", &migration, &adapter, &service)
            .apply()
            .await
            .unwrap();

        let ApplyOutcome::Failed(failed) = outcome else {
            panic!("expected failure");
        };
        assert!(matches!(failed.error, MigrationError::Secret(_)));
        assert!(service.calls().is_empty());
    }
}
