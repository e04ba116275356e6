//! Pluggable persistence for resource records and migration history.
//!
//! [`StateAdapter`] is the contract the engine relies on. Two adapters ship
//! with the crate: [`MemoryStateAdapter`] for tests and embedding, and
//! [`JsonFileStateAdapter`] which keeps state in a single JSON file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MigrateResult, MigrationError};
use crate::guards::parse_resources;
use crate::history::{MigrationRecord, StartMigration};
use crate::resource::{NewResource, Resource, ResourceType, ResourceUpdate};

/// Persistence for resource records and migration records.
///
/// Implementations are not expected to guard against concurrent migrations;
/// running two migrations against one store at the same time is unsupported.
#[async_trait]
pub trait StateAdapter: Send + Sync {
    /// Prepare the backend before any command touches state.
    async fn initialize(&self) -> MigrateResult<()> {
        Ok(())
    }

    /// List every resource record.
    async fn list_resources(&self) -> MigrateResult<Vec<Resource>>;

    /// Create a resource record, assigning its id.
    async fn create_resource(&self, data: NewResource) -> MigrateResult<Resource>;

    /// Apply a partial update to a resource record.
    async fn update_resource(&self, id: &str, update: ResourceUpdate) -> MigrateResult<()>;

    /// Delete the resource record with the given name and kind.
    async fn delete_resource(&self, name: &str, kind: ResourceType) -> MigrateResult<()>;

    /// List every migration record.
    async fn list_migrations(&self) -> MigrateResult<Vec<MigrationRecord>>;

    /// Record the start of a migration.
    async fn start_migration(&self, start: StartMigration) -> MigrateResult<MigrationRecord>;

    /// Mark a migration as succeeded.
    async fn succeed_migration(&self, id: &str) -> MigrateResult<MigrationRecord>;

    /// Record an error against a migration, leaving it unfinished.
    async fn error_migration(&self, id: &str, error: &str) -> MigrateResult<MigrationRecord>;
}

#[async_trait]
impl<T: StateAdapter + ?Sized> StateAdapter for Arc<T> {
    async fn initialize(&self) -> MigrateResult<()> {
        (**self).initialize().await
    }

    async fn list_resources(&self) -> MigrateResult<Vec<Resource>> {
        (**self).list_resources().await
    }

    async fn create_resource(&self, data: NewResource) -> MigrateResult<Resource> {
        (**self).create_resource(data).await
    }

    async fn update_resource(&self, id: &str, update: ResourceUpdate) -> MigrateResult<()> {
        (**self).update_resource(id, update).await
    }

    async fn delete_resource(&self, name: &str, kind: ResourceType) -> MigrateResult<()> {
        (**self).delete_resource(name, kind).await
    }

    async fn list_migrations(&self) -> MigrateResult<Vec<MigrationRecord>> {
        (**self).list_migrations().await
    }

    async fn start_migration(&self, start: StartMigration) -> MigrateResult<MigrationRecord> {
        (**self).start_migration(start).await
    }

    async fn succeed_migration(&self, id: &str) -> MigrateResult<MigrationRecord> {
        (**self).succeed_migration(id).await
    }

    async fn error_migration(&self, id: &str, error: &str) -> MigrateResult<MigrationRecord> {
        (**self).error_migration(id, error).await
    }
}

/// State contents shared by the bundled adapters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Resource records.
    pub resources: Vec<Resource>,
    /// Migration records.
    pub migrations: Vec<MigrationRecord>,
}

impl StateSnapshot {
    fn create_resource(&mut self, data: NewResource) -> MigrateResult<Resource> {
        if self
            .resources
            .iter()
            .any(|r| r.name == data.name && r.kind == data.kind)
        {
            return Err(MigrationError::state(format!(
                "{} '{}' already exists in state",
                data.kind, data.name
            )));
        }

        let resource = Resource {
            id: new_id(),
            name: data.name,
            checksum: data.checksum,
            kind: data.kind,
        };
        self.resources.push(resource.clone());
        Ok(resource)
    }

    fn update_resource(&mut self, id: &str, update: ResourceUpdate) -> MigrateResult<()> {
        let resource = self
            .resources
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| MigrationError::NotFound(format!("resource {id}")))?;

        if let Some(name) = update.name {
            resource.name = name;
        }
        if let Some(checksum) = update.checksum {
            resource.checksum = checksum;
        }
        Ok(())
    }

    fn delete_resource(&mut self, name: &str, kind: ResourceType) -> MigrateResult<()> {
        let position = self
            .resources
            .iter()
            .position(|r| r.name == name && r.kind == kind)
            .ok_or_else(|| MigrationError::NotFound(format!("{kind} {name}")))?;
        self.resources.remove(position);
        Ok(())
    }

    fn start_migration(&mut self, start: StartMigration) -> MigrationRecord {
        let record = MigrationRecord {
            id: new_id(),
            migration_name: start.migration_name,
            checksum: start.checksum,
            started_at: Utc::now(),
            finished_at: None,
            logs: None,
        };
        self.migrations.push(record.clone());
        record
    }

    fn migration_mut(&mut self, id: &str) -> MigrateResult<&mut MigrationRecord> {
        self.migrations
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| MigrationError::NotFound(format!("migration {id}")))
    }

    fn succeed_migration(&mut self, id: &str) -> MigrateResult<MigrationRecord> {
        let record = self.migration_mut(id)?;
        record.finished_at = Some(Utc::now());
        Ok(record.clone())
    }

    fn error_migration(&mut self, id: &str, error: &str) -> MigrateResult<MigrationRecord> {
        let record = self.migration_mut(id)?;
        record.logs = Some(error.to_string());
        Ok(record.clone())
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// In-memory state store.
#[derive(Debug, Default)]
pub struct MemoryStateAdapter {
    state: Mutex<StateSnapshot>,
}

impl MemoryStateAdapter {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with resource records.
    pub fn with_resources(resources: Vec<Resource>) -> Self {
        Self {
            state: Mutex::new(StateSnapshot {
                resources,
                migrations: Vec::new(),
            }),
        }
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> StateSnapshot {
        self.state.lock().clone()
    }
}

#[async_trait]
impl StateAdapter for MemoryStateAdapter {
    async fn list_resources(&self) -> MigrateResult<Vec<Resource>> {
        Ok(self.state.lock().resources.clone())
    }

    async fn create_resource(&self, data: NewResource) -> MigrateResult<Resource> {
        self.state.lock().create_resource(data)
    }

    async fn update_resource(&self, id: &str, update: ResourceUpdate) -> MigrateResult<()> {
        self.state.lock().update_resource(id, update)
    }

    async fn delete_resource(&self, name: &str, kind: ResourceType) -> MigrateResult<()> {
        self.state.lock().delete_resource(name, kind)
    }

    async fn list_migrations(&self) -> MigrateResult<Vec<MigrationRecord>> {
        Ok(self.state.lock().migrations.clone())
    }

    async fn start_migration(&self, start: StartMigration) -> MigrateResult<MigrationRecord> {
        Ok(self.state.lock().start_migration(start))
    }

    async fn succeed_migration(&self, id: &str) -> MigrateResult<MigrationRecord> {
        self.state.lock().succeed_migration(id)
    }

    async fn error_migration(&self, id: &str, error: &str) -> MigrateResult<MigrationRecord> {
        self.state.lock().error_migration(id, error)
    }
}

/// On-disk layout of the JSON state file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    resources: Vec<Value>,
    #[serde(default)]
    migrations: Vec<MigrationRecord>,
}

/// State store backed by a single JSON file.
///
/// Every operation reads the file, applies the change and writes it back
/// through a temporary file and rename. Resource records are validated each
/// time the file is read, so a hand-edited malformed record fails with
/// [`MigrationError::InvalidResource`].
#[derive(Debug)]
pub struct JsonFileStateAdapter {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonFileStateAdapter {
    /// Create an adapter for the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> MigrateResult<StateSnapshot> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(StateSnapshot::default());
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(StateSnapshot::default());
        }

        let file: StateFile = serde_json::from_str(&content).map_err(|e| {
            MigrationError::state(format!("failed to parse {}: {e}", self.path.display()))
        })?;

        Ok(StateSnapshot {
            resources: parse_resources(&file.resources)?,
            migrations: file.migrations,
        })
    }

    async fn save(&self, state: &StateSnapshot) -> MigrateResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = StateFile {
            resources: state
                .resources
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<_, _>>()?,
            migrations: state.migrations.clone(),
        };
        let mut content = serde_json::to_vec_pretty(&file)?;
        content.push(b'\n');

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn modify<T: Send>(
        &self,
        f: impl FnOnce(&mut StateSnapshot) -> MigrateResult<T> + Send,
    ) -> MigrateResult<T> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        let value = f(&mut state)?;
        self.save(&state).await?;
        Ok(value)
    }
}

#[async_trait]
impl StateAdapter for JsonFileStateAdapter {
    async fn initialize(&self) -> MigrateResult<()> {
        let _guard = self.lock.lock().await;
        let state = self.load().await?;
        if !tokio::fs::try_exists(&self.path).await? {
            tracing::info!(path = %self.path.display(), "creating state file");
            self.save(&state).await?;
        }
        Ok(())
    }

    async fn list_resources(&self) -> MigrateResult<Vec<Resource>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.resources)
    }

    async fn create_resource(&self, data: NewResource) -> MigrateResult<Resource> {
        self.modify(|state| state.create_resource(data)).await
    }

    async fn update_resource(&self, id: &str, update: ResourceUpdate) -> MigrateResult<()> {
        self.modify(|state| state.update_resource(id, update)).await
    }

    async fn delete_resource(&self, name: &str, kind: ResourceType) -> MigrateResult<()> {
        self.modify(|state| state.delete_resource(name, kind)).await
    }

    async fn list_migrations(&self) -> MigrateResult<Vec<MigrationRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.migrations)
    }

    async fn start_migration(&self, start: StartMigration) -> MigrateResult<MigrationRecord> {
        self.modify(|state| Ok(state.start_migration(start))).await
    }

    async fn succeed_migration(&self, id: &str) -> MigrateResult<MigrationRecord> {
        self.modify(|state| state.succeed_migration(id)).await
    }

    async fn error_migration(&self, id: &str, error: &str) -> MigrateResult<MigrationRecord> {
        self.modify(|state| state.error_migration(id, error)).await
    }
}
