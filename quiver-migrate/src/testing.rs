//! In-memory search service for unit tests.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;
use quiver_schema::{DataSourceConnection, SearchIndex, SearchIndexer};

use crate::error::{MigrateResult, MigrationError};
use crate::resource::{ResourceRef, ResourceType};
use crate::service::SearchService;

/// A remote call seen by [`FakeService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(ResourceRef),
    Delete(ResourceRef),
}

#[derive(Debug, Default)]
pub struct FakeService {
    pub calls: Mutex<Vec<Call>>,
    pub live: Mutex<HashSet<ResourceRef>>,
    pub fail_create: Mutex<HashSet<String>>,
    pub fail_delete: Mutex<HashSet<String>>,
    pub vanish: Mutex<HashSet<String>>,
    pub indexes: Mutex<Vec<SearchIndex>>,
    pub indexers: Mutex<Vec<SearchIndexer>>,
    pub data_sources: Mutex<Vec<DataSourceConnection>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_live(self, kind: ResourceType, name: &str) -> Self {
        self.live.lock().insert(ResourceRef::new(kind, name));
        self
    }

    pub fn failing_create(self, name: &str) -> Self {
        self.fail_create.lock().insert(name.to_string());
        self
    }

    /// Creates of `name` succeed but leave nothing behind.
    pub fn vanishing_create(self, name: &str) -> Self {
        self.vanish.lock().insert(name.to_string());
        self
    }

    pub fn with_index(self, index: SearchIndex) -> Self {
        self.live.lock().insert(ResourceRef::new(ResourceType::Index, &index.name));
        self.indexes.lock().push(index);
        self
    }

    pub fn with_indexer(self, indexer: SearchIndexer) -> Self {
        self.live
            .lock()
            .insert(ResourceRef::new(ResourceType::Indexer, &indexer.name));
        self.indexers.lock().push(indexer);
        self
    }

    pub fn failing_delete(self, name: &str) -> Self {
        self.fail_delete.lock().insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn is_live(&self, kind: ResourceType, name: &str) -> bool {
        self.live.lock().contains(&ResourceRef::new(kind, name))
    }

    fn create(&self, kind: ResourceType, name: &str) -> MigrateResult<()> {
        let target = ResourceRef::new(kind, name);
        self.calls.lock().push(Call::Create(target.clone()));
        if self.fail_create.lock().contains(name) {
            return Err(MigrationError::service(400, format!("cannot create {name}")));
        }
        if self.vanish.lock().contains(name) {
            return Ok(());
        }
        if !self.live.lock().insert(target) {
            return Err(MigrationError::service(409, format!("{name} already exists")));
        }
        Ok(())
    }

    fn delete(&self, kind: ResourceType, name: &str) -> MigrateResult<()> {
        let target = ResourceRef::new(kind, name);
        self.calls.lock().push(Call::Delete(target.clone()));
        if self.fail_delete.lock().contains(name) {
            return Err(MigrationError::service(500, format!("cannot delete {name}")));
        }
        if !self.live.lock().remove(&target) {
            return Err(MigrationError::service(404, format!("{name} not found")));
        }
        Ok(())
    }

    /// Most recently stored definition of a live resource.
    fn stored<T: Clone>(
        &self,
        kind: ResourceType,
        name: &str,
        items: &Mutex<Vec<T>>,
        item_name: impl Fn(&T) -> &str,
    ) -> MigrateResult<T> {
        if !self.is_live(kind, name) {
            return Err(MigrationError::service(404, format!("{name} not found")));
        }
        items
            .lock()
            .iter()
            .rev()
            .find(|item| item_name(item) == name)
            .cloned()
            .ok_or_else(|| MigrationError::NotFound(name.to_string()))
    }

    fn names(&self, kind: ResourceType) -> Vec<String> {
        let mut names: Vec<String> = self
            .live
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.name.clone())
            .collect();
        names.sort();
        names
    }
}

#[async_trait]
impl SearchService for FakeService {
    async fn get_index(&self, name: &str) -> MigrateResult<SearchIndex> {
        self.stored(ResourceType::Index, name, &self.indexes, |i| i.name.as_str())
    }

    async fn create_index(&self, index: &SearchIndex) -> MigrateResult<SearchIndex> {
        self.create(ResourceType::Index, &index.name)?;
        self.indexes.lock().push(index.clone());
        Ok(index.clone())
    }

    async fn delete_index(&self, name: &str) -> MigrateResult<()> {
        self.delete(ResourceType::Index, name)
    }

    async fn list_index_names(&self) -> MigrateResult<Vec<String>> {
        Ok(self.names(ResourceType::Index))
    }

    async fn get_indexer(&self, name: &str) -> MigrateResult<SearchIndexer> {
        self.stored(ResourceType::Indexer, name, &self.indexers, |i| i.name.as_str())
    }

    async fn create_indexer(&self, indexer: &SearchIndexer) -> MigrateResult<SearchIndexer> {
        self.create(ResourceType::Indexer, &indexer.name)?;
        self.indexers.lock().push(indexer.clone());
        Ok(indexer.clone())
    }

    async fn delete_indexer(&self, name: &str) -> MigrateResult<()> {
        self.delete(ResourceType::Indexer, name)
    }

    async fn list_indexer_names(&self) -> MigrateResult<Vec<String>> {
        Ok(self.names(ResourceType::Indexer))
    }

    async fn get_data_source(&self, name: &str) -> MigrateResult<DataSourceConnection> {
        self.stored(ResourceType::DataSource, name, &self.data_sources, |d| d.name.as_str())
    }

    async fn create_data_source(
        &self,
        data_source: &DataSourceConnection,
    ) -> MigrateResult<DataSourceConnection> {
        self.create(ResourceType::DataSource, &data_source.name)?;
        self.data_sources.lock().push(data_source.clone());
        Ok(data_source.clone())
    }

    async fn delete_data_source(&self, name: &str) -> MigrateResult<()> {
        self.delete(ResourceType::DataSource, name)
    }

    async fn list_data_source_names(&self) -> MigrateResult<Vec<String>> {
        Ok(self.names(ResourceType::DataSource))
    }
}
