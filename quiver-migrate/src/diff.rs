//! Diffing declared resources against recorded state.
//!
//! Resources are matched by name within one kind. A declared resource with no
//! state record is created, a state record with no declaration is deleted and
//! a resource present on both sides whose built checksum differs from the
//! stored one is updated (realised later as delete then create).

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

use quiver_schema::{
    DataSourceConnection, DataSourceDefinition, IndexDefinition, IndexerDefinition, Schema,
    SearchIndex, SearchIndexer,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::checksum::{data_source_checksum, index_checksum, indexer_checksum};
use crate::error::{MigrateResult, MigrationError};
use crate::guards::StateResources;
use crate::resource::{Resource, ResourceType};

/// A service-submittable resource.
pub trait BuiltResource: Debug + Clone + Serialize + DeserializeOwned + Send + Sync {
    /// Resource kind.
    const KIND: ResourceType;

    /// Resource name.
    fn name(&self) -> &str;

    /// Checksum of the managed properties.
    fn checksum(&self) -> String;
}

impl BuiltResource for SearchIndex {
    const KIND: ResourceType = ResourceType::Index;

    fn name(&self) -> &str {
        &self.name
    }

    fn checksum(&self) -> String {
        index_checksum(self)
    }
}

impl BuiltResource for SearchIndexer {
    const KIND: ResourceType = ResourceType::Indexer;

    fn name(&self) -> &str {
        &self.name
    }

    fn checksum(&self) -> String {
        indexer_checksum(self)
    }
}

impl BuiltResource for DataSourceConnection {
    const KIND: ResourceType = ResourceType::DataSource;

    fn name(&self) -> &str {
        &self.name
    }

    fn checksum(&self) -> String {
        data_source_checksum(self)
    }
}

/// A declaration that builds into a [`BuiltResource`].
pub trait DeclaredResource: Debug + Clone {
    /// The built form.
    type Built: BuiltResource;

    /// Declared name.
    fn name(&self) -> &str;

    /// Build the service-submittable form.
    fn build(&self) -> Self::Built;
}

impl DeclaredResource for IndexDefinition {
    type Built = SearchIndex;

    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self) -> SearchIndex {
        IndexDefinition::build(self)
    }
}

impl DeclaredResource for IndexerDefinition {
    type Built = SearchIndexer;

    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self) -> SearchIndexer {
        IndexerDefinition::build(self)
    }
}

impl DeclaredResource for DataSourceDefinition {
    type Built = DataSourceConnection;

    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self) -> DataSourceConnection {
        DataSourceDefinition::build(self)
    }
}

/// Create, delete and update sets for one resource kind.
#[derive(Debug, Clone)]
pub struct MigrationActions<T: DeclaredResource> {
    /// Declared resources with no state record.
    pub create: Vec<T>,
    /// State records with no declaration.
    pub delete: Vec<Resource>,
    /// Built resources paired with their stale state record.
    pub update: Vec<(T::Built, Resource)>,
}

impl<T: DeclaredResource> Default for MigrationActions<T> {
    fn default() -> Self {
        Self {
            create: Vec::new(),
            delete: Vec::new(),
            update: Vec::new(),
        }
    }
}

impl<T: DeclaredResource> MigrationActions<T> {
    /// Check if there are any actions.
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.delete.is_empty() && self.update.is_empty()
    }

    /// Names of updated resources.
    pub fn updated_names(&self) -> Vec<&str> {
        self.update.iter().map(|(built, _)| built.name()).collect()
    }
}

/// Compute the actions needed to bring one kind of state in line with the
/// declared resources.
///
/// State records of other kinds are ignored. A record matched by name whose
/// stored checksum is empty fails with [`MigrationError::MissingChecksum`]
/// rather than being treated as unchanged.
pub fn compute_migration_actions<'a, T, I>(
    desired: I,
    state: &[Resource],
) -> MigrateResult<MigrationActions<T>>
where
    T: DeclaredResource + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let kind = <T::Built as BuiltResource>::KIND;
    let state: Vec<&Resource> = state.iter().filter(|r| r.kind == kind).collect();
    let by_name: HashMap<&str, &Resource> = state.iter().map(|r| (r.name.as_str(), *r)).collect();

    let mut actions = MigrationActions::default();
    let mut declared = HashSet::new();

    for resource in desired {
        declared.insert(resource.name().to_string());

        let Some(stored) = by_name.get(resource.name()) else {
            actions.create.push(resource.clone());
            continue;
        };

        let saved = stored
            .stored_checksum()
            .ok_or_else(|| MigrationError::MissingChecksum {
                kind,
                name: stored.name.clone(),
            })?;

        let built = resource.build();
        if built.checksum() != saved {
            tracing::debug!(kind = %kind, name = %stored.name, "checksum changed");
            actions.update.push((built, (*stored).clone()));
        }
    }

    actions.delete = state
        .into_iter()
        .filter(|r| !declared.contains(&r.name))
        .cloned()
        .collect();

    Ok(actions)
}

/// The full plan across all three resource kinds.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Index actions.
    pub indexes: MigrationActions<IndexDefinition>,
    /// Indexer actions.
    pub indexers: MigrationActions<IndexerDefinition>,
    /// Data source actions.
    pub data_sources: MigrationActions<DataSourceDefinition>,
}

impl Plan {
    /// Diff a schema against partitioned state.
    pub fn compute(schema: &Schema, state: &StateResources) -> MigrateResult<Self> {
        Ok(Self {
            indexes: compute_migration_actions(schema.indexes.values(), &state.indexes)?,
            indexers: compute_migration_actions(schema.indexers.values(), &state.indexers)?,
            data_sources: compute_migration_actions(
                schema.data_sources.values(),
                &state.data_sources,
            )?,
        })
    }

    /// Check if there are any differences.
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty() && self.indexers.is_empty() && self.data_sources.is_empty()
    }

    /// Get a human-readable summary of the plan.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        push_counts(&mut parts, "data sources", &self.data_sources);
        push_counts(&mut parts, "indexes", &self.indexes);
        push_counts(&mut parts, "indexers", &self.indexers);

        if parts.is_empty() {
            "No changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

fn push_counts<T: DeclaredResource>(parts: &mut Vec<String>, label: &str, actions: &MigrationActions<T>) {
    if !actions.create.is_empty() {
        parts.push(format!("Create {} {}", actions.create.len(), label));
    }
    if !actions.update.is_empty() {
        parts.push(format!("Update {} {}", actions.update.len(), label));
    }
    if !actions.delete.is_empty() {
        parts.push(format!("Delete {} {}", actions.delete.len(), label));
    }
}
