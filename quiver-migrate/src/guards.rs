//! Structural validation of raw state records.
//!
//! State read from an external store is untyped. It is validated exactly once
//! at the adapter boundary with [`parse_resource`]; everything downstream
//! works with typed [`Resource`] values. Malformed records are never dropped
//! silently: they fail with [`MigrationError::InvalidResource`].

use serde_json::Value;

use crate::error::{MigrateResult, MigrationError};
use crate::resource::{Resource, ResourceType};

/// Classify a raw record, returning `None` when it matches no known shape.
///
/// A record must be an object with string `id`, `name` and `checksum`
/// properties and a `type` literal of `index`, `indexer` or `dataSource`.
pub fn resource_kind(value: &Value) -> Option<ResourceType> {
    let object = value.as_object()?;

    for key in ["id", "name", "checksum"] {
        if !object.get(key).is_some_and(Value::is_string) {
            return None;
        }
    }

    object.get("type")?.as_str()?.parse().ok()
}

/// Check whether a raw record is an index resource.
pub fn is_index_resource(value: &Value) -> bool {
    resource_kind(value) == Some(ResourceType::Index)
}

/// Check whether a raw record is an indexer resource.
pub fn is_indexer_resource(value: &Value) -> bool {
    resource_kind(value) == Some(ResourceType::Indexer)
}

/// Check whether a raw record is a data source resource.
pub fn is_data_source_resource(value: &Value) -> bool {
    resource_kind(value) == Some(ResourceType::DataSource)
}

/// Validate and convert a raw record.
pub fn parse_resource(value: &Value) -> MigrateResult<Resource> {
    if resource_kind(value).is_none() {
        return Err(MigrationError::invalid_resource(value.to_string()));
    }
    Ok(serde_json::from_value(value.clone())?)
}

/// Validate and convert a list of raw records, failing on the first bad one.
pub fn parse_resources(values: &[Value]) -> MigrateResult<Vec<Resource>> {
    values.iter().map(parse_resource).collect()
}

/// State resources partitioned by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateResources {
    /// Index records.
    pub indexes: Vec<Resource>,
    /// Indexer records.
    pub indexers: Vec<Resource>,
    /// Data source records.
    pub data_sources: Vec<Resource>,
}

impl StateResources {
    /// Split resources by kind.
    pub fn partition(resources: impl IntoIterator<Item = Resource>) -> Self {
        let mut state = Self::default();
        for resource in resources {
            match resource.kind {
                ResourceType::Index => state.indexes.push(resource),
                ResourceType::Indexer => state.indexers.push(resource),
                ResourceType::DataSource => state.data_sources.push(resource),
            }
        }
        state
    }

    /// Records of one kind.
    pub fn of_kind(&self, kind: ResourceType) -> &[Resource] {
        match kind {
            ResourceType::Index => &self.indexes,
            ResourceType::Indexer => &self.indexers,
            ResourceType::DataSource => &self.data_sources,
        }
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.indexes.len() + self.indexers.len() + self.data_sources.len()
    }

    /// Check whether no records exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
