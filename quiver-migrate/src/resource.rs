//! Persisted resource records.
//!
//! The state store keeps one [`Resource`] per live index, indexer or data
//! source, holding the checksum of the definition last applied to it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MigrationError;

/// The three kinds of managed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceType {
    /// A search index.
    Index,
    /// An indexer job.
    Indexer,
    /// A data source connection.
    DataSource,
}

impl ResourceType {
    /// Kinds in apply order: dependencies before dependents.
    pub const APPLY_ORDER: [ResourceType; 3] = [Self::DataSource, Self::Index, Self::Indexer];

    /// The literal stored in the `type` discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Indexer => "indexer",
            Self::DataSource => "dataSource",
        }
    }

    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Indexer => "indexer",
            Self::DataSource => "data source",
        }
    }

    /// Plural label.
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Index => "indexes",
            Self::Indexer => "indexers",
            Self::DataSource => "data sources",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResourceType {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "index" => Ok(Self::Index),
            "indexer" => Ok(Self::Indexer),
            "dataSource" => Ok(Self::DataSource),
            other => Err(MigrationError::invalid_resource(format!(
                "unknown resource type '{other}'"
            ))),
        }
    }
}

/// A resource record owned by the state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Identifier assigned by the state store.
    pub id: String,
    /// Resource name, unique per kind.
    pub name: String,
    /// Checksum of the last applied definition.
    pub checksum: String,
    /// Resource kind.
    #[serde(rename = "type")]
    pub kind: ResourceType,
}

impl Resource {
    /// Key used to register rollbacks, e.g. `index_hotels`.
    pub fn type_name(&self) -> String {
        type_name(self.kind, &self.name)
    }

    /// The stored checksum, treating an empty string as absent.
    pub fn stored_checksum(&self) -> Option<&str> {
        Some(self.checksum.as_str()).filter(|c| !c.is_empty())
    }
}

/// Build the `type_name` key for a resource.
pub fn type_name(kind: ResourceType, name: &str) -> String {
    format!("{}_{}", kind.as_str(), name)
}

/// Data for a resource record that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResource {
    /// Resource name.
    pub name: String,
    /// Resource kind.
    #[serde(rename = "type")]
    pub kind: ResourceType,
    /// Checksum of the applied definition.
    pub checksum: String,
}

impl NewResource {
    /// Create new resource data.
    pub fn new(kind: ResourceType, name: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            checksum: checksum.into(),
        }
    }
}

/// Partial update of a resource record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUpdate {
    /// New name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New checksum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// A store-agnostic reference to a resource.
///
/// This is the form used for deletes inside migration files; it carries no
/// store identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceRef {
    /// Resource name.
    pub name: String,
    /// Resource kind.
    #[serde(rename = "type")]
    pub kind: ResourceType,
}

impl ResourceRef {
    /// Create a reference.
    pub fn new(kind: ResourceType, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Key used to register rollbacks.
    pub fn type_name(&self) -> String {
        type_name(self.kind, &self.name)
    }
}

impl From<&Resource> for ResourceRef {
    fn from(resource: &Resource) -> Self {
        Self::new(resource.kind, resource.name.clone())
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}
