//! Declarations of desired search resources.
//!
//! A declaration is an immutable description of an index, indexer or data
//! source. Calling `build()` produces the wire form from [`crate::resource`]
//! without side effects, so the same declaration always builds the same
//! resource.
//!
//! ```rust
//! use quiver_schema::{FieldDefinition, IndexDefinition};
//!
//! let hotels = IndexDefinition::new("hotels")
//!     .field("id", FieldDefinition::string().key())
//!     .field("name", FieldDefinition::string().searchable().sortable())
//!     .field(
//!         "address",
//!         FieldDefinition::complex([("city", FieldDefinition::string().filterable())]),
//!     );
//!
//! let built = hotels.build();
//! assert_eq!(built.fields.len(), 3);
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::resource::{
    ComplexField, DataContainer, DataSourceConnection, FieldMapping, IndexingSchedule,
    SearchField, SearchIndex, SearchIndexer, SimpleField, Suggester,
};

/// Primitive field types understood by the search service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// `Edm.String`
    #[serde(rename = "Edm.String")]
    String,
    /// `Edm.Int32`
    #[serde(rename = "Edm.Int32")]
    Int32,
    /// `Edm.Int64`
    #[serde(rename = "Edm.Int64")]
    Int64,
    /// `Edm.Double`
    #[serde(rename = "Edm.Double")]
    Double,
    /// `Edm.Boolean`
    #[serde(rename = "Edm.Boolean")]
    Boolean,
    /// `Edm.DateTimeOffset`
    #[serde(rename = "Edm.DateTimeOffset")]
    DateTimeOffset,
    /// `Edm.GeographyPoint`
    #[serde(rename = "Edm.GeographyPoint")]
    GeographyPoint,
}

impl ScalarType {
    /// The service type name.
    pub fn edm_name(&self) -> &'static str {
        match self {
            Self::String => "Edm.String",
            Self::Int32 => "Edm.Int32",
            Self::Int64 => "Edm.Int64",
            Self::Double => "Edm.Double",
            Self::Boolean => "Edm.Boolean",
            Self::DateTimeOffset => "Edm.DateTimeOffset",
            Self::GeographyPoint => "Edm.GeographyPoint",
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.edm_name())
    }
}

/// A declared index field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldDefinition {
    /// A primitive field.
    Simple(SimpleFieldDefinition),
    /// A single nested object.
    Complex(ComplexFieldDefinition),
    /// A list of nested objects.
    Collection(ComplexFieldDefinition),
}

impl FieldDefinition {
    /// Start a simple field of the given type.
    pub fn simple(scalar: ScalarType) -> SimpleFieldDefinition {
        SimpleFieldDefinition::new(scalar)
    }

    /// Start an `Edm.String` field.
    pub fn string() -> SimpleFieldDefinition {
        SimpleFieldDefinition::new(ScalarType::String)
    }

    /// Start an `Edm.Int32` field.
    pub fn int32() -> SimpleFieldDefinition {
        SimpleFieldDefinition::new(ScalarType::Int32)
    }

    /// Start an `Edm.Int64` field.
    pub fn int64() -> SimpleFieldDefinition {
        SimpleFieldDefinition::new(ScalarType::Int64)
    }

    /// Start an `Edm.Double` field.
    pub fn double() -> SimpleFieldDefinition {
        SimpleFieldDefinition::new(ScalarType::Double)
    }

    /// Start an `Edm.Boolean` field.
    pub fn boolean() -> SimpleFieldDefinition {
        SimpleFieldDefinition::new(ScalarType::Boolean)
    }

    /// Start an `Edm.DateTimeOffset` field.
    pub fn date_time() -> SimpleFieldDefinition {
        SimpleFieldDefinition::new(ScalarType::DateTimeOffset)
    }

    /// Start an `Edm.GeographyPoint` field.
    pub fn geography_point() -> SimpleFieldDefinition {
        SimpleFieldDefinition::new(ScalarType::GeographyPoint)
    }

    /// A complex field with the given children.
    pub fn complex<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldDefinition>,
    {
        Self::Complex(ComplexFieldDefinition::new(fields))
    }

    /// A complex collection field with the given children.
    pub fn collection<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldDefinition>,
    {
        Self::Collection(ComplexFieldDefinition::new(fields))
    }

    /// The wire name, falling back to the declaration key.
    pub fn resolved_name<'a>(&'a self, key: &'a str) -> &'a str {
        let name = match self {
            Self::Simple(f) => f.name.as_deref(),
            Self::Complex(f) | Self::Collection(f) => f.name.as_deref(),
        };
        name.unwrap_or(key)
    }

    /// Nested fields of a complex or collection field.
    pub fn children(&self) -> Option<&IndexMap<String, FieldDefinition>> {
        match self {
            Self::Simple(_) => None,
            Self::Complex(f) | Self::Collection(f) => Some(&f.fields),
        }
    }

    /// Build the wire form of this field.
    pub fn build(&self, key: &str) -> SearchField {
        let name = self.resolved_name(key).to_string();
        match self {
            Self::Simple(f) => f.build_named(name).into(),
            Self::Complex(f) => ComplexField::new(name, f.build_children()).into(),
            Self::Collection(f) => ComplexField::collection(name, f.build_children()).into(),
        }
    }
}

impl From<SimpleFieldDefinition> for FieldDefinition {
    fn from(field: SimpleFieldDefinition) -> Self {
        Self::Simple(field)
    }
}

/// Declaration of a primitive field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleFieldDefinition {
    /// Wire name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Primitive type.
    #[serde(rename = "type")]
    pub scalar: ScalarType,
    /// Whether the field holds a list of `scalar` values.
    #[serde(default)]
    pub collection: bool,
    /// Document key.
    #[serde(default)]
    pub key: bool,
    /// Omitted from results.
    #[serde(default)]
    pub hidden: bool,
    /// Filterable.
    #[serde(default)]
    pub filterable: bool,
    /// Facetable.
    #[serde(default)]
    pub facetable: bool,
    /// Sortable.
    #[serde(default)]
    pub sortable: bool,
    /// Full-text searchable.
    #[serde(default)]
    pub searchable: bool,
    /// Analyzer name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
}

impl SimpleFieldDefinition {
    /// Create a field of the given type with every flag off.
    pub fn new(scalar: ScalarType) -> Self {
        Self {
            name: None,
            scalar,
            collection: false,
            key: false,
            hidden: false,
            filterable: false,
            facetable: false,
            sortable: false,
            searchable: false,
            analyzer: None,
        }
    }

    /// Override the wire name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Make this a `Collection(...)` of the scalar type.
    pub fn list(mut self) -> Self {
        self.collection = true;
        self
    }

    /// Mark as the document key.
    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    /// Hide from results.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Allow filtering.
    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    /// Allow faceting.
    pub fn facetable(mut self) -> Self {
        self.facetable = true;
        self
    }

    /// Allow sorting.
    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    /// Allow full-text search.
    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    /// Set the analyzer.
    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    /// The service type name, including the collection wrapper.
    pub fn type_name(&self) -> String {
        if self.collection {
            format!("Collection({})", self.scalar.edm_name())
        } else {
            self.scalar.edm_name().to_string()
        }
    }

    fn build_named(&self, name: String) -> SimpleField {
        // Every managed flag is emitted explicitly so the checksum of a
        // built field never depends on service defaults.
        SimpleField {
            key: Some(self.key),
            hidden: Some(self.hidden),
            filterable: Some(self.filterable),
            facetable: Some(self.facetable),
            sortable: Some(self.sortable),
            searchable: Some(self.searchable),
            analyzer_name: self.analyzer.clone(),
            ..SimpleField::new(name, self.type_name())
        }
    }
}

/// Declaration of a complex or collection field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexFieldDefinition {
    /// Wire name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Nested fields keyed by logical name.
    #[serde(default)]
    pub fields: IndexMap<String, FieldDefinition>,
}

impl ComplexFieldDefinition {
    /// Create a definition from its children.
    pub fn new<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldDefinition>,
    {
        Self {
            name: None,
            fields: fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    fn build_children(&self) -> Vec<SearchField> {
        self.fields.iter().map(|(key, f)| f.build(key)).collect()
    }
}

/// Declaration of a search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    /// Index name.
    pub name: String,
    /// Fields keyed by logical name.
    #[serde(default)]
    pub fields: IndexMap<String, FieldDefinition>,
    /// Suggesters.
    #[serde(default)]
    pub suggesters: Vec<Suggester>,
}

impl IndexDefinition {
    /// Start an index with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            suggesters: Vec::new(),
        }
    }

    /// Add a field.
    pub fn field(mut self, key: impl Into<String>, field: impl Into<FieldDefinition>) -> Self {
        self.fields.insert(key.into(), field.into());
        self
    }

    /// Add a suggester.
    pub fn suggester(mut self, suggester: Suggester) -> Self {
        self.suggesters.push(suggester);
        self
    }

    /// Build the wire form.
    pub fn build(&self) -> SearchIndex {
        let fields = self.fields.iter().map(|(key, f)| f.build(key)).collect();
        let mut index = SearchIndex::new(&self.name, fields);
        index.suggesters = self.suggesters.clone();
        index
    }
}

/// Declaration of an indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerDefinition {
    /// Indexer name.
    pub name: String,
    /// Data source the indexer reads.
    pub data_source_name: String,
    /// Index the indexer writes.
    pub target_index_name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Run schedule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<IndexingSchedule>,
    /// Field mappings.
    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,
    /// Output field mappings.
    #[serde(default)]
    pub output_field_mappings: Vec<FieldMapping>,
    /// Execution parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    /// Skillset name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skillset_name: Option<String>,
    /// Start disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_disabled: Option<bool>,
    /// Encryption key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<Value>,
}

impl IndexerDefinition {
    /// Start an indexer from `data_source` into `target_index`.
    pub fn new(
        name: impl Into<String>,
        data_source: impl Into<String>,
        target_index: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_source_name: data_source.into(),
            target_index_name: target_index.into(),
            description: None,
            schedule: None,
            field_mappings: Vec::new(),
            output_field_mappings: Vec::new(),
            parameters: None,
            skillset_name: None,
            is_disabled: None,
            encryption_key: None,
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Run on an ISO 8601 interval such as `PT5M`.
    pub fn schedule(mut self, interval: impl Into<String>) -> Self {
        self.schedule = Some(IndexingSchedule {
            interval: interval.into(),
            start_time: None,
        });
        self
    }

    /// Add a field mapping.
    pub fn field_mapping(mut self, mapping: FieldMapping) -> Self {
        self.field_mappings.push(mapping);
        self
    }

    /// Set execution parameters.
    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Build the wire form.
    pub fn build(&self) -> SearchIndexer {
        SearchIndexer {
            description: self.description.clone(),
            encryption_key: self.encryption_key.clone(),
            field_mappings: self.field_mappings.clone(),
            is_disabled: self.is_disabled,
            output_field_mappings: self.output_field_mappings.clone(),
            parameters: self.parameters.clone(),
            schedule: self.schedule.clone(),
            skillset_name: self.skillset_name.clone(),
            ..SearchIndexer::new(&self.name, &self.data_source_name, &self.target_index_name)
        }
    }
}

/// Declaration of a data source connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceDefinition {
    /// Data source name.
    pub name: String,
    /// Data source kind, e.g. `azureblob`.
    #[serde(rename = "type")]
    pub data_source_type: String,
    /// Connection string, usually a secret placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    /// Container to read.
    pub container: DataContainer,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Change detection policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_change_detection_policy: Option<Value>,
    /// Deletion detection policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_deletion_detection_policy: Option<Value>,
    /// Encryption key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<Value>,
}

impl DataSourceDefinition {
    /// Start a data source reading `container`.
    pub fn new(
        name: impl Into<String>,
        data_source_type: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_source_type: data_source_type.into(),
            connection_string: None,
            container: DataContainer {
                name: container.into(),
                query: None,
            },
            description: None,
            data_change_detection_policy: None,
            data_deletion_detection_policy: None,
            encryption_key: None,
        }
    }

    /// Set the connection string or placeholder.
    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Build the wire form.
    pub fn build(&self) -> DataSourceConnection {
        DataSourceConnection {
            name: self.name.clone(),
            data_source_type: self.data_source_type.clone(),
            connection_string: self.connection_string.clone(),
            container: self.container.clone(),
            description: self.description.clone(),
            data_change_detection_policy: self.data_change_detection_policy.clone(),
            data_deletion_detection_policy: self.data_deletion_detection_policy.clone(),
            encryption_key: self.encryption_key.clone(),
            etag: None,
            extra: Map::new(),
        }
    }
}
