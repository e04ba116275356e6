//! Built (wire-form) search resources.
//!
//! These types mirror what the search service accepts on its create
//! endpoints. Every struct carries a flattened `extra` map so properties the
//! service returns but the schema layer does not own (etags, scoring
//! profiles, cache settings) survive a round trip untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Type name used by the service for a single complex field.
pub const COMPLEX_TYPE: &str = "Edm.ComplexType";

/// Type name used by the service for a collection of complex fields.
pub const COMPLEX_COLLECTION_TYPE: &str = "Collection(Edm.ComplexType)";

/// A search index ready to be submitted to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndex {
    /// Index name.
    pub name: String,
    /// Index fields.
    #[serde(default)]
    pub fields: Vec<SearchField>,
    /// Suggesters configured on the index.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggesters: Vec<Suggester>,
    /// Service-assigned entity tag.
    #[serde(default, rename = "@odata.etag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Properties not managed by the schema layer.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchIndex {
    /// Create an index with the given fields.
    pub fn new(name: impl Into<String>, fields: Vec<SearchField>) -> Self {
        Self {
            name: name.into(),
            fields,
            suggesters: Vec::new(),
            etag: None,
            extra: Map::new(),
        }
    }

    /// Find a top-level field by name.
    pub fn field(&self, name: &str) -> Option<&SearchField> {
        self.fields.iter().find(|f| f.name() == name)
    }
}

/// A suggester definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggester {
    /// Suggester name.
    pub name: String,
    /// Search mode, always `analyzingInfixMatching` today.
    #[serde(default = "default_search_mode")]
    pub search_mode: String,
    /// Fields the suggester draws from.
    pub source_fields: Vec<String>,
}

fn default_search_mode() -> String {
    "analyzingInfixMatching".to_string()
}

impl Suggester {
    /// Create a suggester over the given fields.
    pub fn new<I, S>(name: impl Into<String>, source_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            search_mode: default_search_mode(),
            source_fields: source_fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// A field of a search index.
///
/// On the wire both variants share one shape; a field carrying a `fields`
/// array is complex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchField {
    /// A complex or complex-collection field.
    Complex(ComplexField),
    /// A primitive field.
    Simple(SimpleField),
}

impl SearchField {
    /// Get the field name.
    pub fn name(&self) -> &str {
        match self {
            Self::Complex(f) => &f.name,
            Self::Simple(f) => &f.name,
        }
    }

    /// Get the service type name.
    pub fn field_type(&self) -> &str {
        match self {
            Self::Complex(f) => &f.field_type,
            Self::Simple(f) => &f.field_type,
        }
    }

    /// Check whether this is a complex field.
    pub fn is_complex(&self) -> bool {
        matches!(self, Self::Complex(_))
    }
}

impl From<SimpleField> for SearchField {
    fn from(field: SimpleField) -> Self {
        Self::Simple(field)
    }
}

impl From<ComplexField> for SearchField {
    fn from(field: ComplexField) -> Self {
        Self::Complex(field)
    }
}

/// A primitive index field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleField {
    /// Field name.
    pub name: String,
    /// Service type, e.g. `Edm.String`.
    #[serde(rename = "type")]
    pub field_type: String,
    /// Whether this is the document key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<bool>,
    /// Whether the field is omitted from search results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    /// Whether the field can be filtered on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filterable: Option<bool>,
    /// Whether the field can be faceted on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facetable: Option<bool>,
    /// Whether the field can be sorted on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortable: Option<bool>,
    /// Whether the field is full-text searchable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchable: Option<bool>,
    /// Analyzer used for indexing and querying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer_name: Option<String>,
    /// Properties not managed by the schema layer.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SimpleField {
    /// Create a field with no flags set.
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            key: None,
            hidden: None,
            filterable: None,
            facetable: None,
            sortable: None,
            searchable: None,
            analyzer_name: None,
            extra: Map::new(),
        }
    }
}

/// A complex field holding nested sub-fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexField {
    /// Field name.
    pub name: String,
    /// Either [`COMPLEX_TYPE`] or [`COMPLEX_COLLECTION_TYPE`].
    #[serde(rename = "type")]
    pub field_type: String,
    /// Nested fields.
    pub fields: Vec<SearchField>,
    /// Properties not managed by the schema layer.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComplexField {
    /// Create a single complex field.
    pub fn new(name: impl Into<String>, fields: Vec<SearchField>) -> Self {
        Self {
            name: name.into(),
            field_type: COMPLEX_TYPE.to_string(),
            fields,
            extra: Map::new(),
        }
    }

    /// Create a collection of complex fields.
    pub fn collection(name: impl Into<String>, fields: Vec<SearchField>) -> Self {
        Self {
            field_type: COMPLEX_COLLECTION_TYPE.to_string(),
            ..Self::new(name, fields)
        }
    }

    /// Check whether this is a collection.
    pub fn is_collection(&self) -> bool {
        self.field_type == COMPLEX_COLLECTION_TYPE
    }
}

/// An indexer job that populates an index from a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndexer {
    /// Indexer name.
    pub name: String,
    /// Name of the data source to read from.
    pub data_source_name: String,
    /// Name of the index to write to.
    pub target_index_name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Customer-managed encryption key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<Value>,
    /// Source to index field mappings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_mappings: Vec<FieldMapping>,
    /// Whether the indexer is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_disabled: Option<bool>,
    /// Skillset output to index field mappings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_field_mappings: Vec<FieldMapping>,
    /// Execution parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    /// Run schedule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<IndexingSchedule>,
    /// Skillset applied during indexing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skillset_name: Option<String>,
    /// Service-assigned entity tag.
    #[serde(default, rename = "@odata.etag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Properties not managed by the schema layer.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchIndexer {
    /// Create an indexer linking a data source to an index.
    pub fn new(
        name: impl Into<String>,
        data_source_name: impl Into<String>,
        target_index_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_source_name: data_source_name.into(),
            target_index_name: target_index_name.into(),
            description: None,
            encryption_key: None,
            field_mappings: Vec::new(),
            is_disabled: None,
            output_field_mappings: Vec::new(),
            parameters: None,
            schedule: None,
            skillset_name: None,
            etag: None,
            extra: Map::new(),
        }
    }
}

/// Maps a source field onto an index field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Field in the data source.
    pub source_field_name: String,
    /// Field in the index; defaults to the source name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_field_name: Option<String>,
    /// Transformation applied while mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_function: Option<MappingFunction>,
}

/// A field mapping transformation such as `base64Encode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingFunction {
    /// Function name.
    pub name: String,
    /// Function parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
}

/// How often an indexer runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingSchedule {
    /// ISO 8601 duration, e.g. `PT5M`.
    pub interval: String,
    /// When the schedule starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

/// A connection to an external data container.
///
/// `connection_string` may hold a secret placeholder (`@env(KEY)` or
/// `@kv(KEY)`); it is stored in this form and only resolved right before the
/// service call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceConnection {
    /// Data source name.
    pub name: String,
    /// Data source kind, e.g. `azureblob` or `azuresql`.
    #[serde(rename = "type")]
    pub data_source_type: String,
    /// Connection string or secret placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    /// Container to read from.
    pub container: DataContainer,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Change detection policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_change_detection_policy: Option<Value>,
    /// Deletion detection policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_deletion_detection_policy: Option<Value>,
    /// Customer-managed encryption key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<Value>,
    /// Service-assigned entity tag.
    #[serde(default, rename = "@odata.etag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Properties not managed by the schema layer.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DataSourceConnection {
    /// Create a data source reading from the named container.
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
            etag: None,
            extra: Map::new(),
        }
    }
}

/// The container (table, collection, blob container) a data source reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataContainer {
    /// Container name.
    pub name: String,
    /// Optional query narrowing the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_field_untagged_deserialization() {
        let simple: SearchField =
            serde_json::from_value(json!({"name": "id", "type": "Edm.String", "key": true}))
                .unwrap();
        assert!(!simple.is_complex());

        let complex: SearchField = serde_json::from_value(json!({
            "name": "address",
            "type": "Edm.ComplexType",
            "fields": [{"name": "city", "type": "Edm.String"}]
        }))
        .unwrap();
        assert!(complex.is_complex());
        assert_eq!(complex.name(), "address");
    }

    #[test]
    fn test_unmanaged_properties_round_trip() {
        let value = json!({
            "name": "hotels",
            "fields": [{"name": "id", "type": "Edm.String", "key": true}],
            "@odata.etag": "\"0x1\"",
            "scoringProfiles": []
        });

        let index: SearchIndex = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(index.etag.as_deref(), Some("\"0x1\""));
        assert!(index.extra.contains_key("scoringProfiles"));
        assert_eq!(serde_json::to_value(&index).unwrap(), value);
    }

    #[test]
    fn test_data_source_camel_case() {
        let mut ds = DataSourceConnection::new("hotels-ds", "azureblob", "hotels");
        ds.connection_string = Some("@env(BLOB_CONN)".to_string());

        let value = serde_json::to_value(&ds).unwrap();
        assert_eq!(value["connectionString"], "@env(BLOB_CONN)");
        assert_eq!(value["type"], "azureblob");
        assert_eq!(value["container"]["name"], "hotels");
    }

    #[test]
    fn test_complex_collection() {
        let field = ComplexField::collection("rooms", vec![SimpleField::new("beds", "Edm.Int32").into()]);
        assert!(field.is_collection());
        assert_eq!(field.field_type, COMPLEX_COLLECTION_TYPE);
    }
}
