//! The declared schema: every index, indexer and data source a project
//! wants to exist on the search service.
//!
//! Schemas are usually loaded from TOML:
//!
//! ```toml
//! [indexes.hotels]
//! name = "hotels"
//!
//! [indexes.hotels.fields.id]
//! kind = "simple"
//! type = "Edm.String"
//! key = true
//!
//! [dataSources.hotels]
//! name = "hotels-ds"
//! type = "azureblob"
//! connectionString = "@kv(hotels-blob)"
//! container = { name = "hotels" }
//!
//! [indexers.hotels]
//! name = "hotels-indexer"
//! dataSourceName = "hotels-ds"
//! targetIndexName = "hotels"
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::definition::{DataSourceDefinition, FieldDefinition, IndexDefinition, IndexerDefinition};
use crate::error::{SchemaError, SchemaResult};

/// A complete set of resource declarations keyed by logical name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Schema {
    /// Declared indexes.
    #[serde(default)]
    pub indexes: IndexMap<String, IndexDefinition>,
    /// Declared indexers.
    #[serde(default)]
    pub indexers: IndexMap<String, IndexerDefinition>,
    /// Declared data sources.
    #[serde(default)]
    pub data_sources: IndexMap<String, DataSourceDefinition>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a schema from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading schema");
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        content.parse()
    }

    /// Add an index declaration.
    pub fn index(mut self, key: impl Into<String>, index: IndexDefinition) -> Self {
        self.indexes.insert(key.into(), index);
        self
    }

    /// Add an indexer declaration.
    pub fn indexer(mut self, key: impl Into<String>, indexer: IndexerDefinition) -> Self {
        self.indexers.insert(key.into(), indexer);
        self
    }

    /// Add a data source declaration.
    pub fn data_source(mut self, key: impl Into<String>, data_source: DataSourceDefinition) -> Self {
        self.data_sources.insert(key.into(), data_source);
        self
    }

    /// Check whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty() && self.indexers.is_empty() && self.data_sources.is_empty()
    }

    /// Validate the schema, collecting every problem found.
    pub fn validate(&self) -> SchemaResult<()> {
        let mut errors = Vec::new();

        let mut seen = HashSet::new();
        for (key, index) in &self.indexes {
            if index.name.trim().is_empty() {
                errors.push(SchemaError::EmptyName {
                    kind: "index".to_string(),
                    key: key.clone(),
                });
            } else if !seen.insert(index.name.as_str()) {
                errors.push(SchemaError::duplicate("index", &index.name));
            }
            validate_index(index, &mut errors);
        }

        let mut seen = HashSet::new();
        for (key, indexer) in &self.indexers {
            if indexer.name.trim().is_empty() {
                errors.push(SchemaError::EmptyName {
                    kind: "indexer".to_string(),
                    key: key.clone(),
                });
            } else if !seen.insert(indexer.name.as_str()) {
                errors.push(SchemaError::duplicate("indexer", &indexer.name));
            }
        }

        let mut seen = HashSet::new();
        for (key, data_source) in &self.data_sources {
            if data_source.name.trim().is_empty() {
                errors.push(SchemaError::EmptyName {
                    kind: "data source".to_string(),
                    key: key.clone(),
                });
            } else if !seen.insert(data_source.name.as_str()) {
                errors.push(SchemaError::duplicate("data source", &data_source.name));
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            count => Err(SchemaError::ValidationFailed { count, errors }),
        }
    }

    /// Indexer references to data sources or indexes this schema does not
    /// declare.
    ///
    /// These are warnings rather than errors since the target may already
    /// exist on the service outside of this schema.
    pub fn dangling_references(&self) -> Vec<String> {
        let indexes: HashSet<&str> = self.indexes.values().map(|i| i.name.as_str()).collect();
        let data_sources: HashSet<&str> =
            self.data_sources.values().map(|d| d.name.as_str()).collect();

        let mut warnings = Vec::new();
        for indexer in self.indexers.values() {
            if !data_sources.contains(indexer.data_source_name.as_str()) {
                warnings.push(format!(
                    "indexer `{}` reads undeclared data source `{}`",
                    indexer.name, indexer.data_source_name
                ));
            }
            if !indexes.contains(indexer.target_index_name.as_str()) {
                warnings.push(format!(
                    "indexer `{}` writes undeclared index `{}`",
                    indexer.name, indexer.target_index_name
                ));
            }
        }
        warnings
    }
}

impl FromStr for Schema {
    type Err = SchemaError;

    fn from_str(content: &str) -> SchemaResult<Self> {
        toml::from_str(content).map_err(|e| SchemaError::TomlError { source: e })
    }
}

fn validate_index(index: &IndexDefinition, errors: &mut Vec<SchemaError>) {
    if index.fields.is_empty() {
        errors.push(SchemaError::invalid_index(&index.name, "index has no fields"));
        return;
    }

    let keys = index
        .fields
        .values()
        .filter(|f| matches!(f, FieldDefinition::Simple(s) if s.key))
        .count();
    if keys != 1 {
        errors.push(SchemaError::invalid_index(
            &index.name,
            format!("expected exactly one key field, found {keys}"),
        ));
    }

    validate_fields(&index.name, &index.fields, errors);
}

fn validate_fields(
    index: &str,
    fields: &IndexMap<String, FieldDefinition>,
    errors: &mut Vec<SchemaError>,
) {
    let mut names = HashSet::new();
    for (key, field) in fields {
        let name = field.resolved_name(key);
        if name.trim().is_empty() {
            errors.push(SchemaError::invalid_field(index, key, "field name is empty"));
        } else if !names.insert(name) {
            errors.push(SchemaError::invalid_field(index, name, "duplicate field name"));
        }

        if let Some(children) = field.children() {
            if children.is_empty() {
                errors.push(SchemaError::invalid_field(
                    index,
                    name,
                    "complex field has no sub-fields",
                ));
            }
            validate_fields(index, children, errors);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::SearchField;
    use pretty_assertions::assert_eq;

    const HOTELS: &str = r#"
[indexes.hotels]
name = "hotels"

[indexes.hotels.fields.id]
kind = "simple"
type = "Edm.String"
key = true

[indexes.hotels.fields.tags]
kind = "simple"
type = "Edm.String"
collection = true
filterable = true

[indexes.hotels.fields.address]
kind = "complex"

[indexes.hotels.fields.address.fields.city]
kind = "simple"
type = "Edm.String"
searchable = true

[[indexes.hotels.suggesters]]
name = "sg"
sourceFields = ["tags"]

[dataSources.hotels]
name = "hotels-ds"
type = "azureblob"
connectionString = "@kv(hotels-blob)"
container = { name = "hotels" }

[indexers.hotels]
name = "hotels-indexer"
dataSourceName = "hotels-ds"
targetIndexName = "hotels"
schedule = { interval = "PT5M" }
"#;

    #[test]
    fn test_parse_toml() {
        let schema: Schema = HOTELS.parse().unwrap();

        assert_eq!(schema.indexes.len(), 1);
        assert_eq!(schema.indexers.len(), 1);
        assert_eq!(schema.data_sources.len(), 1);
        assert!(schema.validate().is_ok());
        assert!(schema.dangling_references().is_empty());

        let index = schema.indexes["hotels"].build();
        assert_eq!(index.fields.len(), 3);
        assert_eq!(index.suggesters[0].search_mode, "analyzingInfixMatching");
        assert_eq!(index.field("tags").unwrap().field_type(), "Collection(Edm.String)");
        let Some(SearchField::Complex(address)) = index.field("address") else {
            panic!("expected complex field");
        };
        assert_eq!(address.fields[0].name(), "city");
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result: SchemaResult<Schema> = "[models.user]\nname = \"x\"".parse();
        assert!(matches!(result, Err(SchemaError::TomlError { .. })));
    }

    #[test]
    fn test_duplicate_names() {
        let schema = Schema::new()
            .index("a", IndexDefinition::new("hotels").field("id", FieldDefinition::string().key()))
            .index("b", IndexDefinition::new("hotels").field("id", FieldDefinition::string().key()));

        let err = schema.validate().unwrap_err();
        assert!(matches!(err, SchemaError::Duplicate { .. }));
    }

    #[test]
    fn test_complex_without_children() {
        let schema = Schema::new().index(
            "hotels",
            IndexDefinition::new("hotels")
                .field("id", FieldDefinition::string().key())
                .field("address", FieldDefinition::complex(Vec::<(String, FieldDefinition)>::new())),
        );

        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("hotels.address"));
    }

    #[test]
    fn test_collects_multiple_errors() {
        let schema = Schema::new()
            .index("empty", IndexDefinition::new("empty"))
            .indexer("x", IndexerDefinition::new("", "ds", "idx"));

        match schema.validate() {
            Err(SchemaError::ValidationFailed { count, .. }) => assert_eq!(count, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_key_field() {
        let schema = Schema::new().index(
            "hotels",
            IndexDefinition::new("hotels").field("name", FieldDefinition::string()),
        );
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_dangling_references() {
        let schema = Schema::new().indexer("x", IndexerDefinition::new("idxr", "ds", "idx"));
        let warnings = schema.dangling_references();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("`ds`"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("schema.toml");
        std::fs::write(&path, HOTELS).unwrap();

        let schema = Schema::from_file(&path).unwrap();
        assert_eq!(schema.indexes.len(), 1);

        let missing = Schema::from_file(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(SchemaError::IoError { .. })));
    }
}
