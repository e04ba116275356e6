//! # quiver-schema
//!
//! Declarations and wire types for managed search resources.
//!
//! This crate provides:
//! - Declaration types for indexes, indexers and data sources
//! - Wire-form resource types that round-trip service payloads
//! - TOML schema loading and validation
//!
//! ## Example
//!
//! ```rust,ignore
//! use quiver_schema::Schema;
//!
//! let schema = Schema::from_file("search/schema.toml")?;
//! schema.validate()?;
//!
//! for index in schema.indexes.values() {
//!     println!("{} has {} fields", index.name, index.build().fields.len());
//! }
//! ```

pub mod definition;
pub mod error;
pub mod resource;
pub mod schema;

pub use definition::{
    ComplexFieldDefinition, DataSourceDefinition, FieldDefinition, IndexDefinition,
    IndexerDefinition, ScalarType, SimpleFieldDefinition,
};
pub use error::{SchemaError, SchemaResult};
pub use resource::{
    COMPLEX_COLLECTION_TYPE, COMPLEX_TYPE, ComplexField, DataContainer, DataSourceConnection,
    FieldMapping, IndexingSchedule, MappingFunction, SearchField, SearchIndex, SearchIndexer,
    SimpleField, Suggester,
};
pub use schema::Schema;
