//! Error types for schema loading and validation.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while loading or validating a schema.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Error reading a file.
    #[error("failed to read file: {path}")]
    #[diagnostic(code(quiver::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse schema TOML")]
    #[diagnostic(code(quiver::schema::toml_error))]
    TomlError {
        #[source]
        source: toml::de::Error,
    },

    /// A resource or field has no name.
    #[error("{kind} `{key}` has an empty name")]
    #[diagnostic(code(quiver::schema::empty_name))]
    EmptyName { kind: String, key: String },

    /// Two declarations of the same kind resolve to the same resource name.
    #[error("duplicate {kind} `{name}`")]
    #[diagnostic(
        code(quiver::schema::duplicate),
        help("resource names must be unique per kind")
    )]
    Duplicate { kind: String, name: String },

    /// Invalid index definition.
    #[error("invalid index `{name}`: {message}")]
    #[diagnostic(code(quiver::schema::invalid_index))]
    InvalidIndex { name: String, message: String },

    /// Invalid field definition.
    #[error("invalid field `{index}.{field}`: {message}")]
    #[diagnostic(code(quiver::schema::invalid_field))]
    InvalidField {
        index: String,
        field: String,
        message: String,
    },

    /// Validation error with multiple issues.
    #[error("schema validation failed with {count} error(s)")]
    #[diagnostic(code(quiver::schema::validation_failed))]
    ValidationFailed {
        count: usize,
        #[related]
        errors: Vec<SchemaError>,
    },
}

impl SchemaError {
    /// Create a duplicate error.
    pub fn duplicate(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Duplicate {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an invalid index error.
    pub fn invalid_index(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidIndex {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an invalid field error.
    pub fn invalid_field(
        index: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            index: index.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}
