//! Error types for the migration engine.

use thiserror::Error;

use crate::resource::ResourceType;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// State store operation error.
    #[error("State error: {0}")]
    State(String),

    /// The search service rejected a request.
    #[error("Search service returned {status}: {message}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Error message reported by the service.
        message: String,
    },

    /// Transport-level failure talking to a remote endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A state record does not match any known resource shape.
    #[error("Invalid resource in state: {0}")]
    InvalidResource(String),

    /// A state resource that should carry a checksum does not.
    #[error("State {kind} '{name}' has no checksum; state is corrupt or was written outside quiver")]
    MissingChecksum {
        /// Resource kind.
        kind: ResourceType,
        /// Resource name.
        name: String,
    },

    /// Invalid migration file or format.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// Migration checksum mismatch.
    #[error("Checksum mismatch for migration '{id}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Migration name.
        id: String,
        /// Checksum recorded in state.
        expected: String,
        /// Checksum of the local file.
        actual: String,
    },

    /// A migration recorded in state has no local file.
    #[error("Migration '{0}' is recorded in state but missing locally")]
    MissingLocally(String),

    /// Generation was attempted while migrations are unapplied.
    #[error("Unapplied migrations exist: {}", .0.join(", "))]
    PendingMigrations(Vec<String>),

    /// The declared schema failed validation.
    #[error("Invalid schema: {0}")]
    InvalidSchema(#[from] quiver_schema::SchemaError),

    /// Pushing would replace resources that already exist remotely.
    #[error("Resources already exist on the service: {}", .0.join(", "))]
    WouldOverwrite(Vec<String>),

    /// A secret placeholder could not be resolved.
    #[error("Secret error: {0}")]
    Secret(String),

    /// A migration halted part way through.
    #[error("Migration '{name}' failed: {reason}")]
    ApplyFailed {
        /// Migration name.
        name: String,
        /// Error that halted the migration.
        reason: String,
    },

    /// Resource or migration not found.
    #[error("'{0}' not found")]
    NotFound(String),
}

impl MigrationError {
    /// Create a state error.
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Create a service error.
    pub fn service(status: u16, message: impl Into<String>) -> Self {
        Self::Service {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid resource error.
    pub fn invalid_resource(msg: impl Into<String>) -> Self {
        Self::InvalidResource(msg.into())
    }

    /// Create a secret error.
    pub fn secret(msg: impl Into<String>) -> Self {
        Self::Secret(msg.into())
    }

    /// Create a migration file error.
    pub fn migration_file(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Check if this error means the remote resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Service { status: 404, .. } | Self::NotFound(_))
    }

    /// Check if this error reflects corrupt or inconsistent recorded data.
    ///
    /// Integrity errors are never repaired automatically.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::InvalidResource(_)
                | Self::MissingChecksum { .. }
                | Self::ChecksumMismatch { .. }
                | Self::MissingLocally(_)
        )
    }
}
