//! # Quiver
//!
//! Schema-driven migrations for managed search indexes, indexers and data
//! sources.
//!
//! Quiver provides:
//! - A declarative schema for search resources, loaded from TOML or built in code
//! - Order-independent checksums to detect what changed since the last apply
//! - Immutable, timestamped JSON migration files
//! - Ordered application against the search service with rollback of
//!   partially created resources
//! - Tamper detection for migrations that changed after they were applied
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quiver::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let schema = Schema::new().index(
//!         "hotels",
//!         IndexDefinition::new("hotels")
//!             .field("id", FieldDefinition::string().key())
//!             .field("rating", FieldDefinition::double().filterable().sortable()),
//!     );
//!
//!     let config = MigrationConfig::new().migrations_dir("./search/migrations");
//!     let engine = MigrationEngine::new(config, JsonFileStateAdapter::new(".quiver/state.json"));
//!     engine.initialize().await?;
//!     engine.generate(&schema, Some("init")).await?;
//!
//!     let service = RestSearchService::new("https://example.search.windows.net", "admin-key")?;
//!     let result = engine.migrate(&service, &SecretResolver::new(), &NoopObserver).await?;
//!     println!("{}", result.summary());
//!
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Resource declarations, wire types and schema loading.
pub mod schema {
    pub use quiver_schema::*;
}

/// Checksums, planning, migration files and the migration engine.
pub mod migrate {
    pub use quiver_migrate::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        GenerateOutcome, JsonFileStateAdapter, MemoryStateAdapter, MigrateResult,
        MigrationConfig, MigrationEngine, MigrationError, MigrationFile, NoopObserver,
        RestSearchService, SearchService, SecretResolver, StateAdapter,
    };
    pub use crate::schema::{
        DataSourceDefinition, FieldDefinition, IndexDefinition, IndexerDefinition, Schema,
    };
}

// Re-export key types at the crate root
pub use migrate::{MigrationEngine, MigrationError};
pub use schema::{Schema, SchemaError};
