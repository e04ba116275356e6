//! # quiver-migrate
//!
//! Migration engine for managed search resources.
//!
//! This crate provides functionality for:
//! - Order-independent checksums of indexes, indexers and data sources
//! - Diffing declared resources against recorded state
//! - Migration file generation and management on the filesystem
//! - Migration history tracking and tamper detection
//! - Applying migrations against the search service with rollback of
//!   partially created resources
//! - Secret placeholders in data source connection strings
//! - Drift detection between state and the live service
//! - Pulling live resources into state and pushing a schema without
//!   migrations
//!
//! ## Architecture
//!
//! The engine never reads the live service to decide what changed. It
//! compares declared resources with the checksums recorded in a state store
//! when each resource was last created.
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌────────────────┐
//! │ Schema       │────▶│ Plan (diff)    │────▶│ Migration file │
//! └──────────────┘     └────────────────┘     └────────────────┘
//!        ▲                                            │
//!        │ checksums                                  ▼
//! ┌──────────────┐     ┌────────────────┐     ┌────────────────┐
//! │ State store  │◀────│ Migrator       │────▶│ Search service │
//! └──────────────┘     └────────────────┘     └────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use quiver_migrate::{
//!     GenerateOutcome, JsonFileStateAdapter, MigrationConfig, MigrationEngine, NoopObserver,
//!     RestSearchService, SecretResolver,
//! };
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let schema = quiver_schema::Schema::from_file("search/schema.toml")?;
//!
//!     let config = MigrationConfig::new().migrations_dir("./search/migrations");
//!     let engine = MigrationEngine::new(config, JsonFileStateAdapter::new(".quiver/state.json"));
//!     engine.initialize().await?;
//!
//!     if let GenerateOutcome::Written { name, .. } = engine.generate(&schema, Some("init")).await? {
//!         println!("wrote {name}");
//!     }
//!
//!     let service = RestSearchService::new("https://example.search.windows.net", "admin-key")?;
//!     let result = engine.migrate(&service, &SecretResolver::new(), &NoopObserver).await?;
//!     println!("{}", result.summary());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Migration Files
//!
//! ```text
//! search/migrations/
//! ├── 20241002131556-imperial-dragonfly.json
//! └── 20241005090112-add-ratings.json
//! ```
//!
//! Each file lists, per resource kind, the built resources to create and the
//! `{name, type}` references to delete. Changed resources appear in both.

pub mod checksum;
pub mod diff;
pub mod drift;
pub mod engine;
pub mod error;
pub mod events;
pub mod file;
pub mod guards;
pub mod history;
pub mod migrator;
pub mod pull;
pub mod push;
pub mod resource;
pub mod secrets;
pub mod service;
pub mod state;

#[cfg(test)]
mod testing;

// Re-exports
pub use checksum::{
    data_source_checksum, field_checksum, index_checksum, indexer_checksum, migration_checksum,
};
pub use diff::{BuiltResource, DeclaredResource, MigrationActions, Plan, compute_migration_actions};
pub use drift::{DriftReport, detect_drift};
pub use engine::{GenerateOutcome, MigrationConfig, MigrationEngine, MigrationResult, MigrationStatus};
pub use error::{MigrateResult, MigrationError};
pub use events::{MigrationEvent, MigrationObserver, NoopObserver};
pub use file::{
    LocalMigration, MigrationFile, MigrationFileManager, ResourceChanges, generate_migration_file,
};
pub use guards::{StateResources, parse_resource, parse_resources};
pub use history::{
    MigrationRecord, RecordStatus, StartMigration, ValidationResult, ValidationStatus,
    fetch_pending_migrations, validate_migration_history,
};
pub use migrator::{ApplyOutcome, ApplyReport, FailedMigration, Migrator, RollbackReport};
pub use pull::{PULLED_KINDS, PullReport, pull_resources};
pub use push::{PushReport, existing_resources, push_schema};
pub use resource::{NewResource, Resource, ResourceRef, ResourceType, ResourceUpdate};
pub use secrets::{KeyVaultSecretStore, SecretResolver, SecretStore};
pub use service::{RestSearchService, SearchService};
pub use state::{JsonFileStateAdapter, MemoryStateAdapter, StateAdapter, StateSnapshot};
